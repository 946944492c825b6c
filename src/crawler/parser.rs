//! Link extraction from list and feed pages
//!
//! Only `<a href>` anchors are followed. Downloads, script pseudo-links,
//! mail/phone links, data URIs and same-page anchors are dropped.

use scraper::{Html, Selector};
use std::collections::HashSet;
use url::Url;

/// Returns the absolute HTTP(S) links of a page in document order
///
/// Each link appears once, even if the page repeats it. No canonicalization
/// happens here; the crawl engine does that before deduplication.
///
/// # Examples
///
/// ```
/// use pagepress::crawler::extract_links;
/// use url::Url;
///
/// let base = Url::parse("https://example.com/news/").unwrap();
/// let html = r#"<a href="a.html">A</a><a href="mailto:x@example.com">mail</a>"#;
/// assert_eq!(extract_links(html, &base), vec!["https://example.com/news/a.html"]);
/// ```
pub fn extract_links(html: &str, base_url: &Url) -> Vec<String> {
    let document = Html::parse_document(html);
    let Ok(anchors) = Selector::parse("a[href]") else {
        return Vec::new();
    };

    let mut seen = HashSet::new();
    document
        .select(&anchors)
        .filter(|a| a.value().attr("download").is_none())
        .filter_map(|a| a.value().attr("href"))
        .filter_map(|href| resolve_link(href, base_url))
        .filter(|link| seen.insert(link.clone()))
        .collect()
}

/// Resolves an href against the page URL
///
/// Returns None for hrefs that never lead to another page.
fn resolve_link(href: &str, base_url: &Url) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lower = href.to_ascii_lowercase();
    if ["javascript:", "mailto:", "tel:", "data:"]
        .iter()
        .any(|scheme| lower.starts_with(scheme))
    {
        return None;
    }

    let absolute = base_url.join(href).ok()?;
    matches!(absolute.scheme(), "http" | "https").then(|| absolute.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://example.com/list/page").unwrap()
    }

    #[test]
    fn test_relative_and_absolute_links() {
        let html = r#"
            <a href="/a">root relative</a>
            <a href="b">path relative</a>
            <a href="https://other.com/c">absolute</a>
        "#;
        assert_eq!(
            extract_links(html, &base()),
            vec![
                "https://example.com/a",
                "https://example.com/list/b",
                "https://other.com/c",
            ]
        );
    }

    #[test]
    fn test_pseudo_links_dropped() {
        let html = r##"
            <a href="javascript:void(0)">js</a>
            <a href="JavaScript:go()">js upper</a>
            <a href="mailto:desk@example.com">mail</a>
            <a href="tel:+100">call</a>
            <a href="data:text/html,hi">data</a>
            <a href="#top">anchor</a>
            <a href="   ">blank</a>
            <a href="ftp://example.com/file">ftp</a>
        "##;
        assert!(extract_links(html, &base()).is_empty());
    }

    #[test]
    fn test_download_links_dropped() {
        let html = r#"<a href="/report.pdf" download>pdf</a><a href="/story">story</a>"#;
        assert_eq!(extract_links(html, &base()), vec!["https://example.com/story"]);
    }

    #[test]
    fn test_repeated_links_listed_once() {
        let html = r#"<a href="/s1">one</a><a href="/s2">two</a><a href="/s1">again</a>"#;
        assert_eq!(
            extract_links(html, &base()),
            vec!["https://example.com/s1", "https://example.com/s2"]
        );
    }

    #[test]
    fn test_only_anchor_tags() {
        let html = r#"
            <link rel="stylesheet" href="/style.css">
            <script src="/app.js"></script>
            <img src="/pic.jpg">
            <a href="/story" rel="nofollow">story</a>
        "#;
        assert_eq!(extract_links(html, &base()), vec!["https://example.com/story"]);
    }
}
