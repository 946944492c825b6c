use super::markup::{fix_lazy_images, markdown_to_text, strip_links};
use super::{Extracted, ExtractorOptions, ExtractorOutput, TextExtractor};
use crate::url::host_of;
use htmd::HtmlToMarkdown;
use scraper::{Html, Selector};
use std::io::Cursor;
use url::Url;

/// Elements removed before content scoring
const NOISE: &[&str] = &[
    "script", "style", "noscript", "template", "svg", "canvas", "nav", "aside", "footer",
    "form", "button", "select", "input", "textarea", "iframe", "object", "embed", "video",
    "audio", "[hidden]", "[aria-hidden=true]",
];

/// Reader comment sections
const COMMENT_SECTIONS: &str = "[id*=comment], [class*=comment]";

/// Below this many characters a recall-oriented extraction falls back to
/// the whole body
const RECALL_MIN_CHARS: usize = 200;

/// Readability-based boilerplate remover
///
/// Navigation, forms, scripts and (unless requested) comment sections and
/// tables are pruned first. `readability` then picks the main content
/// block and `htmd` renders it as markdown; plain text is the markdown
/// with its syntax removed. With `favor_precision` off, a short result is
/// replaced by the full page body.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadableExtractor;

impl TextExtractor for ReadableExtractor {
    fn extract(&self, html: &str, url: &str, options: &ExtractorOptions) -> Option<Extracted> {
        let base = Url::parse(url).ok()?;

        let mut noise = NOISE.to_vec();
        if !options.include_tables {
            noise.push("table");
        }
        let (cleaned, _) = split_off(&fix_lazy_images(html, url), &noise.join(", "));
        let (cleaned, comments) = split_off(&cleaned, COMMENT_SECTIONS);

        let product = match readability::extractor::extract(&mut Cursor::new(cleaned.as_bytes()), &base) {
            Ok(product) => product,
            Err(e) => {
                tracing::debug!("readability failed for {}: {}", url, e);
                return None;
            }
        };

        let mut content = body_html(&product.content).unwrap_or(product.content);
        if !options.favor_precision && visible_chars(&content) < RECALL_MIN_CHARS {
            if let Some(body) = body_html(&cleaned) {
                content = body;
            }
        }
        if options.include_comments {
            for section in &comments {
                content.push('\n');
                content.push_str(section);
            }
        }

        let text = match options.output {
            ExtractorOutput::Html => content,
            ExtractorOutput::Markdown | ExtractorOutput::Text => {
                let mut md = to_markdown(&content, options.include_images)?;
                if !options.include_links {
                    md = strip_links(&md);
                }
                if options.output == ExtractorOutput::Text {
                    markdown_to_text(&md)
                } else {
                    md
                }
            }
        };

        let (title, source) = if options.with_metadata {
            let document = Html::parse_document(html);
            let fallback = Some(product.title.trim().to_string()).filter(|t| !t.is_empty());
            (
                page_title(&document).or(fallback),
                page_source(&document, url),
            )
        } else {
            (None, None)
        };

        Some(Extracted {
            text: text.trim().to_string(),
            title,
            source,
        })
    }
}

/// Detaches every element matching `selectors`
///
/// Returns the remaining document and the markup of each removed subtree,
/// outermost matches only.
fn split_off(html: &str, selectors: &str) -> (String, Vec<String>) {
    let mut document = Html::parse_document(html);
    let Ok(selector) = Selector::parse(selectors) else {
        return (html.to_string(), Vec::new());
    };

    let mut ids = Vec::new();
    let mut removed = Vec::new();
    for el in document.select(&selector) {
        if el.ancestors().any(|a| ids.contains(&a.id())) {
            continue;
        }
        ids.push(el.id());
        removed.push(el.html());
    }

    for id in ids {
        if let Some(mut node) = document.tree.get_mut(id) {
            node.detach();
        }
    }
    (document.html(), removed)
}

fn to_markdown(html: &str, with_images: bool) -> Option<String> {
    let mut skipped = vec!["head", "script", "style", "noscript"];
    if !with_images {
        skipped.push("img");
    }
    HtmlToMarkdown::builder()
        .skip_tags(skipped)
        .build()
        .convert(html)
        .ok()
}

fn body_html(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let body = Selector::parse("body").ok()?;
    document.select(&body).next().map(|b| b.inner_html())
}

fn visible_chars(html: &str) -> usize {
    Html::parse_fragment(html)
        .root_element()
        .text()
        .map(|t| t.trim().chars().count())
        .sum()
}

/// Title from `og:title`, then `<title>`, then the first `<h1>`
fn page_title(document: &Html) -> Option<String> {
    meta_content(document, "meta[property='og:title']")
        .or_else(|| first_text(document, "title"))
        .or_else(|| first_text(document, "h1"))
}

/// Publisher from `og:site_name`, falling back to the URL host
fn page_source(document: &Html, url: &str) -> Option<String> {
    meta_content(document, "meta[property='og:site_name']").or_else(|| host_of(url))
}

fn meta_content(document: &Html, selector: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;
    document
        .select(&selector)
        .filter_map(|m| m.value().attr("content"))
        .map(|c| c.trim().to_string())
        .find(|c| !c.is_empty())
}

fn first_text(document: &Html, selector: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;
    document
        .select(&selector)
        .map(|el| el.text().collect::<Vec<_>>().join(" "))
        .map(|t| t.split_whitespace().collect::<Vec<_>>().join(" "))
        .find(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ExtractSpec, OutputFormat};

    const URL: &str = "https://news.example.com/2024/05/story";

    const PAGE: &str = r#"
        <html>
        <head>
            <title>Fallback title</title>
            <meta property="og:title" content="Harbour reopens">
            <meta property="og:site_name" content="Example News">
        </head>
        <body>
            <header><nav><a href="/">Home</a> <a href="/world">World</a></nav></header>
            <article>
                <h1>Harbour reopens</h1>
                <p>The harbour reopened on <b>Monday</b> after repairs.</p>
                <p><img src="/img/harbour.jpg" alt="harbour"> Boats returned at dawn.</p>
                <p>Read the <a href="/report">full report</a> on the council website.</p>
                <table><tr><th>Day</th><th>Ships</th></tr><tr><td>Mon</td><td>12</td></tr></table>
                <div class="comments"><p>First!</p></div>
                <script>track();</script>
            </article>
            <footer>Copyright</footer>
        </body>
        </html>
    "#;

    fn options(spec: ExtractSpec) -> ExtractorOptions {
        ExtractorOptions::from_spec(&spec)
    }

    #[test]
    fn test_plain_text_extraction() {
        let extracted = ReadableExtractor
            .extract(PAGE, URL, &options(ExtractSpec::default()))
            .unwrap();

        assert!(extracted.text.contains("The harbour reopened on Monday after repairs."));
        assert!(extracted.text.contains("Boats returned at dawn."));
        assert!(extracted.text.contains("Read the full report on the council website."));
        assert!(!extracted.text.contains("Home"));
        assert!(!extracted.text.contains("First!"));
        assert!(!extracted.text.contains("track()"));
        assert!(!extracted.text.contains("Copyright"));
        assert!(!extracted.text.contains("harbour.jpg"));
    }

    #[test]
    fn test_links_kept_on_request() {
        let spec = ExtractSpec {
            include_links: true,
            ..ExtractSpec::default()
        };
        let extracted = ReadableExtractor.extract(PAGE, URL, &options(spec)).unwrap();
        assert!(extracted
            .text
            .contains("full report (https://news.example.com/report)"));
    }

    #[test]
    fn test_metadata() {
        let extracted = ReadableExtractor
            .extract(PAGE, URL, &options(ExtractSpec::default()))
            .unwrap();
        assert_eq!(extracted.title.as_deref(), Some("Harbour reopens"));
        assert_eq!(extracted.source.as_deref(), Some("Example News"));
    }

    #[test]
    fn test_metadata_fallbacks() {
        let html = "<html><body><h1>Only heading</h1><p>text</p></body></html>";
        let extracted = ReadableExtractor
            .extract(html, URL, &options(ExtractSpec::default()))
            .unwrap();
        assert_eq!(extracted.title.as_deref(), Some("Only heading"));
        assert_eq!(extracted.source.as_deref(), Some("news.example.com"));
    }

    #[test]
    fn test_no_metadata_when_disabled() {
        let spec = ExtractSpec {
            with_metadata: false,
            ..ExtractSpec::default()
        };
        let extracted = ReadableExtractor.extract(PAGE, URL, &options(spec)).unwrap();
        assert!(extracted.title.is_none());
        assert!(extracted.source.is_none());
    }

    #[test]
    fn test_markdown_with_inline_images() {
        let spec = ExtractSpec {
            output_format: OutputFormat::Md,
            inline_images: true,
            ..ExtractSpec::default()
        };
        let extracted = ReadableExtractor.extract(PAGE, URL, &options(spec)).unwrap();

        assert!(extracted
            .text
            .contains("![harbour](https://news.example.com/img/harbour.jpg)"));
        assert!(extracted.text.contains("Boats returned at dawn."));
        assert!(extracted.text.contains("**Monday**"));
    }

    #[test]
    fn test_comments_and_tables_flags() {
        let spec = ExtractSpec {
            include_comments: true,
            include_tables: false,
            ..ExtractSpec::default()
        };
        let extracted = ReadableExtractor.extract(PAGE, URL, &options(spec)).unwrap();
        assert!(extracted.text.contains("First!"));
        assert!(!extracted.text.contains("Ships"));
    }

    #[test]
    fn test_html_output_keeps_markup() {
        let spec = ExtractSpec {
            output_format: OutputFormat::Html,
            ..ExtractSpec::default()
        };
        let extracted = ReadableExtractor.extract(PAGE, URL, &options(spec)).unwrap();
        assert!(extracted.text.contains("<b>Monday</b>"));
        assert!(extracted.text.contains("<img"));
        assert!(!extracted.text.contains("<script"));
        assert!(!extracted.text.contains("First!"));
    }

    #[test]
    fn test_precision_and_recall() {
        let html = r#"
            <html><body>
                <section><p>Opening paragraph of the piece, long enough to score.</p></section>
                <div>Footer note.</div>
            </body></html>
        "#;

        let precise = ReadableExtractor
            .extract(html, URL, &options(ExtractSpec::default()))
            .unwrap();
        assert!(precise.text.contains("Opening paragraph of the piece"));
        assert!(!precise.text.contains("Footer note."));

        let spec = ExtractSpec {
            favor_precision: false,
            ..ExtractSpec::default()
        };
        let recall = ReadableExtractor.extract(html, URL, &options(spec)).unwrap();
        assert!(recall.text.contains("Opening paragraph of the piece"));
        assert!(recall.text.contains("Footer note."));
    }

    #[test]
    fn test_split_off_returns_outermost_matches() {
        let html = r#"<body><div id="comments"><div class="comment">Nice</div></div><p>Kept</p></body>"#;
        let (rest, removed) = split_off(html, COMMENT_SECTIONS);
        assert_eq!(removed.len(), 1);
        assert!(removed[0].contains("Nice"));
        assert!(rest.contains("Kept"));
        assert!(!rest.contains("Nice"));
    }
}
