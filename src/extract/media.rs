use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use url::Url;

/// Attributes that carry the real image source on lazy-loading pages
pub(crate) const LAZY_IMAGE_ATTRS: &[&str] =
    &["data-src", "data-original", "data-lazy-src", "data-echo"];

/// Hosts whose `<iframe>` embeds are treated as videos
const VIDEO_EMBED_HOSTS: &[&str] = &[
    "youtube.com",
    "youtube-nocookie.com",
    "youtu.be",
    "vimeo.com",
    "player.vimeo.com",
    "dailymotion.com",
    "bilibili.com",
    "player.bilibili.com",
    "v.qq.com",
    "ixigua.com",
];

const VIDEO_EXTENSIONS: &[&str] = &[".mp4", ".webm", ".m3u8", ".mov", ".m4v", ".ogv", ".flv"];

/// Collects image URLs in document order, absolutised and deduplicated
///
/// A lazy-load attribute wins over `src` when `src` is missing or a `data:`
/// placeholder.
pub fn collect_images(html: &str, base_url: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let base = Url::parse(base_url).ok();
    let Ok(selector) = Selector::parse("img") else {
        return Vec::new();
    };

    let found = document
        .select(&selector)
        .filter_map(image_source)
        .filter_map(|src| absolutize(base.as_ref(), src));
    dedup(found)
}

/// The effective source of an `<img>` element
pub(crate) fn image_source(img: ElementRef<'_>) -> Option<&str> {
    let element = img.value();
    let src = element
        .attr("src")
        .map(str::trim)
        .filter(|s| !s.is_empty() && !s.starts_with("data:"));

    let lazy = LAZY_IMAGE_ATTRS
        .iter()
        .filter_map(|attr| element.attr(attr))
        .map(str::trim)
        .find(|s| !s.is_empty() && !s.starts_with("data:"));

    src.or(lazy)
}

/// Collects video URLs in document order, absolutised and deduplicated
///
/// Sources are `<video src>`, `<video data-src>`, `<video><source src>`
/// and `<iframe src>` pointing at a known video host.
pub fn collect_videos(html: &str, base_url: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let base = Url::parse(base_url).ok();
    let Ok(selector) = Selector::parse("video, video source, iframe") else {
        return Vec::new();
    };

    let found = document
        .select(&selector)
        .filter_map(|el| {
            let element = el.value();
            match element.name() {
                "iframe" => element
                    .attr("src")
                    .or_else(|| element.attr("data-src"))
                    .and_then(|src| absolutize(base.as_ref(), src))
                    .filter(|src| is_video_embed(src)),
                _ => element
                    .attr("src")
                    .or_else(|| element.attr("data-src"))
                    .and_then(|src| absolutize(base.as_ref(), src)),
            }
        });
    dedup(found)
}

/// Keeps only network media URLs that look like video streams
pub fn filter_media_urls(media_urls: &[String]) -> Vec<String> {
    media_urls
        .iter()
        .filter(|u| {
            Url::parse(u)
                .map(|parsed| {
                    let path = parsed.path().to_ascii_lowercase();
                    VIDEO_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
                })
                .unwrap_or(false)
        })
        .cloned()
        .collect()
}

/// Appends `extra` to `list`, skipping URLs already present
pub fn merge_unique(list: &mut Vec<String>, extra: impl IntoIterator<Item = String>) {
    let mut seen: HashSet<String> = list.iter().cloned().collect();
    for url in extra {
        if seen.insert(url.clone()) {
            list.push(url);
        }
    }
}

fn is_video_embed(src: &str) -> bool {
    let Ok(url) = Url::parse(src) else {
        return false;
    };
    let Some(host) = url.host_str() else {
        return false;
    };
    let host = host.to_ascii_lowercase();
    VIDEO_EMBED_HOSTS
        .iter()
        .any(|known| host == *known || host.ends_with(&format!(".{}", known)))
}

/// Resolves `src` against the page URL; rejects non-HTTP(S) results
pub(crate) fn absolutize(base: Option<&Url>, src: &str) -> Option<String> {
    let src = src.trim();
    if src.is_empty() || src.starts_with("data:") || src.starts_with("javascript:") {
        return None;
    }

    let resolved = match base {
        Some(base) => base.join(src).ok()?,
        None => Url::parse(src).ok()?,
    };

    match resolved.scheme() {
        "http" | "https" => Some(resolved.to_string()),
        _ => None,
    }
}

fn dedup(urls: impl Iterator<Item = String>) -> Vec<String> {
    let mut out = Vec::new();
    merge_unique(&mut out, urls);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://news.example.com/2024/story.html";

    #[test]
    fn test_collect_images_order_and_dedup() {
        let html = r#"
            <img src="/a.jpg">
            <img src="data:image/gif;base64,R0lG" data-src="b.jpg">
            <img data-original="https://cdn.example.com/c.png">
            <img src="/a.jpg">
            <img alt="no source">
        "#;
        assert_eq!(
            collect_images(html, BASE),
            vec![
                "https://news.example.com/a.jpg",
                "https://news.example.com/2024/b.jpg",
                "https://cdn.example.com/c.png",
            ]
        );
    }

    #[test]
    fn test_collect_images_all_lazy_attrs() {
        let html = r#"<img data-lazy-src="/l.jpg"><img data-echo="/e.jpg">"#;
        assert_eq!(
            collect_images(html, BASE),
            vec![
                "https://news.example.com/l.jpg",
                "https://news.example.com/e.jpg",
            ]
        );
    }

    #[test]
    fn test_collect_videos() {
        let html = r#"
            <video src="/clip.mp4"></video>
            <video><source src="https://media.example.com/b.webm" type="video/webm"></video>
            <iframe src="https://www.youtube.com/embed/xyz"></iframe>
            <iframe src="https://ads.example.com/banner"></iframe>
        "#;
        assert_eq!(
            collect_videos(html, BASE),
            vec![
                "https://news.example.com/clip.mp4",
                "https://media.example.com/b.webm",
                "https://www.youtube.com/embed/xyz",
            ]
        );
    }

    #[test]
    fn test_filter_media_urls() {
        let urls = vec![
            "https://cdn.example.com/v/1.MP4?sig=1".to_string(),
            "https://cdn.example.com/app.js".to_string(),
            "https://cdn.example.com/live/index.m3u8".to_string(),
        ];
        assert_eq!(
            filter_media_urls(&urls),
            vec![
                "https://cdn.example.com/v/1.MP4?sig=1",
                "https://cdn.example.com/live/index.m3u8",
            ]
        );
    }

    #[test]
    fn test_merge_unique() {
        let mut list = vec!["a".to_string()];
        merge_unique(&mut list, vec!["b".to_string(), "a".to_string(), "b".to_string()]);
        assert_eq!(list, vec!["a", "b"]);
    }
}
