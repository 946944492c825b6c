use super::media::{absolutize, LAZY_IMAGE_ATTRS};
use regex::{Captures, Regex};
use std::sync::LazyLock;
use url::Url;

/// Stylesheet embedded in every styled-HTML result
pub const STYLESHEET: &str = "\
body { max-width: 760px; margin: 2rem auto; padding: 0 1rem; \
font-family: -apple-system, BlinkMacSystemFont, \"Segoe UI\", Helvetica, Arial, sans-serif; \
line-height: 1.7; color: #222; }
h1, h2, h3 { line-height: 1.3; }
img, video, iframe { display: block; max-width: 100%; height: auto; margin: 1rem auto; }
table { border-collapse: collapse; width: 100%; margin: 1rem 0; }
th, td { border: 1px solid #ddd; padding: 0.4rem 0.6rem; text-align: left; }
blockquote { margin: 1rem 0; padding-left: 1rem; border-left: 3px solid #ccc; color: #555; }
pre { overflow-x: auto; background: #f6f8fa; padding: 0.8rem; }
";

struct Patterns {
    image: Regex,
    link: Regex,
    media_marker: Regex,
    video_link: Regex,
    escape: Regex,
    heading: Regex,
    img_tag: Regex,
    attr: Regex,
}

impl Patterns {
    fn compile() -> Result<Self, regex::Error> {
        Ok(Self {
            image: Regex::new(r"!\[[^\]]*\]\(([^)\s]+)\)")?,
            link: Regex::new(r"\[([^\]]+)\]\(([^)\s]+)\)")?,
            media_marker: Regex::new(r"\[(?:Image|Video)\] \S+")?,
            video_link: Regex::new(r"\[Video\]\([^)\s]+\)")?,
            escape: Regex::new(r"\\([\\`*_{}\[\]()#+\-.!>|~<])")?,
            heading: Regex::new(r"(?m)^#{1,6}\s+")?,
            img_tag: Regex::new(r"(?i)<img\b[^>]*>")?,
            attr: Regex::new(r#"(?i)([a-z][a-z0-9_:-]*)\s*=\s*("[^"]*"|'[^']*'|[^\s"'>/]+)"#)?,
        })
    }
}

static PATTERNS: LazyLock<Option<Patterns>> = LazyLock::new(|| Patterns::compile().ok());

fn patterns() -> Option<&'static Patterns> {
    PATTERNS.as_ref()
}

/// Downgrades markdown to plain text
///
/// Images become `[Image] <url>`, links become `text (url)`, heading
/// and emphasis markers are dropped and backslash escapes are resolved.
pub fn markdown_to_text(md: &str) -> String {
    let Some(p) = patterns() else {
        return md.to_string();
    };
    let text = p.heading.replace_all(md, "");
    let text = p.image.replace_all(&text, "[Image] $1");
    let text = p.link.replace_all(&text, |caps: &Captures<'_>| {
        if &caps[1] == "Video" {
            format!("[Video] {}", &caps[2])
        } else {
            format!("{} ({})", &caps[1], &caps[2])
        }
    });

    let mut text = text.into_owned();
    for token in ["**", "__", "~~", "`"] {
        text = text.replace(token, "");
    }
    p.escape.replace_all(&text, "$1").into_owned()
}

/// Replaces markdown links with their text, leaving images and
/// `[Video](url)` links alone
pub(crate) fn strip_links(md: &str) -> String {
    let Some(p) = patterns() else {
        return md.to_string();
    };
    let mut out = String::with_capacity(md.len());
    let mut last = 0;
    for caps in p.link.captures_iter(md) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        let is_image = md[..whole.start()].ends_with('!');
        if is_image || &caps[1] == "Video" {
            continue;
        }
        out.push_str(&md[last..whole.start()]);
        out.push_str(&caps[1]);
        last = whole.end();
    }
    out.push_str(&md[last..]);
    out
}

/// Removes inline media markers in any output representation
///
/// Covers `![alt](url)`, `[Video](url)`, and the plain-text
/// `[Image] url` / `[Video] url` forms.
pub(crate) fn strip_media_markers(text: &str) -> String {
    let Some(p) = patterns() else {
        return text.to_string();
    };
    let text = p.image.replace_all(text, "");
    let text = p.video_link.replace_all(&text, "");
    p.media_marker.replace_all(&text, "").into_owned()
}

/// Points every `<img>` at its real source
///
/// When a lazy-load attribute (`data-src`, `data-original`, `data-lazy-src`,
/// `data-echo`) is present its value replaces `src`; all sources are made
/// absolute against `base_url`.
pub fn fix_lazy_images(html: &str, base_url: &str) -> String {
    let Some(p) = patterns() else {
        return html.to_string();
    };
    let base = Url::parse(base_url).ok();

    p.img_tag
        .replace_all(html, |caps: &Captures<'_>| {
            let tag = &caps[0];
            let attrs: Vec<(String, String)> = p
                .attr
                .captures_iter(tag)
                .map(|a| {
                    let value = a[2].trim_matches(|c| c == '"' || c == '\'');
                    (a[1].to_ascii_lowercase(), value.to_string())
                })
                .collect();

            let lazy = LAZY_IMAGE_ATTRS.iter().find_map(|name| {
                attrs
                    .iter()
                    .find(|(k, v)| k == name && !v.trim().is_empty())
                    .map(|(_, v)| v.as_str())
            });
            let src = attrs
                .iter()
                .find(|(k, _)| k == "src")
                .map(|(_, v)| v.as_str());

            let Some(real) = lazy.or(src).and_then(|s| absolutize(base.as_ref(), s)) else {
                return tag.to_string();
            };

            let mut rebuilt = String::from("<img");
            rebuilt.push_str(&format!(" src=\"{}\"", escape_attr(&real)));
            for (name, value) in attrs.iter().filter(|(k, _)| k != "src") {
                rebuilt.push_str(&format!(" {}=\"{}\"", name, escape_attr(value)));
            }
            rebuilt.push('>');
            rebuilt
        })
        .into_owned()
}

/// Wraps an HTML fragment in a standalone document with [`STYLESHEET`]
pub fn wrap_html(title: Option<&str>, body: &str) -> String {
    let title = title.map(escape_text).unwrap_or_default();
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n\
         <title>{}</title>\n<style>\n{}</style>\n</head>\n<body>\n{}\n</body>\n</html>\n",
        title, STYLESHEET, body
    )
}

fn escape_text(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

pub(crate) fn escape_attr(s: &str) -> String {
    escape_text(s).replace('"', "&quot;")
}
