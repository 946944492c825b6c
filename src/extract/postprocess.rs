use super::markup::{
    escape_attr, fix_lazy_images, markdown_to_text, strip_media_markers, wrap_html,
};
use super::media::{collect_images, collect_videos, filter_media_urls, merge_unique};
use super::{ExtractorOptions, TextExtractor};
use crate::config::{ExtractSpec, OutputFormat};
use regex::{Captures, Regex};
use scraper::Html;
use std::sync::{Arc, LazyLock};
use std::time::Instant;

static VIDEO_ELEMENT: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"(?is)<video\b[^>]*>.*?</video>|<video\b[^>]*/>|<iframe\b[^>]*>(?:.*?</iframe>)?")
        .ok()
});

/// Output of [`ExtractionPostProcessor::process`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Processed {
    /// Formatted output; `None` when nothing was extracted
    pub text: Option<String>,

    /// Visible characters of the main content, ignoring markup and
    /// appended media lists
    pub text_len: usize,

    pub title: Option<String>,
    pub source: Option<String>,
    pub images: Vec<String>,
    pub videos: Vec<String>,
    pub extract_ms: f64,
    pub image_ms: Option<f64>,
    pub video_ms: Option<f64>,
}

/// Runs the text extractor and applies media policy and output format
///
/// # Image Policy
///
/// | Flag | Effect |
/// |------|--------|
/// | `keep_images` | image URLs are returned in `images` |
/// | `append_images` | a list of the images is appended to the output |
/// | `inline_images` | images stay in place (`![](url)` in markdown, `[Image] url` in text) |
///
/// Video flags behave the same way; inline videos render as `[Video] url`
/// in text and `[Video](url)` in markdown. Appending is skipped when the
/// media are already inline.
#[derive(Clone)]
pub struct ExtractionPostProcessor {
    extractor: Arc<dyn TextExtractor>,
    spec: Arc<ExtractSpec>,
}

impl ExtractionPostProcessor {
    pub fn new(extractor: Arc<dyn TextExtractor>, spec: ExtractSpec) -> Self {
        Self {
            extractor,
            spec: Arc::new(spec),
        }
    }

    pub fn spec(&self) -> &ExtractSpec {
        &self.spec
    }

    /// Extracts `html` fetched or rendered from `url`
    ///
    /// `media_urls` are network media URLs reported by the render backend;
    /// the video-looking ones are merged into the video list.
    pub fn process(&self, html: &str, url: &str, media_urls: &[String]) -> Processed {
        let spec = &*self.spec;
        let format = spec.output_format;
        let start = Instant::now();

        let (prepared, inline_videos) = if spec.inline_videos && format != OutputFormat::Html {
            inline_video_placeholders(html, url)
        } else {
            (html.to_string(), Vec::new())
        };

        let options = ExtractorOptions::from_spec(spec);
        let extracted = self.extractor.extract(&prepared, url, &options);

        let (mut text, title, source) = match extracted {
            Some(e) => (e.text, e.title, e.source),
            None => (String::new(), None, None),
        };

        text = match format {
            OutputFormat::Txt if spec.inline_images => markdown_to_text(&text),
            OutputFormat::Html => fix_lazy_images(&text, url),
            _ => text,
        };
        restore_videos(&mut text, format, &inline_videos);
        let text_len = visible_len(&text, format);
        let extract_ms = elapsed_ms(start);

        let mut images = Vec::new();
        let mut image_ms = None;
        if spec.wants_images() {
            let start = Instant::now();
            images = collect_images(html, url);
            if spec.append_images && !spec.inline_images && !text.trim().is_empty() {
                append_media(&mut text, format, MediaKind::Image, &images);
            }
            image_ms = Some(elapsed_ms(start));
        }

        let mut videos = Vec::new();
        let mut video_ms = None;
        if spec.wants_videos() {
            let start = Instant::now();
            videos = collect_videos(html, url);
            merge_unique(&mut videos, filter_media_urls(media_urls));
            if spec.append_videos && !spec.inline_videos && !text.trim().is_empty() {
                append_media(&mut text, format, MediaKind::Video, &videos);
            }
            video_ms = Some(elapsed_ms(start));
        }

        if format == OutputFormat::Html && !text.trim().is_empty() {
            text = wrap_html(title.as_deref(), &text);
        }

        Processed {
            text: Some(text).filter(|t| !t.trim().is_empty()),
            text_len,
            title,
            source,
            images,
            videos,
            extract_ms,
            image_ms,
            video_ms,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MediaKind {
    Image,
    Video,
}

fn video_placeholder(index: usize) -> String {
    format!("pagepressvideo{}marker", index)
}

/// Replaces each video element with a placeholder paragraph
///
/// Placeholders survive boilerplate removal and markdown conversion
/// untouched; [`restore_videos`] turns them into markers afterwards.
fn inline_video_placeholders(html: &str, url: &str) -> (String, Vec<String>) {
    let Some(re) = VIDEO_ELEMENT.as_ref() else {
        return (html.to_string(), Vec::new());
    };
    let mut videos = Vec::new();
    let prepared = re
        .replace_all(html, |caps: &Captures<'_>| {
            let element = &caps[0];
            let found = collect_videos(element, url);
            if found.is_empty() {
                return element.to_string();
            }
            found
                .into_iter()
                .map(|v| {
                    videos.push(v);
                    format!("<p>{}</p>", video_placeholder(videos.len() - 1))
                })
                .collect::<String>()
        })
        .into_owned();
    (prepared, videos)
}

/// Writes `[Video] url` (text) or `[Video](url)` (markdown) in place of
/// each placeholder
fn restore_videos(text: &mut String, format: OutputFormat, videos: &[String]) {
    for (i, video) in videos.iter().enumerate() {
        let marker = match format {
            OutputFormat::Md => format!("[Video]({})", video),
            _ => format!("[Video] {}", video),
        };
        *text = text.replace(&video_placeholder(i), &marker);
    }
}

/// Appends a media list in the representation of `format`
fn append_media(text: &mut String, format: OutputFormat, kind: MediaKind, urls: &[String]) {
    if urls.is_empty() {
        return;
    }

    let block = match (format, kind) {
        (OutputFormat::Txt, MediaKind::Image) => format!("[Images]\n{}", urls.join("\n")),
        (OutputFormat::Txt, MediaKind::Video) => format!("[Videos]\n{}", urls.join("\n")),
        (OutputFormat::Md, MediaKind::Image) => format!(
            "**Images**\n\n{}",
            urls.iter()
                .map(|u| format!("- ![]({})", u))
                .collect::<Vec<_>>()
                .join("\n")
        ),
        (OutputFormat::Md, MediaKind::Video) => format!(
            "**Videos**\n\n{}",
            urls.iter()
                .map(|u| format!("- [Video]({})", u))
                .collect::<Vec<_>>()
                .join("\n")
        ),
        (OutputFormat::Html, MediaKind::Image) => format!(
            "<section class=\"images\">\n{}\n</section>",
            urls.iter()
                .map(|u| format!("<img src=\"{}\">", escape_attr(u)))
                .collect::<Vec<_>>()
                .join("\n")
        ),
        (OutputFormat::Html, MediaKind::Video) => format!(
            "<section class=\"videos\">\n{}\n</section>",
            urls.iter()
                .map(|u| format!("<video controls src=\"{}\"></video>", escape_attr(u)))
                .collect::<Vec<_>>()
                .join("\n")
        ),
    };

    text.push_str("\n\n");
    text.push_str(&block);
}

/// Characters of visible text
///
/// Markup is stripped for HTML output and inline media markers for text
/// and markdown, so media URLs never count as article text.
fn visible_len(text: &str, format: OutputFormat) -> usize {
    match format {
        OutputFormat::Html => Html::parse_fragment(text)
            .root_element()
            .text()
            .map(|t| t.trim().chars().count())
            .sum(),
        _ => strip_media_markers(text).trim().chars().count(),
    }
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}
