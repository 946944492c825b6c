//! Text extraction and media post-processing
//!
//! Boilerplate removal sits behind the [`TextExtractor`] trait so another
//! algorithm can be plugged in. [`ReadableExtractor`] is the built-in
//! implementation. [`ExtractionPostProcessor`] applies the image/video
//! policies and the output format on top of whichever extractor is used.

mod markup;
mod media;
mod postprocess;
mod readable;

pub use markup::{fix_lazy_images, markdown_to_text, wrap_html, STYLESHEET};
pub use media::{collect_images, collect_videos, filter_media_urls, merge_unique};
pub use postprocess::{ExtractionPostProcessor, Processed};
pub use readable::ReadableExtractor;

use crate::config::{ExtractSpec, OutputFormat};

/// Representation the extractor should produce
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractorOutput {
    Text,
    Markdown,
    /// The original markup of the main content
    Html,
}

/// Flags handed to a [`TextExtractor`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractorOptions {
    pub output: ExtractorOutput,
    pub with_metadata: bool,
    pub favor_precision: bool,
    pub include_tables: bool,
    pub include_comments: bool,
    pub include_links: bool,

    /// Emit `![alt](src)` at the position of each image
    pub include_images: bool,
}

impl ExtractorOptions {
    /// Derives extractor flags from the extraction settings
    ///
    /// Inline images need positional markup, so plain-text output is
    /// requested as markdown and downgraded afterwards.
    pub fn from_spec(spec: &ExtractSpec) -> Self {
        let output = match spec.output_format {
            OutputFormat::Html => ExtractorOutput::Html,
            OutputFormat::Md => ExtractorOutput::Markdown,
            OutputFormat::Txt if spec.inline_images => ExtractorOutput::Markdown,
            OutputFormat::Txt => ExtractorOutput::Text,
        };
        Self {
            output,
            with_metadata: spec.with_metadata,
            favor_precision: spec.favor_precision,
            include_tables: spec.include_tables,
            include_comments: spec.include_comments,
            include_links: spec.include_links,
            include_images: spec.inline_images,
        }
    }
}

/// Main content and metadata of a page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extracted {
    pub text: String,
    pub title: Option<String>,
    pub source: Option<String>,
}

/// Boilerplate-removal capability
///
/// Implementations are pure: the same HTML, URL and options always produce
/// the same output. `None` means nothing usable was found.
pub trait TextExtractor: Send + Sync {
    fn extract(&self, html: &str, url: &str, options: &ExtractorOptions) -> Option<Extracted>;
}

impl<F> TextExtractor for F
where
    F: Fn(&str, &str, &ExtractorOptions) -> Option<Extracted> + Send + Sync,
{
    fn extract(&self, html: &str, url: &str, options: &ExtractorOptions) -> Option<Extracted> {
        self(html, url, options)
    }
}
