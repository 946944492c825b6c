use crate::extract::Processed;
use crate::fetch::FetchError;
use crate::render::RenderError;
use crate::scheduler::TaskError;
use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use thiserror::Error;

/// Per-URL failure recorded in [`ExtractResult::error`]
///
/// These never abort a batch; each URL carries its own. The display form is
/// the stable string written to JSON output.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResultError {
    #[error("captcha_detected")]
    CaptchaDetected,

    #[error("extraction_empty")]
    ExtractionEmpty,

    #[error("{0}")]
    Fetch(FetchError),

    #[error("{0}")]
    Render(RenderError),

    #[error("{fetch}; render failed: {render}")]
    FetchAndRender { fetch: FetchError, render: RenderError },

    #[error("{0}")]
    Task(TaskError),
}

impl ResultError {
    /// Short machine-readable classification
    pub fn kind(&self) -> &'static str {
        match self {
            Self::CaptchaDetected => "captcha_detected",
            Self::ExtractionEmpty => "extraction_empty",
            Self::Fetch(_) => "fetch_error",
            Self::Render(_) => "render_error",
            Self::FetchAndRender { .. } => "fetch_and_render_error",
            Self::Task(_) => "task_error",
        }
    }
}

impl Serialize for ResultError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Structured article content for one URL
///
/// Either `text` is present or `error` is; a result never carries both.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractResult {
    /// The URL as requested
    pub url: String,

    pub text: Option<String>,
    pub title: Option<String>,
    pub source: Option<String>,
    pub images: Vec<String>,
    pub videos: Vec<String>,

    /// True if the returned content came from a rendered page
    pub used_render: bool,

    /// Status of the lightweight fetch, or of the render navigation when the
    /// fetch produced none
    pub status_code: Option<u16>,

    pub fetch_ms: Option<f64>,
    pub render_ms: Option<f64>,
    pub extract_ms: Option<f64>,
    pub image_ms: Option<f64>,
    pub video_ms: Option<f64>,
    pub elapsed_ms: f64,

    pub error: Option<ResultError>,
    pub extracted_at: DateTime<Utc>,
}

impl ExtractResult {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            text: None,
            title: None,
            source: None,
            images: Vec::new(),
            videos: Vec::new(),
            used_render: false,
            status_code: None,
            fetch_ms: None,
            render_ms: None,
            extract_ms: None,
            image_ms: None,
            video_ms: None,
            elapsed_ms: 0.0,
            error: None,
            extracted_at: Utc::now(),
        }
    }

    /// A result for a batch slot whose task died
    pub fn task_failed(url: &str, error: TaskError) -> Self {
        Self::new(url).with_error(ResultError::Task(error))
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    /// Stable error string, if any
    pub fn error_code(&self) -> Option<String> {
        self.error.as_ref().map(ToString::to_string)
    }

    /// Clears the text and records `error`
    pub(crate) fn with_error(mut self, error: ResultError) -> Self {
        self.text = None;
        self.error = Some(error);
        self
    }

    /// Copies extracted content and its timings into the result
    ///
    /// Text shorter than `min_text_len` is dropped and reported as
    /// [`ResultError::ExtractionEmpty`]; metadata and media are kept.
    pub(crate) fn apply(&mut self, processed: Processed, min_text_len: usize) {
        let usable = processed.text.is_some() && processed.text_len >= min_text_len;

        self.title = processed.title;
        self.source = processed.source;
        self.images = processed.images;
        self.videos = processed.videos;
        self.extract_ms = Some(processed.extract_ms);
        self.image_ms = processed.image_ms;
        self.video_ms = processed.video_ms;

        if usable {
            self.text = processed.text;
            self.error = None;
        } else {
            self.text = None;
            self.error = Some(ResultError::ExtractionEmpty);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn processed(text: &str) -> Processed {
        Processed {
            text: Some(text.to_string()).filter(|t| !t.is_empty()),
            text_len: text.chars().count(),
            title: Some("Title".to_string()),
            extract_ms: 1.5,
            ..Processed::default()
        }
    }

    #[test]
    fn test_error_strings() {
        assert_eq!(ResultError::CaptchaDetected.to_string(), "captcha_detected");
        assert_eq!(ResultError::ExtractionEmpty.to_string(), "extraction_empty");

        let combined = ResultError::FetchAndRender {
            fetch: FetchError::Timeout {
                url: "https://example.com".to_string(),
            },
            render: RenderError::Unavailable("no browser".to_string()),
        };
        assert!(combined.to_string().contains("; render failed: "));
        assert_eq!(combined.kind(), "fetch_and_render_error");
    }

    #[test]
    fn test_apply_meets_threshold() {
        let mut result = ExtractResult::new("https://example.com/a");
        result.apply(processed("long enough text"), 5);
        assert_eq!(result.text.as_deref(), Some("long enough text"));
        assert!(result.is_ok());
        assert_eq!(result.extract_ms, Some(1.5));
    }

    #[test]
    fn test_apply_below_threshold_is_extraction_empty() {
        let mut result = ExtractResult::new("https://example.com/a");
        result.apply(processed("tiny"), 200);
        assert!(result.text.is_none());
        assert_eq!(result.error, Some(ResultError::ExtractionEmpty));
        assert_eq!(result.title.as_deref(), Some("Title"));
    }

    #[test]
    fn test_apply_empty_with_zero_threshold() {
        let mut result = ExtractResult::new("https://example.com/a");
        result.apply(processed(""), 0);
        assert_eq!(result.error_code().as_deref(), Some("extraction_empty"));
    }

    #[test]
    fn test_serializes_error_as_string() {
        let result = ExtractResult::new("https://example.com/a").with_error(ResultError::CaptchaDetected);
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["error"], "captcha_detected");
        assert_eq!(json["url"], "https://example.com/a");
        assert!(json["text"].is_null());
    }
}
