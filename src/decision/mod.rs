//! Render decision engine
//!
//! Given the outcome of the lightweight fetch, decides whether a headless
//! render pass is needed. The decision is a pure function of its inputs so
//! that identical inputs always produce the identical decision.
//!
//! # Rules
//!
//! | Mode | Condition | Decision |
//! |------|-----------|----------|
//! | `never` | anything | `Skip` |
//! | `always` | anything (including a failed fetch) | `Render(Forced)` |
//! | `auto` | HTML matches a captcha signature | `CaptchaDetected` |
//! | `auto` | transport failure | `Render(FetchFailed)` |
//! | `auto` | non-2xx status | `Render(NonSuccessStatus)` |
//! | `auto` | candidate text shorter than `min_text_len` | `Render(TextTooShort)` |
//! | `auto` | an "expand / read full article" marker | `Render(ExpandMarker)` |
//! | `auto` | otherwise | `Skip` |

mod captcha;

pub use captcha::{CaptchaDetector, SignatureDetector};

use crate::config::{ExtractSpec, RenderMode, RenderSpec};
use crate::fetch::FetchOutcome;
use std::sync::Arc;

/// Marker pair that together signal a collapsed article ("expand" + "more")
const EXPAND_PAIR: (&str, &str) = ("展开", "更多");

/// Why a render pass was requested
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderReason {
    /// `mode = always`
    Forced,
    /// The fetch produced no body
    FetchFailed,
    /// The fetch returned a non-2xx status
    NonSuccessStatus(u16),
    /// The candidate text is below `min_text_len`
    TextTooShort { len: usize, min: usize },
    /// The raw HTML carries an expand marker
    ExpandMarker(String),
}

/// Outcome of [`DecisionEngine::decide`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Skip,
    Render(RenderReason),
    /// The page is a human-verification challenge; rendering would not help
    CaptchaDetected,
}

impl Decision {
    pub fn should_render(&self) -> bool {
        matches!(self, Self::Render(_))
    }
}

/// Decides `skip | render` for a fetched page
#[derive(Clone)]
pub struct DecisionEngine {
    captcha: Arc<dyn CaptchaDetector>,
}

impl DecisionEngine {
    pub fn new(captcha: Arc<dyn CaptchaDetector>) -> Self {
        Self { captcha }
    }

    /// Creates an engine using the signature detector configured in `spec`
    pub fn from_spec(spec: &RenderSpec) -> Self {
        Self::new(Arc::new(SignatureDetector::new(&spec.captcha_markers)))
    }

    /// Runs the captcha predicate over raw HTML
    pub fn is_captcha(&self, html: &str) -> bool {
        self.captcha.is_captcha(html)
    }

    /// Decides whether the fetched page must be rendered
    ///
    /// # Arguments
    ///
    /// * `fetch` - Outcome of the lightweight fetch
    /// * `candidate_len` - Visible length of the text extracted from the
    ///   fetched HTML (see [`text_len`]), if any
    /// * `render` - Render settings (mode, expand markers)
    /// * `extract` - Extraction settings (`min_text_len`)
    pub fn decide(
        &self,
        fetch: &FetchOutcome,
        candidate_len: Option<usize>,
        render: &RenderSpec,
        extract: &ExtractSpec,
    ) -> Decision {
        match render.mode {
            RenderMode::Never => return Decision::Skip,
            RenderMode::Always => return Decision::Render(RenderReason::Forced),
            RenderMode::Auto => {}
        }

        let html = match fetch.html() {
            Some(html) => html,
            None => return Decision::Render(RenderReason::FetchFailed),
        };

        if self.is_captcha(html) {
            return Decision::CaptchaDetected;
        }

        if fetch.error.is_some() {
            return Decision::Render(RenderReason::FetchFailed);
        }

        if let Some(status) = fetch.status {
            if !(200..300).contains(&status) {
                return Decision::Render(RenderReason::NonSuccessStatus(status));
            }
        }

        let len = candidate_len.unwrap_or(0);
        if len < extract.min_text_len {
            return Decision::Render(RenderReason::TextTooShort {
                len,
                min: extract.min_text_len,
            });
        }

        if let Some(marker) = find_expand_marker(html, &render.expand_markers) {
            return Decision::Render(RenderReason::ExpandMarker(marker));
        }

        Decision::Skip
    }
}

/// Length of extracted text in characters, ignoring surrounding whitespace
pub fn text_len(text: &str) -> usize {
    text.trim().chars().count()
}

/// Returns the first expand marker found in `html`
///
/// Markers match case-insensitively. The "展开" + "更多" pair also counts as a
/// marker when both halves appear anywhere in the page.
pub fn find_expand_marker(html: &str, markers: &[String]) -> Option<String> {
    let lowered = html.to_lowercase();

    if let Some(marker) = markers
        .iter()
        .find(|m| !m.is_empty() && lowered.contains(&m.to_lowercase()))
    {
        return Some(marker.clone());
    }

    if html.contains(EXPAND_PAIR.0) && html.contains(EXPAND_PAIR.1) {
        return Some(format!("{}+{}", EXPAND_PAIR.0, EXPAND_PAIR.1));
    }

    None
}
