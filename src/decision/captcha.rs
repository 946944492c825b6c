//! Human-verification page detection
//!
//! Detection is a pluggable predicate over raw HTML. The default
//! [`SignatureDetector`] does a case-insensitive substring match against a
//! configurable marker list; any `Fn(&str) -> bool` closure can be used in its
//! place.

/// A predicate recognizing captcha / human-verification pages
pub trait CaptchaDetector: Send + Sync {
    fn is_captcha(&self, html: &str) -> bool;
}

impl<F> CaptchaDetector for F
where
    F: Fn(&str) -> bool + Send + Sync,
{
    fn is_captcha(&self, html: &str) -> bool {
        self(html)
    }
}

/// Substring-signature captcha detector
#[derive(Debug, Clone)]
pub struct SignatureDetector {
    markers: Vec<String>,
}

impl SignatureDetector {
    /// Creates a detector from marker strings (matched case-insensitively)
    pub fn new<I, S>(markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let markers = markers
            .into_iter()
            .map(|m| m.as_ref().trim().to_lowercase())
            .filter(|m| !m.is_empty())
            .collect();
        Self { markers }
    }

    /// The marker that matched, if any
    pub fn matched_marker(&self, html: &str) -> Option<&str> {
        if html.is_empty() {
            return None;
        }
        let lowered = html.to_lowercase();
        self.markers
            .iter()
            .find(|m| lowered.contains(m.as_str()))
            .map(String::as_str)
    }
}

impl CaptchaDetector for SignatureDetector {
    fn is_captcha(&self, html: &str) -> bool {
        self.matched_marker(html).is_some()
    }
}
