//! Headless render stage
//!
//! The browser itself sits behind the [`RenderBackend`] and [`RenderContext`]
//! traits. [`ContextPool`] hands out contexts with exclusive checkout and
//! [`RenderOrchestrator`] drives a single render: checkout, navigate, wait
//! for the first matching selector, capture the DOM.

mod chrome;
mod orchestrator;
mod pool;
mod selectors;

#[cfg(test)]
pub(crate) mod testing;

pub use chrome::ChromeBackend;
pub use orchestrator::RenderOrchestrator;
pub use pool::{ContextPool, PooledContext};
pub use selectors::{SelectorRegistry, DEFAULT_WAIT_SELECTORS};

use crate::config::{BlockedResource, ProxyConfig, RenderSpec};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;

/// Render-stage failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    #[error("Render backend unavailable: {0}")]
    Unavailable(String),

    #[error("Failed to launch browser context: {0}")]
    Launch(String),

    #[error("Navigation to {url} failed: {message}")]
    Navigation { url: String, message: String },

    #[error("Navigation to {url} timed out after {timeout_ms}ms")]
    NavigationTimeout { url: String, timeout_ms: u64 },

    #[error("None of the wait selectors appeared on {url} within {timeout_ms}ms")]
    SelectorTimeout { url: String, timeout_ms: u64 },

    #[error("Failed to read page content from {url}: {message}")]
    Content { url: String, message: String },
}

impl RenderError {
    /// Returns true for the degraded outcome that still carries partial HTML
    pub fn is_selector_timeout(&self) -> bool {
        matches!(self, Self::SelectorTimeout { .. })
    }
}

/// Settings applied when a browser context is created
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContextOptions {
    pub user_agent: Option<String>,
    pub proxy: Option<ProxyConfig>,
    pub extra_headers: BTreeMap<String, String>,
    pub cookies: BTreeMap<String, String>,
    pub block_resources: Vec<BlockedResource>,
}

impl ContextOptions {
    pub fn from_spec(spec: &RenderSpec, user_agent: Option<&str>) -> Self {
        Self {
            user_agent: user_agent.map(str::to_string),
            proxy: spec.proxy.clone().filter(|p| !p.is_empty()),
            extra_headers: spec.extra_headers.clone(),
            cookies: spec.cookies.clone(),
            block_resources: spec.block_resources.clone(),
        }
    }

    pub fn blocks(&self, resource: BlockedResource) -> bool {
        self.block_resources.contains(&resource)
    }
}

/// What the backend reports after a navigation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NavigationStatus {
    pub status: Option<u16>,
    pub final_url: Option<String>,

    /// Media URLs observed on the network while the page loaded
    pub media_urls: Vec<String>,
}

/// A browser engine able to create isolated contexts
#[async_trait]
pub trait RenderBackend: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    async fn launch_context(
        &self,
        options: &ContextOptions,
    ) -> Result<Box<dyn RenderContext>, RenderError>;
}

/// One browser context holding a single page
///
/// A context is only ever used by one render call at a time; the pool
/// guarantees this through exclusive checkout.
#[async_trait]
pub trait RenderContext: Send {
    /// Navigates to `url`, giving up after `timeout`
    async fn navigate(&mut self, url: &str, timeout: Duration)
        -> Result<NavigationStatus, RenderError>;

    /// Serialized DOM of the current page
    async fn content(&mut self) -> Result<String, RenderError>;

    /// Returns true if `selector` currently matches an element
    async fn matches_selector(&mut self, selector: &str) -> Result<bool, RenderError>;

    /// Clears page state before the context is handed to another render
    async fn reset(&mut self) -> Result<(), RenderError> {
        Ok(())
    }

    async fn close(self: Box<Self>) -> Result<(), RenderError>;
}

/// Result of one render call
#[derive(Debug, Clone, Default)]
pub struct RenderOutcome {
    /// Rendered HTML; present on success and on selector timeout
    pub html: Option<String>,
    pub status: Option<u16>,
    pub final_url: Option<String>,

    /// The wait selector that matched first, if any
    pub matched_selector: Option<String>,
    pub media_urls: Vec<String>,
    pub elapsed: Duration,
    pub error: Option<RenderError>,
}

impl RenderOutcome {
    pub fn failed(error: RenderError, elapsed: Duration) -> Self {
        Self {
            elapsed,
            error: Some(error),
            ..Self::default()
        }
    }

    /// Returns true if the HTML can be handed to extraction
    pub fn is_usable(&self) -> bool {
        self.html.is_some()
            && self
                .error
                .as_ref()
                .map(RenderError::is_selector_timeout)
                .unwrap_or(true)
    }

    pub fn html(&self) -> Option<&str> {
        self.html.as_deref()
    }

    pub fn elapsed_ms(&self) -> f64 {
        self.elapsed.as_secs_f64() * 1000.0
    }
}
