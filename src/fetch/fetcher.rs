use crate::config::FetchSpec;
use crate::fetch::client::build_http_client;
use crate::PagepressError;
use reqwest::Client;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use url::Url;

/// Transport-level fetch failures
///
/// HTTP status codes are not errors at this layer; a 404 or 503 comes back
/// as a normal [`FetchOutcome`] with `status` populated.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("Request timeout for {url}")]
    Timeout { url: String },

    #[error("Connection failed for {url}: {message}")]
    Connect { url: String, message: String },

    #[error("Failed to read response body from {url}: {message}")]
    Body { url: String, message: String },

    #[error("HTTP error for {url}: {message}")]
    Transport { url: String, message: String },

    #[error("Invalid URL {url}: {message}")]
    InvalidUrl { url: String, message: String },
}

impl FetchError {
    /// Returns true if another attempt may succeed
    ///
    /// Timeouts, refused connections and bodies cut off mid-read are
    /// retried. Malformed URLs, redirect loops and protocol errors are not.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. } | Self::Connect { .. } | Self::Body { .. }
        )
    }

    fn from_reqwest(url: &str, e: reqwest::Error) -> Self {
        let url = url.to_string();
        if e.is_timeout() {
            Self::Timeout { url }
        } else if e.is_connect() {
            Self::Connect {
                url,
                message: e.to_string(),
            }
        } else if e.is_body() || e.is_decode() {
            Self::Body {
                url,
                message: e.to_string(),
            }
        } else {
            Self::Transport {
                url,
                message: e.to_string(),
            }
        }
    }
}

/// Result of a fetch operation
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    /// The requested URL
    pub url: String,

    /// Final URL after redirects
    pub final_url: Option<String>,

    /// Page body (None when the transport failed)
    pub html: Option<String>,

    /// HTTP status code (None when the transport failed)
    pub status: Option<u16>,

    /// Wall time across all attempts
    pub elapsed: Duration,

    /// Number of attempts made
    pub attempts: u32,

    pub error: Option<FetchError>,
}

impl FetchOutcome {
    /// Returns true if a body arrived with a 2xx status
    pub fn is_success(&self) -> bool {
        self.error.is_none()
            && self.html.is_some()
            && self.status.map(|s| (200..300).contains(&s)).unwrap_or(false)
    }

    pub fn elapsed_ms(&self) -> f64 {
        self.elapsed.as_secs_f64() * 1000.0
    }

    /// The body, if any, regardless of status
    pub fn html(&self) -> Option<&str> {
        self.html.as_deref()
    }

    /// A transport failure with nothing fetched
    pub fn failed(url: &str, error: FetchError, elapsed: Duration, attempts: u32) -> Self {
        Self {
            url: url.to_string(),
            final_url: None,
            html: None,
            status: None,
            elapsed,
            attempts,
            error: Some(error),
        }
    }
}

struct FetchedPage {
    final_url: String,
    status: u16,
    body: String,
}

/// Issues lightweight HTTP requests with retry and timeout policy
///
/// Cloning is cheap; clones share the same connection pool.
#[derive(Clone)]
pub struct Fetcher {
    client: Client,
    spec: Arc<FetchSpec>,
}

impl Fetcher {
    /// Creates a fetcher with a client built from `spec`
    pub fn new(spec: FetchSpec) -> Result<Self, PagepressError> {
        let client = build_http_client(&spec)?;
        Ok(Self::with_client(client, spec))
    }

    /// Creates a fetcher around an existing client
    pub fn with_client(client: Client, spec: FetchSpec) -> Self {
        Self {
            client,
            spec: Arc::new(spec),
        }
    }

    pub fn spec(&self) -> &FetchSpec {
        &self.spec
    }

    /// Fetches a URL with bounded retries
    ///
    /// # Retry Logic
    ///
    /// | Condition | Action |
    /// |-----------|--------|
    /// | Any HTTP status (2xx-5xx) | Returned as data, no retry |
    /// | Timeout | Retry up to `retries` times, exponential backoff |
    /// | Connection refused/reset | Retry up to `retries` times, exponential backoff |
    /// | Body cut off mid-read | Retry up to `retries` times, exponential backoff |
    /// | Malformed URL | Immediate failure |
    ///
    /// # Returns
    ///
    /// A FetchOutcome; this method never fails outright
    pub async fn fetch(&self, url: &str) -> FetchOutcome {
        let start = Instant::now();
        let max_attempts = self.spec.retries.saturating_add(1);
        let mut attempts = 0;

        if let Err(e) = Url::parse(url) {
            let error = FetchError::InvalidUrl {
                url: url.to_string(),
                message: e.to_string(),
            };
            return FetchOutcome::failed(url, error, start.elapsed(), 0);
        }

        loop {
            attempts += 1;
            match self.fetch_once(url).await {
                Ok(page) => {
                    tracing::debug!(
                        url = %url,
                        status = page.status,
                        attempts,
                        bytes = page.body.len(),
                        "Fetched page"
                    );
                    return FetchOutcome {
                        url: url.to_string(),
                        final_url: Some(page.final_url),
                        html: Some(page.body),
                        status: Some(page.status),
                        elapsed: start.elapsed(),
                        attempts,
                        error: None,
                    };
                }
                Err(error) if error.is_transient() && attempts < max_attempts => {
                    let delay = self.backoff(attempts);
                    tracing::trace!(
                        url = %url,
                        attempt = attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "Transient fetch error, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(error) => {
                    tracing::debug!(url = %url, attempts, error = %error, "Fetch failed");
                    return FetchOutcome::failed(url, error, start.elapsed(), attempts);
                }
            }
        }
    }

    async fn fetch_once(&self, url: &str) -> Result<FetchedPage, FetchError> {
        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(url, e))?;

        let status = response.status().as_u16();
        let final_url = response.url().to_string();

        // Stop reading once max_bytes is reached
        let limit = self.spec.max_bytes.unwrap_or(usize::MAX);
        let mut bytes = Vec::new();
        while bytes.len() < limit {
            let chunk = response
                .chunk()
                .await
                .map_err(|e| FetchError::from_reqwest(url, e))?;
            let Some(chunk) = chunk else {
                break;
            };
            let take = (limit - bytes.len()).min(chunk.len());
            bytes.extend_from_slice(&chunk[..take]);
        }
        let body = String::from_utf8_lossy(&bytes).into_owned();

        Ok(FetchedPage {
            final_url,
            status,
            body,
        })
    }

    /// Delay before the next attempt: base * 2^(attempt - 1)
    fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u64 << attempt.saturating_sub(1).min(6);
        Duration::from_millis(self.spec.retry_backoff_ms.saturating_mul(factor))
    }
}
