//! Pagepress: an adaptive article extraction pipeline
//!
//! This crate turns web pages into structured article content. Each page is
//! fetched with a lightweight HTTP request first; a headless render pass is
//! only attempted when the fetched markup looks incomplete. List and feed
//! pages can be crawled breadth-first to discover article URLs, which are
//! then extracted under a bounded worker pool.

pub mod config;
pub mod crawler;
pub mod decision;
pub mod extract;
pub mod fetch;
pub mod pipeline;
pub mod render;
pub mod scheduler;
pub mod url;

use thiserror::Error;

/// Main error type for Pagepress operations
///
/// Per-URL failures never surface through this type; they are recorded in
/// [`pipeline::ExtractResult::error`]. This type covers system-level failures
/// such as an invalid configuration or an HTTP client that cannot be built.
#[derive(Debug, Error)]
pub enum PagepressError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid domain pattern: {0}")]
    InvalidPattern(String),

    #[error("Missing capability: {0}")]
    MissingCapability(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing domain in URL")]
    MissingDomain,

    #[error("Malformed URL: {0}")]
    Malformed(String),
}

/// Result type alias for Pagepress operations
pub type Result<T> = std::result::Result<T, PagepressError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::PipelineConfig;
pub use pipeline::{ExtractResult, Pipeline, PipelineBuilder, ResultError};
pub use url::{canonicalize_url, extract_domain};
