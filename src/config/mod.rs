//! Configuration module for Pagepress
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//! Every field has a default, so an empty file (or no file) is a valid configuration.
//!
//! # Example
//!
//! ```no_run
//! use pagepress::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("pagepress.toml")).unwrap();
//! println!("Crawl will stop after {} pages", config.crawl.max_pages);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    BlockedResource, CrawlSpec, ExtractSpec, FetchSpec, OutputFormat, PipelineConfig,
    ProxyConfig, RenderMode, RenderSpec, SelectorRule, DEFAULT_USER_AGENT,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
pub use validation::validate;
