//! Lightweight HTTP fetch stage
//!
//! This module owns the first stage of every extraction and every crawl step:
//! - Building an HTTP client from a [`FetchSpec`](crate::config::FetchSpec)
//!   (user agent, proxy, extra headers, cookies, timeout)
//! - Fetching a page with bounded retries on transient transport errors
//! - Reporting non-2xx responses as data rather than as errors

mod client;
mod fetcher;

pub use client::build_http_client;
pub use fetcher::{FetchError, FetchOutcome, Fetcher};
