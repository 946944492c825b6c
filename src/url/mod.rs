//! URL handling module for Pagepress
//!
//! This module provides URL canonicalization (the crawl deduplication key),
//! host extraction, and wildcard domain matching.

mod domain;
mod matcher;
mod normalize;

pub use domain::{extract_domain, host_of};
pub use matcher::{first_match, matches_domain};
pub use normalize::canonicalize_url;
