//! Link discovery across list and feed pages
//!
//! This module contains:
//! - Link extraction from fetched HTML
//! - Host and URL-pattern filtering of discovered links
//! - Frontier bookkeeping (visited set, budget, per-entry state)
//! - The breadth-first [`CrawlEngine`]

mod engine;
mod filter;
mod parser;
mod state;

pub use engine::{CrawlEngine, CrawlReport};
pub use filter::{LinkFilter, UrlRules};
pub use parser::extract_links;
pub use state::{Admission, CrawlState, DiscoveredUrl, FrontierState};
