//! Frontier bookkeeping for a single crawl run

use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fmt;
use url::Url;

/// Lifecycle of a frontier entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrontierState {
    /// Waiting for its level to be fetched
    Queued,

    /// Fetch in flight
    Fetching,

    // ===== Terminal States =====
    /// Fetched and its links were offered to the frontier
    LinksExtracted,

    /// Fetch failed or returned a non-2xx status; children are unknown
    Failed,
}

impl FrontierState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::LinksExtracted | Self::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Fetching => "fetching",
            Self::LinksExtracted => "links_extracted",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for FrontierState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A URL found by the crawl, in canonical form
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiscoveredUrl {
    pub url: String,
    pub depth: u32,
}

/// Outcome of offering a link to the frontier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Admitted,
    Duplicate,
    BudgetExhausted,
}

/// Visited set, discovered list and the next BFS level
///
/// A URL enters `visited` at the moment it is admitted, before any of its
/// own links are looked at, so it can never be queued twice. `discovered`
/// never grows past `max_pages`. Entries at `max_depth` are discovered but
/// never queued for fetching.
#[derive(Debug)]
pub struct CrawlState {
    max_pages: usize,
    max_depth: u32,
    visited: HashSet<String>,
    states: HashMap<String, FrontierState>,
    next_level: Vec<(Url, u32)>,
    discovered: Vec<DiscoveredUrl>,
}

impl CrawlState {
    pub fn new(max_pages: usize, max_depth: u32) -> Self {
        Self {
            max_pages,
            max_depth,
            visited: HashSet::new(),
            states: HashMap::new(),
            next_level: Vec::new(),
            discovered: Vec::new(),
        }
    }

    /// Registers a seed at depth 0
    ///
    /// Seeds are queued for fetching and not reported as discovered. With
    /// `max_depth == 0` nothing is fetched and the seeds themselves are the
    /// discovered URLs. Returns false for a seed already registered.
    pub fn seed(&mut self, url: Url) -> bool {
        if !self.visited.insert(url.as_str().to_string()) {
            return false;
        }
        if self.max_depth > 0 {
            self.states
                .insert(url.as_str().to_string(), FrontierState::Queued);
            self.next_level.push((url, 0));
        } else if !self.budget_exhausted() {
            self.discovered.push(DiscoveredUrl {
                url: url.as_str().to_string(),
                depth: 0,
            });
        }
        true
    }

    /// Offers a canonical link found at `depth`
    pub fn admit(&mut self, url: Url, depth: u32) -> Admission {
        if self.visited.contains(url.as_str()) {
            return Admission::Duplicate;
        }
        if self.budget_exhausted() {
            return Admission::BudgetExhausted;
        }

        let key = url.as_str().to_string();
        self.visited.insert(key.clone());
        self.discovered.push(DiscoveredUrl {
            url: key.clone(),
            depth,
        });
        if depth < self.max_depth {
            self.states.insert(key, FrontierState::Queued);
            self.next_level.push((url, depth));
        }
        Admission::Admitted
    }

    pub fn mark(&mut self, url: &str, state: FrontierState) {
        self.states.insert(url.to_string(), state);
    }

    pub fn state_of(&self, url: &str) -> Option<FrontierState> {
        self.states.get(url).copied()
    }

    pub fn count_in(&self, state: FrontierState) -> usize {
        self.states.values().filter(|s| **s == state).count()
    }

    /// Removes and returns every entry queued for the next level
    pub fn take_level(&mut self) -> Vec<(Url, u32)> {
        std::mem::take(&mut self.next_level)
    }

    pub fn budget_exhausted(&self) -> bool {
        self.discovered.len() >= self.max_pages
    }

    pub fn visited_count(&self) -> usize {
        self.visited.len()
    }

    pub fn discovered(&self) -> &[DiscoveredUrl] {
        &self.discovered
    }

    pub fn into_discovered(self) -> Vec<DiscoveredUrl> {
        self.discovered
    }
}
