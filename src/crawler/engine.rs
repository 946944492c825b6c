use super::filter::{LinkFilter, UrlRules};
use super::parser::extract_links;
use super::state::{Admission, CrawlState, DiscoveredUrl, FrontierState};
use crate::config::CrawlSpec;
use crate::fetch::Fetcher;
use crate::scheduler::ConcurrencyScheduler;
use crate::url::{canonicalize_url, extract_domain};
use crate::ConfigError;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use url::Url;

/// Summary of a finished crawl
#[derive(Debug, Clone, Default)]
pub struct CrawlReport {
    /// Discovered URLs in admission order; seeds are not included
    pub discovered: Vec<DiscoveredUrl>,

    /// Frontier entries whose links were extracted
    pub pages_fetched: usize,

    /// Frontier entries whose fetch failed
    pub pages_failed: usize,

    pub elapsed: Duration,
}

impl CrawlReport {
    pub fn urls(&self) -> Vec<String> {
        self.discovered.iter().map(|d| d.url.clone()).collect()
    }
}

/// Breadth-first link discovery across list and feed pages
///
/// Each run owns its own [`CrawlState`]. Levels are processed one at a time
/// so every depth-`d` page is done before any depth-`d+1` page is fetched;
/// within a level up to `max_workers` fetches run at once.
#[derive(Clone)]
pub struct CrawlEngine {
    fetcher: Fetcher,
    spec: Arc<CrawlSpec>,
    rules: Arc<UrlRules>,
}

impl CrawlEngine {
    /// Creates an engine; fails if an allow/deny pattern does not compile
    pub fn new(fetcher: Fetcher, spec: CrawlSpec) -> Result<Self, ConfigError> {
        let rules = UrlRules::from_spec(&spec)?;
        Ok(Self {
            fetcher,
            spec: Arc::new(spec),
            rules: Arc::new(rules),
        })
    }

    pub fn spec(&self) -> &CrawlSpec {
        &self.spec
    }

    /// Crawls from `seeds` until the frontier is empty or the budget is spent
    ///
    /// Invalid seeds are logged and skipped. Page failures are recorded and
    /// never abort the run.
    pub async fn run(&self, seeds: &[String]) -> CrawlReport {
        let start = Instant::now();
        let mut state = CrawlState::new(self.spec.max_pages, self.spec.max_depth);
        let mut seed_hosts = HashSet::new();

        for seed in seeds {
            match canonicalize_url(seed, self.rules.strip_query()) {
                Ok(url) => {
                    if let Some(host) = extract_domain(&url) {
                        seed_hosts.insert(host);
                    }
                    state.seed(url);
                }
                Err(e) => tracing::warn!(url = %seed, error = %e, "Skipping invalid seed"),
            }
        }

        let filter = LinkFilter::new(Arc::clone(&self.rules), seed_hosts);
        let state = Arc::new(Mutex::new(state));
        let scheduler = ConcurrencyScheduler::new(self.spec.max_workers);

        tracing::info!(
            seeds = seeds.len(),
            max_pages = self.spec.max_pages,
            max_depth = self.spec.max_depth,
            workers = scheduler.max_workers(),
            "Starting crawl"
        );

        loop {
            let level = {
                let mut guard = state.lock().await;
                if guard.budget_exhausted() {
                    break;
                }
                guard.take_level()
            };
            let Some(depth) = level.first().map(|(_, d)| *d) else {
                break;
            };

            tracing::debug!(depth, pages = level.len(), "Fetching crawl level");

            let tasks = level.into_iter().map(|(url, depth)| {
                let fetcher = self.fetcher.clone();
                let filter = filter.clone();
                let state = Arc::clone(&state);
                async move { visit(fetcher, filter, state, url, depth).await }
            });
            for result in scheduler.run(tasks).await {
                if let Err(e) = result {
                    tracing::error!(depth, error = %e, "Crawl task failed");
                }
            }
        }

        let state = state.lock().await;
        let report = CrawlReport {
            discovered: state.discovered().to_vec(),
            pages_fetched: state.count_in(FrontierState::LinksExtracted),
            pages_failed: state.count_in(FrontierState::Failed),
            elapsed: start.elapsed(),
        };

        tracing::info!(
            discovered = report.discovered.len(),
            fetched = report.pages_fetched,
            failed = report.pages_failed,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "Crawl finished"
        );
        report
    }
}

/// Fetches one frontier entry and offers its links to the frontier
async fn visit(
    fetcher: Fetcher,
    filter: LinkFilter,
    state: Arc<Mutex<CrawlState>>,
    url: Url,
    depth: u32,
) -> FrontierState {
    {
        let mut guard = state.lock().await;
        if guard.budget_exhausted() {
            return FrontierState::Queued;
        }
        guard.mark(url.as_str(), FrontierState::Fetching);
    }

    let outcome = fetcher.fetch(url.as_str()).await;
    let html = match (&outcome.error, outcome.html()) {
        (None, Some(html)) if outcome.is_success() => html,
        _ => {
            tracing::warn!(
                url = %url,
                depth,
                status = ?outcome.status,
                error = ?outcome.error.as_ref().map(|e| e.to_string()),
                "Crawl fetch failed"
            );
            state.lock().await.mark(url.as_str(), FrontierState::Failed);
            return FrontierState::Failed;
        }
    };

    let base = outcome
        .final_url
        .as_deref()
        .and_then(|u| Url::parse(u).ok())
        .unwrap_or_else(|| url.clone());
    let candidates: Vec<Url> = extract_links(html, &base)
        .iter()
        .filter_map(|link| filter.canonical(link))
        .collect();

    let mut guard = state.lock().await;
    let mut admitted = 0usize;
    for link in candidates {
        match guard.admit(link, depth + 1) {
            Admission::Admitted => admitted += 1,
            Admission::Duplicate => {}
            Admission::BudgetExhausted => break,
        }
    }
    guard.mark(url.as_str(), FrontierState::LinksExtracted);

    tracing::debug!(url = %url, depth, admitted, "Extracted links");
    FrontierState::LinksExtracted
}
