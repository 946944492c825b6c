use crate::config::CrawlSpec;
use crate::url::{canonicalize_url, extract_domain, matches_domain};
use crate::ConfigError;
use regex::Regex;
use std::collections::HashSet;
use std::sync::Arc;
use url::Url;

/// Compiled allow/deny rules from a [`CrawlSpec`]
#[derive(Debug, Clone)]
pub struct UrlRules {
    same_host_only: bool,
    strip_query: bool,
    allow_domains: Vec<String>,
    allow: Vec<Regex>,
    deny: Vec<Regex>,
}

impl UrlRules {
    pub fn from_spec(spec: &CrawlSpec) -> Result<Self, ConfigError> {
        Ok(Self {
            same_host_only: spec.same_host_only,
            strip_query: spec.strip_query,
            allow_domains: spec.allow_domains.clone(),
            allow: compile(&spec.allow_patterns)?,
            deny: compile(&spec.deny_patterns)?,
        })
    }

    pub fn strip_query(&self) -> bool {
        self.strip_query
    }
}

fn compile(patterns: &[String]) -> Result<Vec<Regex>, ConfigError> {
    patterns
        .iter()
        .map(|p| {
            Regex::new(p).map_err(|e| {
                ConfigError::InvalidPattern(format!("Invalid URL pattern '{}': {}", p, e))
            })
        })
        .collect()
}

/// Decides which discovered links may enter the frontier
///
/// # Host Rules
///
/// | Setting | Admitted hosts |
/// |---------|----------------|
/// | `allow_domains` non-empty | hosts matching one of the patterns |
/// | `same_host_only` | the seed hosts |
/// | neither | any host |
///
/// The URL patterns apply afterwards: the canonical URL must match one of
/// `allow_patterns` (when given) and none of `deny_patterns`.
#[derive(Debug, Clone)]
pub struct LinkFilter {
    rules: Arc<UrlRules>,
    seed_hosts: Arc<HashSet<String>>,
}

impl LinkFilter {
    /// Binds the rules to the hosts of one run's seeds
    pub fn new(rules: Arc<UrlRules>, seed_hosts: HashSet<String>) -> Self {
        Self {
            rules,
            seed_hosts: Arc::new(seed_hosts),
        }
    }

    /// Canonicalizes `link` and returns it if the rules admit it
    pub fn canonical(&self, link: &str) -> Option<Url> {
        let url = canonicalize_url(link, self.rules.strip_query).ok()?;
        self.admits(&url).then_some(url)
    }

    pub fn admits(&self, url: &Url) -> bool {
        let Some(host) = extract_domain(url) else {
            return false;
        };

        let host_ok = if !self.rules.allow_domains.is_empty() {
            self.rules
                .allow_domains
                .iter()
                .any(|pattern| matches_domain(pattern, &host))
        } else if self.rules.same_host_only {
            self.seed_hosts.contains(&host)
        } else {
            true
        };
        if !host_ok {
            return false;
        }

        let url = url.as_str();
        if !self.rules.allow.is_empty() && !self.rules.allow.iter().any(|re| re.is_match(url)) {
            return false;
        }
        !self.rules.deny.iter().any(|re| re.is_match(url))
    }
}
