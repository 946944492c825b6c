use crate::config::{RenderSpec, SelectorRule};
use crate::url::matches_domain;

/// Structural selectors tried when nothing more specific is configured
pub const DEFAULT_WAIT_SELECTORS: &[&str] = &[
    "article",
    "main article",
    "[itemprop=articleBody]",
    ".article-content",
    ".article-body",
    ".post-content",
    ".entry-content",
    "#article",
    "main",
];

/// Resolves the ordered wait-selector candidates for a host
///
/// Priority, highest first:
///
/// 1. Explicit `wait_selectors`
/// 2. Selectors of every `selector_rules` entry whose domain matches the host,
///    in rule order
/// 3. [`DEFAULT_WAIT_SELECTORS`] when `auto_wait_selector` is set
///
/// Only the highest non-empty tier is used; the render stage waits for
/// whichever of its selectors appears first.
#[derive(Debug, Clone, Default)]
pub struct SelectorRegistry {
    explicit: Vec<String>,
    rules: Vec<SelectorRule>,
    defaults: Vec<String>,
}

impl SelectorRegistry {
    pub fn new(explicit: Vec<String>, rules: Vec<SelectorRule>, auto: bool) -> Self {
        let defaults = if auto {
            DEFAULT_WAIT_SELECTORS.iter().map(|s| s.to_string()).collect()
        } else {
            Vec::new()
        };
        Self {
            explicit,
            rules,
            defaults,
        }
    }

    pub fn from_spec(spec: &RenderSpec) -> Self {
        Self::new(
            spec.wait_selectors.clone(),
            spec.selector_rules.clone(),
            spec.auto_wait_selector,
        )
    }

    /// Candidate selectors for `host`, deduplicated and in priority order
    pub fn candidates(&self, host: &str) -> Vec<String> {
        if !self.explicit.is_empty() {
            return dedup(self.explicit.iter());
        }

        let from_rules = dedup(
            self.rules
                .iter()
                .filter(|rule| matches_domain(&rule.domain, host))
                .flat_map(|rule| rule.selectors.iter()),
        );
        if !from_rules.is_empty() {
            return from_rules;
        }

        self.defaults.clone()
    }
}

fn dedup<'a>(selectors: impl Iterator<Item = &'a String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for selector in selectors {
        let selector = selector.trim();
        if !selector.is_empty() && !out.iter().any(|s| s == selector) {
            out.push(selector.to_string());
        }
    }
    out
}
