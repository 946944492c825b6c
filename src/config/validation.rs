use crate::config::types::{
    CrawlSpec, ExtractSpec, FetchSpec, PipelineConfig, ProxyConfig, RenderSpec, SelectorRule,
};
use crate::ConfigError;
use regex::Regex;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &PipelineConfig) -> Result<(), ConfigError> {
    validate_fetch_spec(&config.fetch)?;
    validate_render_spec(&config.render)?;
    validate_extract_spec(&config.extract)?;
    validate_crawl_spec(&config.crawl)?;
    Ok(())
}

fn validate_fetch_spec(spec: &FetchSpec) -> Result<(), ConfigError> {
    if spec.timeout_ms == 0 {
        return Err(ConfigError::Validation(
            "fetch.timeout_ms must be greater than 0".to_string(),
        ));
    }

    if spec.retries > 10 {
        return Err(ConfigError::Validation(format!(
            "fetch.retries must be at most 10, got {}",
            spec.retries
        )));
    }

    if spec.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "fetch.user_agent cannot be empty".to_string(),
        ));
    }

    if spec.max_bytes == Some(0) {
        return Err(ConfigError::Validation(
            "fetch.max_bytes must be greater than 0 when set".to_string(),
        ));
    }

    if let Some(proxy) = &spec.proxy {
        validate_proxy(proxy, "fetch")?;
    }

    Ok(())
}

fn validate_render_spec(spec: &RenderSpec) -> Result<(), ConfigError> {
    if spec.timeout_ms == 0 {
        return Err(ConfigError::Validation(
            "render.timeout_ms must be greater than 0".to_string(),
        ));
    }

    if spec.pool_size < 1 || spec.pool_size > 64 {
        return Err(ConfigError::Validation(format!(
            "render.pool_size must be between 1 and 64, got {}",
            spec.pool_size
        )));
    }

    for selector in &spec.wait_selectors {
        validate_selector(selector)?;
    }

    for rule in &spec.selector_rules {
        validate_selector_rule(rule)?;
    }

    if let Some(proxy) = &spec.proxy {
        validate_proxy(proxy, "render")?;
    }

    Ok(())
}

fn validate_extract_spec(spec: &ExtractSpec) -> Result<(), ConfigError> {
    if spec.min_text_len > 1_000_000 {
        return Err(ConfigError::Validation(format!(
            "extract.min_text_len must be at most 1000000, got {}",
            spec.min_text_len
        )));
    }
    Ok(())
}

fn validate_crawl_spec(spec: &CrawlSpec) -> Result<(), ConfigError> {
    if spec.max_workers < 1 || spec.max_workers > 256 {
        return Err(ConfigError::Validation(format!(
            "crawl.max_workers must be between 1 and 256, got {}",
            spec.max_workers
        )));
    }

    for pattern in &spec.allow_domains {
        validate_domain_pattern(pattern)?;
    }

    for pattern in spec.allow_patterns.iter().chain(spec.deny_patterns.iter()) {
        Regex::new(pattern).map_err(|e| {
            ConfigError::InvalidPattern(format!("Invalid URL pattern '{}': {}", pattern, e))
        })?;
    }

    Ok(())
}

fn validate_proxy(proxy: &ProxyConfig, section: &str) -> Result<(), ConfigError> {
    for value in [&proxy.server, &proxy.http, &proxy.https].into_iter().flatten() {
        Url::parse(value).map_err(|e| {
            ConfigError::InvalidUrl(format!("Invalid {} proxy '{}': {}", section, value, e))
        })?;
    }
    Ok(())
}

fn validate_selector_rule(rule: &SelectorRule) -> Result<(), ConfigError> {
    validate_domain_pattern(&rule.domain)?;

    if rule.selectors.is_empty() {
        return Err(ConfigError::Validation(format!(
            "Selector rule for '{}' must have at least one selector",
            rule.domain
        )));
    }

    for selector in &rule.selectors {
        validate_selector(selector)?;
    }

    Ok(())
}

fn validate_selector(selector: &str) -> Result<(), ConfigError> {
    scraper::Selector::parse(selector)
        .map(|_| ())
        .map_err(|_| ConfigError::Validation(format!("Invalid CSS selector '{}'", selector)))
}

/// Validates a domain pattern (supports wildcards)
fn validate_domain_pattern(pattern: &str) -> Result<(), ConfigError> {
    if pattern.is_empty() {
        return Err(ConfigError::InvalidPattern(
            "Domain pattern cannot be empty".to_string(),
        ));
    }

    let domain = pattern.strip_prefix("*.").unwrap_or(pattern);
    validate_domain_string(domain)
}

/// Validates a domain string (without wildcard prefix)
fn validate_domain_string(domain: &str) -> Result<(), ConfigError> {
    if domain.is_empty() {
        return Err(ConfigError::InvalidPattern(
            "Domain cannot be empty".to_string(),
        ));
    }

    if !domain
        .chars()
        .all(|c| c.is_alphanumeric() || c == '.' || c == '-')
    {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' contains invalid characters",
            domain
        )));
    }

    if domain.starts_with('.')
        || domain.ends_with('.')
        || domain.starts_with('-')
        || domain.ends_with('-')
    {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' cannot start or end with '.' or '-'",
            domain
        )));
    }

    if domain.contains("..") {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' cannot contain consecutive dots",
            domain
        )));
    }

    Ok(())
}
