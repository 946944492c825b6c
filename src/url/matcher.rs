/// Checks if a host matches a domain pattern
///
/// Patterns come from `render.selector-rules` and `crawl.allow-domains`.
/// Two forms are supported:
/// 1. Exact: "example.com" matches only "example.com"
/// 2. Wildcard: "*.example.com" matches "example.com" and any subdomain of it
///
/// Comparison ignores ASCII case on both sides.
///
/// # Examples
///
/// ```
/// use pagepress::url::matches_domain;
///
/// assert!(matches_domain("example.com", "Example.com"));
/// assert!(matches_domain("*.example.com", "news.example.com"));
/// assert!(!matches_domain("*.example.com", "example.org"));
/// ```
pub fn matches_domain(pattern: &str, host: &str) -> bool {
    let pattern = pattern.to_ascii_lowercase();
    let host = host.to_ascii_lowercase();

    match pattern.strip_prefix("*.") {
        Some(base) => host == base || host.ends_with(&format!(".{}", base)),
        None => host == pattern,
    }
}

/// Returns the first pattern in `patterns` that matches `host`
pub fn first_match<'a, I>(patterns: I, host: &str) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    patterns.into_iter().find(|p| matches_domain(p, host))
}
