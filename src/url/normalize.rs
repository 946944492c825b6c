use crate::UrlError;
use url::Url;

/// Canonicalizes a URL for use as a deduplication key
///
/// # Canonicalization Steps
///
/// 1. Parse the URL; reject if malformed
/// 2. Accept only HTTP and HTTPS schemes
/// 3. Lowercase the host (the scheme is lowercased by the parser)
/// 4. Normalize the path:
///    - Remove dot segments (. and ..)
///    - Collapse repeated slashes
///    - Empty path becomes /
/// 5. Remove the fragment (everything after #)
/// 6. Sort query parameters by key, keeping the original order of equal keys,
///    or drop the query entirely when `strip_query` is set
/// 7. Remove an empty query string (trailing ?)
///
/// Two URLs that differ only by fragment or by query-parameter order produce
/// the same canonical form.
///
/// # Examples
///
/// ```
/// use pagepress::url::canonicalize_url;
///
/// let url = canonicalize_url("HTTP://Example.COM/a/./b?z=1&a=2#top", false).unwrap();
/// assert_eq!(url.as_str(), "http://example.com/a/b?a=2&z=1");
/// ```
pub fn canonicalize_url(url_str: &str, strip_query: bool) -> Result<Url, UrlError> {
    let mut url = Url::parse(url_str.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS schemes are supported, got: {}",
            url.scheme()
        )));
    }

    let host = url
        .host_str()
        .map(|h| h.to_lowercase())
        .ok_or(UrlError::MissingDomain)?;
    url.set_host(Some(&host))
        .map_err(|e| UrlError::Malformed(format!("Failed to set host: {}", e)))?;

    let normalized_path = normalize_path(url.path());
    url.set_path(&normalized_path);

    url.set_fragment(None);

    if strip_query {
        url.set_query(None);
    } else if url.query().is_some() {
        let params = sorted_query_params(&url);
        if params.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut().clear().extend_pairs(params);
        }
    }

    Ok(url)
}

/// Normalizes a URL path by removing dot segments and repeated slashes
///
/// A trailing slash is preserved, since many servers treat `/list/` and
/// `/list` as different resources.
fn normalize_path(path: &str) -> String {
    if path.is_empty() {
        return "/".to_string();
    }

    let mut normalized_segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => continue,
            ".." => {
                normalized_segments.pop();
            }
            _ => normalized_segments.push(segment),
        }
    }

    if normalized_segments.is_empty() {
        return "/".to_string();
    }

    let mut result = format!("/{}", normalized_segments.join("/"));
    if path.ends_with('/') {
        result.push('/');
    }
    result
}

/// Collects query parameters sorted by key (stable for repeated keys)
fn sorted_query_params(url: &Url) -> Vec<(String, String)> {
    let mut params: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

    params.sort_by(|a, b| a.0.cmp(&b.0));
    params
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keeps_scheme() {
        let result = canonicalize_url("http://example.com/page", false).unwrap();
        assert_eq!(result.as_str(), "http://example.com/page");
    }

    #[test]
    fn test_keep_root_slash() {
        let result = canonicalize_url("https://example.com/", false).unwrap();
        assert_eq!(result.as_str(), "https://example.com/");
    }

    #[test]
    fn test_keep_trailing_slash() {
        let result = canonicalize_url("https://example.com/news/", false).unwrap();
        assert_eq!(result.as_str(), "https://example.com/news/");
    }

    #[test]
    fn test_remove_fragment() {
        let result = canonicalize_url("https://example.com/page#section", false).unwrap();
        assert_eq!(result.as_str(), "https://example.com/page");
    }

    #[test]
    fn test_sort_query_params() {
        let result = canonicalize_url("https://example.com/page?b=2&a=1", false).unwrap();
        assert_eq!(result.as_str(), "https://example.com/page?a=1&b=2");
    }

    #[test]
    fn test_query_order_and_fragment_collapse() {
        let a = canonicalize_url("https://example.com/p?x=1&y=2#one", false).unwrap();
        let b = canonicalize_url("https://example.com/p?y=2&x=1#two", false).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_strip_query() {
        let result = canonicalize_url("https://example.com/page?id=7&utm_source=x", true).unwrap();
        assert_eq!(result.as_str(), "https://example.com/page");
    }

    #[test]
    fn test_empty_query_removed() {
        let result = canonicalize_url("https://example.com/page?", false).unwrap();
        assert_eq!(result.as_str(), "https://example.com/page");
    }

    #[test]
    fn test_normalize_path_with_dots() {
        let result = canonicalize_url("https://example.com/a/../b/./c", false).unwrap();
        assert_eq!(result.as_str(), "https://example.com/b/c");
    }

    #[test]
    fn test_lowercase_domain() {
        let result = canonicalize_url("https://EXAMPLE.COM/Page", false).unwrap();
        assert_eq!(result.as_str(), "https://example.com/Page");
    }

    #[test]
    fn test_invalid_scheme() {
        let result = canonicalize_url("ftp://example.com/page", false);
        assert!(matches!(result.unwrap_err(), UrlError::InvalidScheme(_)));
    }

    #[test]
    fn test_malformed_url() {
        assert!(canonicalize_url("not a url", false).is_err());
    }

    #[test]
    fn test_empty_path_becomes_root() {
        let result = canonicalize_url("https://example.com", false).unwrap();
        assert_eq!(result.as_str(), "https://example.com/");
    }

    #[test]
    fn test_multiple_slashes() {
        let result = canonicalize_url("https://example.com///path//to///page", false).unwrap();
        assert_eq!(result.as_str(), "https://example.com/path/to/page");
    }

    #[test]
    fn test_port_preserved() {
        let result = canonicalize_url("http://127.0.0.1:8080/list?b=1&a=2", false).unwrap();
        assert_eq!(result.as_str(), "http://127.0.0.1:8080/list?a=2&b=1");
    }
}
