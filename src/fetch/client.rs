use crate::config::{FetchSpec, ProxyConfig};
use crate::{ConfigError, PagepressError};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, COOKIE};
use reqwest::{redirect::Policy, Client, Proxy};
use std::collections::BTreeMap;
use std::time::Duration;

/// Builds an HTTP client with proper configuration
///
/// The client keeps connections alive between calls and is safe to share
/// across tasks; each fetch through it is still logically independent.
///
/// # Arguments
///
/// * `spec` - The fetch settings (user agent, proxy, headers, cookies, timeout)
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(PagepressError)` - A header or proxy value was rejected
///
/// # Example
///
/// ```no_run
/// use pagepress::config::FetchSpec;
/// use pagepress::fetch::build_http_client;
///
/// let client = build_http_client(&FetchSpec::default()).unwrap();
/// ```
pub fn build_http_client(spec: &FetchSpec) -> Result<Client, PagepressError> {
    let headers = build_default_headers(&spec.headers, &spec.cookies)?;

    let mut builder = Client::builder()
        .user_agent(spec.user_agent.clone())
        .default_headers(headers)
        .timeout(spec.timeout())
        .connect_timeout(spec.timeout().min(Duration::from_secs(10)))
        .redirect(Policy::limited(10))
        .gzip(true)
        .brotli(true);

    if let Some(proxy) = &spec.proxy {
        for p in build_proxies(proxy)? {
            builder = builder.proxy(p);
        }
    }

    Ok(builder.build()?)
}

/// Converts the opaque header and cookie maps into a header map
///
/// Cookies are joined into a single `Cookie` header; their values are never
/// inspected.
fn build_default_headers(
    headers: &BTreeMap<String, String>,
    cookies: &BTreeMap<String, String>,
) -> Result<HeaderMap, ConfigError> {
    let mut map = HeaderMap::new();

    for (name, value) in headers {
        let header_name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| ConfigError::Validation(format!("Invalid header name '{}'", name)))?;
        let header_value = HeaderValue::from_str(value)
            .map_err(|_| ConfigError::Validation(format!("Invalid value for header '{}'", name)))?;
        map.insert(header_name, header_value);
    }

    if !cookies.is_empty() {
        let cookie_line = cookie_header(cookies);
        let value = HeaderValue::from_str(&cookie_line)
            .map_err(|_| ConfigError::Validation("Invalid cookie value".to_string()))?;
        map.insert(COOKIE, value);
    }

    Ok(map)
}

/// Formats cookies as a `Cookie` header line (`a=1; b=2`)
pub(crate) fn cookie_header(cookies: &BTreeMap<String, String>) -> String {
    cookies
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Maps proxy settings to reqwest proxies
///
/// `server` applies to every scheme; otherwise `http` and `https` are
/// registered separately. Credentials apply to each proxy.
fn build_proxies(proxy: &ProxyConfig) -> Result<Vec<Proxy>, PagepressError> {
    let mut proxies = Vec::new();

    if let Some(server) = &proxy.server {
        proxies.push(Proxy::all(server.as_str())?);
    } else {
        if let Some(http) = &proxy.http {
            proxies.push(Proxy::http(http.as_str())?);
        }
        if let Some(https) = &proxy.https {
            proxies.push(Proxy::https(https.as_str())?);
        }
    }

    if let (Some(username), Some(password)) = (&proxy.username, &proxy.password) {
        proxies = proxies
            .into_iter()
            .map(|p| p.basic_auth(username, password))
            .collect();
    }

    Ok(proxies)
}
