use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;

/// Default desktop browser user agent sent with lightweight fetches
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Top-level pipeline configuration
///
/// Built once (from a TOML file, CLI flags, or code) and then moved into a
/// [`crate::Pipeline`], which never mutates it afterwards.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct PipelineConfig {
    pub fetch: FetchSpec,
    pub render: RenderSpec,
    pub extract: ExtractSpec,
    pub crawl: CrawlSpec,
}

/// Proxy settings shared by the fetch and render stages
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ProxyConfig {
    /// Proxy applied to every scheme; takes precedence over `http`/`https`
    pub server: Option<String>,

    /// Proxy for plain HTTP requests
    pub http: Option<String>,

    /// Proxy for HTTPS requests
    pub https: Option<String>,

    pub username: Option<String>,
    pub password: Option<String>,
}

impl ProxyConfig {
    /// A proxy that routes every scheme through one server
    pub fn server(server: impl Into<String>) -> Self {
        Self {
            server: Some(server.into()),
            ..Self::default()
        }
    }

    /// The single server a browser context should use, if any
    ///
    /// Browsers only accept one proxy server, so the scheme-specific entries
    /// are used as fallbacks in `server`, `https`, `http` order.
    pub fn render_server(&self) -> Option<&str> {
        self.server
            .as_deref()
            .or(self.https.as_deref())
            .or(self.http.as_deref())
    }

    /// Returns true if no proxy server is configured at all
    pub fn is_empty(&self) -> bool {
        self.render_server().is_none()
    }
}

/// Lightweight HTTP fetch settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct FetchSpec {
    /// Per-request timeout in milliseconds
    pub timeout_ms: u64,

    /// Additional attempts after a transient transport error
    pub retries: u32,

    /// Base delay between retries; doubles on every attempt
    pub retry_backoff_ms: u64,

    pub user_agent: String,

    /// Extra request headers, passed through verbatim
    pub headers: BTreeMap<String, String>,

    /// Cookies sent as a single `Cookie` header, passed through verbatim
    pub cookies: BTreeMap<String, String>,

    pub proxy: Option<ProxyConfig>,

    /// Response bodies are truncated to this many bytes
    pub max_bytes: Option<usize>,
}

impl Default for FetchSpec {
    fn default() -> Self {
        Self {
            timeout_ms: 15_000,
            retries: 2,
            retry_backoff_ms: 250,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            headers: BTreeMap::new(),
            cookies: BTreeMap::new(),
            proxy: None,
            max_bytes: Some(2_000_000),
        }
    }
}

impl FetchSpec {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Policy governing whether a headless render pass is attempted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderMode {
    /// Render only when the fetched page looks incomplete
    #[default]
    Auto,
    /// Always render
    Always,
    /// Never render
    Never,
}

impl std::str::FromStr for RenderMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "always" => Ok(Self::Always),
            "never" => Ok(Self::Never),
            other => Err(format!("unknown render mode '{}'", other)),
        }
    }
}

impl std::fmt::Display for RenderMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Auto => "auto",
            Self::Always => "always",
            Self::Never => "never",
        })
    }
}

/// Resource types a render context refuses to load
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockedResource {
    Image,
    Font,
    Media,
    Stylesheet,
}

/// Ordered wait selectors for hosts matching a wildcard domain pattern
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SelectorRule {
    /// Domain pattern (e.g., "example.com" or "*.example.com")
    pub domain: String,

    /// Candidate selectors, first match wins
    pub selectors: Vec<String>,
}

/// Headless render settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct RenderSpec {
    pub mode: RenderMode,

    /// Navigation and selector-wait budget in milliseconds
    pub timeout_ms: u64,

    /// Explicit wait selectors; these take priority over every rule
    pub wait_selectors: Vec<String>,

    /// Per-domain wait selectors
    pub selector_rules: Vec<SelectorRule>,

    /// Fall back to built-in structural selectors when nothing else applies
    pub auto_wait_selector: bool,

    /// When true a selector timeout yields the partial HTML; otherwise it fails
    pub ignore_wait_timeout: bool,

    pub selector_poll_ms: u64,

    pub block_resources: Vec<BlockedResource>,

    pub extra_headers: BTreeMap<String, String>,
    pub cookies: BTreeMap<String, String>,
    pub proxy: Option<ProxyConfig>,

    /// Keep browser contexts alive between renders
    pub reuse_context: bool,

    /// Upper bound on concurrently checked-out browser contexts
    pub pool_size: usize,

    /// Substrings indicating content hidden behind an "expand" control
    pub expand_markers: Vec<String>,

    /// Substrings identifying human-verification pages
    pub captcha_markers: Vec<String>,
}

impl Default for RenderSpec {
    fn default() -> Self {
        Self {
            mode: RenderMode::Auto,
            timeout_ms: 20_000,
            wait_selectors: Vec::new(),
            selector_rules: Vec::new(),
            auto_wait_selector: true,
            ignore_wait_timeout: true,
            selector_poll_ms: 100,
            block_resources: vec![
                BlockedResource::Image,
                BlockedResource::Font,
                BlockedResource::Media,
            ],
            extra_headers: BTreeMap::new(),
            cookies: BTreeMap::new(),
            proxy: None,
            reuse_context: true,
            pool_size: 2,
            expand_markers: default_expand_markers(),
            captcha_markers: default_captcha_markers(),
        }
    }
}

impl RenderSpec {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.selector_poll_ms.max(1))
    }
}

fn default_expand_markers() -> Vec<String> {
    [
        "展开全文",
        "阅读全文",
        "查看全部",
        "点击展开",
        "read full article",
        "read the full article",
        "show full article",
        "continue reading",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_captcha_markers() -> Vec<String> {
    [
        "验证码",
        "人机验证",
        "滑块验证",
        "安全验证",
        "行为验证",
        "点击继续访问",
        "点此继续访问",
        "验证后继续访问",
        "请完成验证",
        "geetest",
        "极验",
        "tencentcaptcha",
        "recaptcha",
        "g-recaptcha",
        "hcaptcha",
        "cf-chl",
        "verify you are human",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Output representation of extracted text
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize)]
pub enum OutputFormat {
    /// Plain text
    #[default]
    #[serde(alias = "text")]
    #[serde(rename = "txt")]
    Txt,
    /// Markdown
    #[serde(alias = "markdown")]
    #[serde(rename = "md")]
    Md,
    /// Styled HTML document preserving the original markup
    #[serde(rename = "html")]
    Html,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "txt" | "text" => Ok(Self::Txt),
            "md" | "markdown" => Ok(Self::Md),
            "html" => Ok(Self::Html),
            other => Err(format!("unknown output format '{}'", other)),
        }
    }
}

/// Text extraction and media policy settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ExtractSpec {
    /// Extracted text shorter than this (in characters) is treated as incomplete
    pub min_text_len: usize,

    pub output_format: OutputFormat,

    pub with_metadata: bool,
    pub favor_precision: bool,
    pub include_tables: bool,
    pub include_comments: bool,
    pub include_links: bool,

    pub keep_images: bool,
    pub append_images: bool,
    pub inline_images: bool,

    pub keep_videos: bool,
    pub append_videos: bool,
    pub inline_videos: bool,
}

impl Default for ExtractSpec {
    fn default() -> Self {
        Self {
            min_text_len: 200,
            output_format: OutputFormat::Txt,
            with_metadata: true,
            favor_precision: true,
            include_tables: true,
            include_comments: false,
            include_links: false,
            keep_images: false,
            append_images: false,
            inline_images: false,
            keep_videos: false,
            append_videos: false,
            inline_videos: false,
        }
    }
}

impl ExtractSpec {
    /// Returns true if any image flag asks for image URLs to be gathered
    pub fn wants_images(&self) -> bool {
        self.keep_images || self.append_images || self.inline_images
    }

    /// Returns true if any video flag asks for video URLs to be gathered
    pub fn wants_videos(&self) -> bool {
        self.keep_videos || self.append_videos || self.inline_videos
    }
}

/// Link discovery settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CrawlSpec {
    /// Maximum number of discovered URLs
    pub max_pages: usize,

    /// Maximum link depth from the seeds
    pub max_depth: u32,

    /// Maximum number of concurrent fetches (and extractions in batch mode)
    pub max_workers: usize,

    /// Only follow links whose host matches one of the seed hosts
    pub same_host_only: bool,

    /// Domain patterns allowed in addition to (or instead of) the seed hosts
    pub allow_domains: Vec<String>,

    /// Regexes a canonical URL must match (any) to be admitted
    pub allow_patterns: Vec<String>,

    /// Regexes that reject a canonical URL
    pub deny_patterns: Vec<String>,

    /// Drop the query string entirely when canonicalizing
    pub strip_query: bool,
}

impl Default for CrawlSpec {
    fn default() -> Self {
        Self {
            max_pages: 100,
            max_depth: 2,
            max_workers: 4,
            same_host_only: true,
            allow_domains: Vec::new(),
            allow_patterns: Vec::new(),
            deny_patterns: Vec::new(),
            strip_query: false,
        }
    }
}
