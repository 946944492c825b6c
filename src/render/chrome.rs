use super::{ContextOptions, NavigationStatus, RenderBackend, RenderContext, RenderError};
use crate::config::BlockedResource;
use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::fetch::{
    ContinueRequestParams, EnableParams as FetchEnableParams, EventRequestPaused, FailRequestParams,
};
use chromiumoxide::cdp::browser_protocol::network::{
    ClearBrowserCookiesParams, CookieParam, EnableParams as NetworkEnableParams, ErrorReason,
    EventResponseReceived, Headers, ResourceType, SetExtraHttpHeadersParams,
    SetUserAgentOverrideParams,
};
use chromiumoxide::cdp::browser_protocol::page::NavigateParams;
use chromiumoxide::error::CdpError;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::sync::{Mutex, OnceCell};
use tokio::task::JoinHandle;

/// Executable names looked up on `PATH` by [`ChromeBackend::detect`]
const BROWSER_CANDIDATES: &[&str] = &[
    "chromium",
    "chromium-browser",
    "google-chrome",
    "google-chrome-stable",
    "chrome",
];

/// Install locations checked when nothing is found on `PATH`
const BROWSER_PATHS: &[&str] = &[
    "/usr/bin/google-chrome",
    "/usr/bin/chromium",
    "/snap/bin/chromium",
    "/opt/google/chrome/google-chrome",
    "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
    "/Applications/Chromium.app/Contents/MacOS/Chromium",
];

/// Renders pages in headless Chrome/Chromium over the DevTools protocol
///
/// One browser process is launched on first use and shared by every
/// context; each context owns a single page. Per context:
///
/// - the user agent is overridden and extra headers are sent with every request
/// - cookies are set for the target URL before each navigation
/// - blocked resource types are failed through `Fetch` request interception
/// - the HTTP status and media URLs are taken from network responses
///
/// The proxy server is a browser-wide launch flag; proxy credentials are
/// not supported.
pub struct ChromeBackend {
    binary: PathBuf,
    browser: OnceCell<Arc<Mutex<Browser>>>,
}

impl ChromeBackend {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            browser: OnceCell::new(),
        }
    }

    /// Finds a browser executable on `PATH` or in a common install location
    pub fn detect() -> Option<Self> {
        let on_path = std::env::var_os("PATH").and_then(|path| {
            std::env::split_paths(&path)
                .flat_map(|dir| BROWSER_CANDIDATES.iter().map(move |name| dir.join(name)))
                .find(|candidate| candidate.is_file())
        });
        on_path
            .or_else(|| {
                BROWSER_PATHS
                    .iter()
                    .map(PathBuf::from)
                    .find(|candidate| candidate.is_file())
            })
            .map(Self::new)
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    async fn launch_browser(
        &self,
        options: &ContextOptions,
    ) -> Result<Arc<Mutex<Browser>>, RenderError> {
        let mut builder = BrowserConfig::builder().chrome_executable(&self.binary);
        for arg in browser_args(options) {
            builder = builder.arg(arg);
        }
        let config = builder.build().map_err(RenderError::Launch)?;

        tracing::info!(binary = %self.binary.display(), "Launching headless browser");
        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| RenderError::Launch(format!("{}: {}", self.binary.display(), e)))?;

        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        Ok(Arc::new(Mutex::new(browser)))
    }
}

#[async_trait]
impl RenderBackend for ChromeBackend {
    fn name(&self) -> &str {
        "chrome"
    }

    async fn launch_context(
        &self,
        options: &ContextOptions,
    ) -> Result<Box<dyn RenderContext>, RenderError> {
        if self.binary.components().count() > 1 && !self.binary.exists() {
            return Err(RenderError::Launch(format!(
                "browser binary not found: {}",
                self.binary.display()
            )));
        }
        if options
            .proxy
            .as_ref()
            .map(|p| p.username.is_some())
            .unwrap_or(false)
        {
            tracing::warn!("Proxy credentials are not supported by the chrome backend");
        }

        let browser = self
            .browser
            .get_or_try_init(|| self.launch_browser(options))
            .await?;
        let page = browser
            .lock()
            .await
            .new_page("about:blank")
            .await
            .map_err(launch_error)?;

        match ChromeContext::prepare(page.clone(), options).await {
            Ok(ctx) => Ok(Box::new(ctx)),
            Err(e) => {
                let _ = page.close().await;
                Err(e)
            }
        }
    }
}

/// Browser-wide command-line flags
fn browser_args(options: &ContextOptions) -> Vec<String> {
    let mut args = vec![
        "--no-sandbox".to_string(),
        "--disable-gpu".to_string(),
        "--disable-dev-shm-usage".to_string(),
        "--no-first-run".to_string(),
        "--no-default-browser-check".to_string(),
        "--mute-audio".to_string(),
    ];
    if let Some(server) = options.proxy.as_ref().and_then(|p| p.render_server()) {
        args.push(format!("--proxy-server={}", server));
    }
    args
}

/// Network resource types failed by request interception
fn blocked_types(options: &ContextOptions) -> Vec<ResourceType> {
    options
        .block_resources
        .iter()
        .map(|resource| match resource {
            BlockedResource::Image => ResourceType::Image,
            BlockedResource::Font => ResourceType::Font,
            BlockedResource::Media => ResourceType::Media,
            BlockedResource::Stylesheet => ResourceType::Stylesheet,
        })
        .collect()
}

/// Returns true for a response that carries audio/video content
fn is_media_response(kind: &ResourceType, mime: &str, url: &str) -> bool {
    let mime = mime.to_ascii_lowercase();
    *kind == ResourceType::Media
        || mime.starts_with("video/")
        || mime.contains("mpegurl")
        || mime.contains("dash+xml")
        || url.contains(".m3u8")
        || url.contains(".mpd")
}

/// What the network listener saw since the last navigation started
#[derive(Debug, Default)]
struct NetworkLog {
    status: Option<u16>,
    media_urls: Vec<String>,
}

fn launch_error(e: CdpError) -> RenderError {
    RenderError::Launch(e.to_string())
}

struct ChromeContext {
    page: Page,
    cookies: Vec<(String, String)>,
    log: Arc<StdMutex<NetworkLog>>,
    tasks: Vec<JoinHandle<()>>,
    current_url: Option<String>,
}

impl ChromeContext {
    /// Applies the context options to a fresh page and starts its listeners
    async fn prepare(page: Page, options: &ContextOptions) -> Result<Self, RenderError> {
        page.execute(NetworkEnableParams::default())
            .await
            .map_err(launch_error)?;

        if let Some(agent) = &options.user_agent {
            page.execute(SetUserAgentOverrideParams::new(agent.clone()))
                .await
                .map_err(launch_error)?;
        }
        if !options.extra_headers.is_empty() {
            let headers = serde_json::to_value(&options.extra_headers)
                .map_err(|e| RenderError::Launch(e.to_string()))?;
            page.execute(SetExtraHttpHeadersParams::new(Headers::new(headers)))
                .await
                .map_err(launch_error)?;
        }

        let log = Arc::new(StdMutex::new(NetworkLog::default()));
        let mut tasks = Vec::new();

        let mut responses = page
            .event_listener::<EventResponseReceived>()
            .await
            .map_err(launch_error)?;
        let sink = Arc::clone(&log);
        tasks.push(tokio::spawn(async move {
            while let Some(event) = responses.next().await {
                let Ok(mut log) = sink.lock() else {
                    break;
                };
                let response = &event.response;
                if event.r#type == ResourceType::Document && log.status.is_none() {
                    log.status = u16::try_from(response.status).ok();
                }
                if is_media_response(&event.r#type, &response.mime_type, &response.url)
                    && !log.media_urls.contains(&response.url)
                {
                    log.media_urls.push(response.url.clone());
                }
            }
        }));

        let blocked = blocked_types(options);
        if !blocked.is_empty() {
            let mut paused = page
                .event_listener::<EventRequestPaused>()
                .await
                .map_err(launch_error)?;
            let interceptor = page.clone();
            tasks.push(tokio::spawn(async move {
                while let Some(event) = paused.next().await {
                    let request_id = event.request_id.clone();
                    let result = if blocked.contains(&event.resource_type) {
                        interceptor
                            .execute(FailRequestParams::new(request_id, ErrorReason::BlockedByClient))
                            .await
                            .map(|_| ())
                    } else {
                        interceptor
                            .execute(ContinueRequestParams::new(request_id))
                            .await
                            .map(|_| ())
                    };
                    if let Err(e) = result {
                        tracing::trace!(error = %e, "Intercepted request could not be resumed");
                    }
                }
            }));
            page.execute(FetchEnableParams::default())
                .await
                .map_err(launch_error)?;
        }

        Ok(Self {
            page,
            cookies: options
                .cookies
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            log,
            tasks,
            current_url: None,
        })
    }

    async fn set_cookies(&self, url: &str) {
        for (name, value) in &self.cookies {
            let param = CookieParam::builder()
                .name(name.as_str())
                .value(value.as_str())
                .url(url)
                .build();
            match param {
                Ok(param) => {
                    if let Err(e) = self.page.set_cookie(param).await {
                        tracing::warn!("Failed to set cookie {}: {}", name, e);
                    }
                }
                Err(e) => tracing::warn!("Failed to build cookie {}: {}", name, e),
            }
        }
    }

    fn clear_log(&self) {
        if let Ok(mut log) = self.log.lock() {
            *log = NetworkLog::default();
        }
    }

    fn navigation_error(url: &str, message: impl Into<String>) -> RenderError {
        RenderError::Navigation {
            url: url.to_string(),
            message: message.into(),
        }
    }
}

#[async_trait]
impl RenderContext for ChromeContext {
    async fn navigate(
        &mut self,
        url: &str,
        timeout: Duration,
    ) -> Result<NavigationStatus, RenderError> {
        let params = NavigateParams::builder()
            .url(url)
            .build()
            .map_err(|e| Self::navigation_error(url, e))?;

        self.clear_log();
        self.set_cookies(url).await;
        self.current_url = Some(url.to_string());

        let page = &self.page;
        let navigation = async {
            let response = page.execute(params).await?;
            page.wait_for_navigation().await?;
            Ok::<_, CdpError>(response.result.error_text.clone())
        };
        match tokio::time::timeout(timeout, navigation).await {
            Err(_) => {
                return Err(RenderError::NavigationTimeout {
                    url: url.to_string(),
                    timeout_ms: timeout.as_millis() as u64,
                })
            }
            Ok(Err(e)) => return Err(Self::navigation_error(url, e.to_string())),
            Ok(Ok(Some(error_text))) if !error_text.is_empty() => {
                return Err(Self::navigation_error(url, error_text))
            }
            Ok(Ok(_)) => {}
        }

        let final_url = self.page.url().await.ok().flatten();
        let (status, media_urls) = match self.log.lock() {
            Ok(log) => (log.status, log.media_urls.clone()),
            Err(_) => (None, Vec::new()),
        };

        Ok(NavigationStatus {
            status,
            final_url: final_url.or_else(|| Some(url.to_string())),
            media_urls,
        })
    }

    async fn content(&mut self) -> Result<String, RenderError> {
        self.page.content().await.map_err(|e| RenderError::Content {
            url: self.current_url.clone().unwrap_or_default(),
            message: e.to_string(),
        })
    }

    async fn matches_selector(&mut self, selector: &str) -> Result<bool, RenderError> {
        Ok(self.page.find_element(selector).await.is_ok())
    }

    async fn reset(&mut self) -> Result<(), RenderError> {
        self.clear_log();
        self.current_url = None;
        self.page
            .execute(ClearBrowserCookiesParams::default())
            .await
            .map_err(launch_error)?;
        let blank = NavigateParams::builder()
            .url("about:blank")
            .build()
            .map_err(RenderError::Launch)?;
        self.page.execute(blank).await.map_err(launch_error)?;
        Ok(())
    }

    async fn close(self: Box<Self>) -> Result<(), RenderError> {
        for task in &self.tasks {
            task.abort();
        }
        self.page.close().await.map_err(launch_error)
    }
}
