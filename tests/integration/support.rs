//! Shared fixtures for the integration tests

use async_trait::async_trait;
use pagepress::config::{ExtractSpec, FetchSpec, PipelineConfig, RenderMode, RenderSpec};
use pagepress::render::{ContextOptions, NavigationStatus, RenderBackend, RenderContext, RenderError};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// An article page long enough to pass any threshold used here
pub fn article(title: &str, paragraphs: usize) -> String {
    let body: String = (0..paragraphs)
        .map(|i| {
            format!(
                "<p>Paragraph {} of {}, describing the council vote in some detail.</p>",
                i, title
            )
        })
        .collect();
    format!(
        "<html><head><title>{}</title></head><body><nav><a href=\"/\">Home</a></nav>\
         <article>{}</article></body></html>",
        title, body
    )
}

/// A page whose content is still loading when fetched
pub fn shell() -> String {
    r#"<html><head><title>Loading</title></head><body><div id="root">Loading...</div></body></html>"#
        .to_string()
}

pub fn config(mode: RenderMode, min_text_len: usize) -> PipelineConfig {
    PipelineConfig {
        fetch: FetchSpec {
            retries: 0,
            timeout_ms: 2_000,
            ..FetchSpec::default()
        },
        render: RenderSpec {
            mode,
            timeout_ms: 500,
            selector_poll_ms: 10,
            ..RenderSpec::default()
        },
        extract: ExtractSpec {
            min_text_len,
            ..ExtractSpec::default()
        },
        ..PipelineConfig::default()
    }
}

pub async fn serve(server: &MockServer, route: &str, status: u16, body: String) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(status)
                .set_body_string(body)
                .insert_header("content-type", "text/html"),
        )
        .mount(server)
        .await;
}

/// Render backend that serves fixed DOM snapshots by URL
#[derive(Default)]
pub struct StaticBackend {
    pages: HashMap<String, String>,
    pub navigations: Arc<AtomicUsize>,
}

impl StaticBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, url: &str, html: String) -> Self {
        self.pages.insert(url.to_string(), html);
        self
    }

    pub fn navigations(&self) -> usize {
        self.navigations.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RenderBackend for StaticBackend {
    fn name(&self) -> &str {
        "static"
    }

    async fn launch_context(
        &self,
        _options: &ContextOptions,
    ) -> Result<Box<dyn RenderContext>, RenderError> {
        Ok(Box::new(StaticContext {
            pages: self.pages.clone(),
            navigations: Arc::clone(&self.navigations),
            current: None,
        }))
    }
}

struct StaticContext {
    pages: HashMap<String, String>,
    navigations: Arc<AtomicUsize>,
    current: Option<String>,
}

#[async_trait]
impl RenderContext for StaticContext {
    async fn navigate(
        &mut self,
        url: &str,
        _timeout: Duration,
    ) -> Result<NavigationStatus, RenderError> {
        self.navigations.fetch_add(1, Ordering::SeqCst);
        let html = self.pages.get(url).cloned().ok_or_else(|| RenderError::Navigation {
            url: url.to_string(),
            message: "net::ERR_CONNECTION_REFUSED".to_string(),
        })?;
        self.current = Some(html);
        Ok(NavigationStatus {
            status: Some(200),
            final_url: Some(url.to_string()),
            media_urls: Vec::new(),
        })
    }

    async fn content(&mut self) -> Result<String, RenderError> {
        Ok(self.current.clone().unwrap_or_default())
    }

    async fn matches_selector(&mut self, selector: &str) -> Result<bool, RenderError> {
        Ok(self
            .current
            .as_deref()
            .map(|html| {
                let document = scraper::Html::parse_document(html);
                scraper::Selector::parse(selector)
                    .map(|s| document.select(&s).next().is_some())
                    .unwrap_or(false)
            })
            .unwrap_or(false))
    }

    async fn reset(&mut self) -> Result<(), RenderError> {
        self.current = None;
        Ok(())
    }

    async fn close(self: Box<Self>) -> Result<(), RenderError> {
        Ok(())
    }
}
