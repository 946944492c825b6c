//! Top-level extraction pipeline
//!
//! A [`Pipeline`] sequences fetch → decide → (render) → extract →
//! post-process for each URL and exposes the batch and crawl entry points.
//!
//! # Example
//!
//! ```no_run
//! use pagepress::config::{PipelineConfig, RenderMode};
//! use pagepress::Pipeline;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut config = PipelineConfig::default();
//! config.render.mode = RenderMode::Never;
//!
//! let pipeline = Pipeline::builder(config).build()?;
//! let result = pipeline.extract_url("https://example.com/story").await;
//! println!("{:?}", result.text);
//! # Ok(())
//! # }
//! ```

mod result;

pub use result::{ExtractResult, ResultError};

use crate::config::{validate, PipelineConfig, RenderMode};
use crate::crawler::{CrawlEngine, CrawlReport};
use crate::decision::{CaptchaDetector, Decision, DecisionEngine};
use crate::extract::{ExtractionPostProcessor, Processed, ReadableExtractor, TextExtractor};
use crate::fetch::{FetchOutcome, Fetcher};
use crate::render::{RenderBackend, RenderOrchestrator};
use crate::scheduler::ConcurrencyScheduler;
use crate::{ConfigError, PagepressError};
use std::sync::Arc;
use std::time::Instant;

/// Configures and builds a [`Pipeline`]
pub struct PipelineBuilder {
    config: PipelineConfig,
    backend: Option<Arc<dyn RenderBackend>>,
    extractor: Option<Arc<dyn TextExtractor>>,
    captcha: Option<Arc<dyn CaptchaDetector>>,
    client: Option<reqwest::Client>,
}

impl PipelineBuilder {
    /// Render backend used when a page needs rendering
    pub fn render_backend(mut self, backend: Arc<dyn RenderBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Replaces the built-in [`ReadableExtractor`]
    pub fn extractor(mut self, extractor: Arc<dyn TextExtractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    /// Replaces the signature-based captcha predicate
    pub fn captcha_detector(mut self, detector: Arc<dyn CaptchaDetector>) -> Self {
        self.captcha = Some(detector);
        self
    }

    /// Uses an existing HTTP client instead of building one from `fetch`
    pub fn http_client(mut self, client: reqwest::Client) -> Self {
        self.client = Some(client);
        self
    }

    /// Validates the configuration and assembles the stages
    ///
    /// # Errors
    ///
    /// * [`ConfigError::MissingCapability`] when the render mode is not
    ///   `never` and no render backend was supplied
    /// * Any validation error of the configuration
    /// * A client build error for an unusable proxy or header
    pub fn build(self) -> Result<Pipeline, PagepressError> {
        let config = self.config;
        validate(&config)?;

        if config.render.mode != RenderMode::Never && self.backend.is_none() {
            return Err(ConfigError::MissingCapability(format!(
                "render mode '{}' needs a render backend",
                config.render.mode
            ))
            .into());
        }

        let fetcher = match self.client {
            Some(client) => Fetcher::with_client(client, config.fetch.clone()),
            None => Fetcher::new(config.fetch.clone())?,
        };
        let renderer = self.backend.map(|backend| {
            RenderOrchestrator::new(backend, &config.render, Some(&config.fetch.user_agent))
        });
        let decision = match self.captcha {
            Some(detector) => DecisionEngine::new(detector),
            None => DecisionEngine::from_spec(&config.render),
        };
        let extractor = self
            .extractor
            .unwrap_or_else(|| Arc::new(ReadableExtractor));
        let processor = ExtractionPostProcessor::new(extractor, config.extract.clone());
        let crawler = CrawlEngine::new(fetcher.clone(), config.crawl.clone())?;

        tracing::debug!(
            render_mode = %config.render.mode,
            backend = renderer.as_ref().map(|r| r.pool().backend_name()).unwrap_or("none"),
            "Pipeline ready"
        );

        Ok(Pipeline {
            inner: Arc::new(Inner {
                config,
                fetcher,
                decision,
                renderer,
                processor,
                crawler,
            }),
        })
    }
}

struct Inner {
    config: PipelineConfig,
    fetcher: Fetcher,
    decision: DecisionEngine,
    renderer: Option<RenderOrchestrator>,
    processor: ExtractionPostProcessor,
    crawler: CrawlEngine,
}

/// Adaptive fetch/render/extract façade
///
/// Cloning is cheap; clones share the configuration, the HTTP connection
/// pool and the browser-context pool.
#[derive(Clone)]
pub struct Pipeline {
    inner: Arc<Inner>,
}

impl Pipeline {
    pub fn builder(config: PipelineConfig) -> PipelineBuilder {
        PipelineBuilder {
            config,
            backend: None,
            extractor: None,
            captcha: None,
            client: None,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.inner.config
    }

    /// Extracts one URL
    ///
    /// # Stages
    ///
    /// 1. Fetch the page
    /// 2. Stop with `captcha_detected` if the fetched HTML is a challenge
    /// 3. Extract a candidate from the fetched HTML (skipped in `always` mode)
    /// 4. Decide whether to render
    /// 5. Render, re-check for a captcha, and extract the rendered HTML
    /// 6. Fall back to the fetched candidate if rendering did not help
    ///
    /// Never fails outright; every problem is recorded in the result.
    pub async fn extract_url(&self, url: &str) -> ExtractResult {
        let start = Instant::now();
        let inner = &*self.inner;
        let mut result = ExtractResult::new(url);

        let fetch = inner.fetcher.fetch(url).await;
        result.fetch_ms = Some(fetch.elapsed_ms());
        result.status_code = fetch.status;

        if fetch.html().is_some_and(|html| inner.decision.is_captcha(html)) {
            tracing::warn!(url = %url, stage = "fetch", "Captcha page detected");
            return finish(result.with_error(ResultError::CaptchaDetected), start);
        }

        let fetched = match fetch.html() {
            Some(html) if inner.config.render.mode != RenderMode::Always => {
                Some(self.process(html, url, &[]).await)
            }
            _ => None,
        };

        let decision = inner.decision.decide(
            &fetch,
            fetched.as_ref().map(|p| p.text_len),
            &inner.config.render,
            &inner.config.extract,
        );
        tracing::debug!(url = %url, decision = ?decision, "Render decision");

        let result = match (decision, &inner.renderer) {
            (Decision::CaptchaDetected, _) => result.with_error(ResultError::CaptchaDetected),
            (Decision::Render(_), Some(renderer)) => {
                self.render_stage(renderer, url, &fetch, fetched, result).await
            }
            (_, _) => self.fetch_only(&fetch, fetched, result),
        };
        finish(result, start)
    }

    /// Extracts many URLs under the worker bound, in input order
    pub async fn extract_urls(&self, urls: &[String]) -> Vec<ExtractResult> {
        let scheduler = ConcurrencyScheduler::new(self.inner.config.crawl.max_workers);
        let tasks = urls.iter().map(|url| {
            let pipeline = self.clone();
            let url = url.clone();
            async move { pipeline.extract_url(&url).await }
        });

        let results = scheduler.run(tasks).await;
        results
            .into_iter()
            .zip(urls)
            .map(|(result, url)| match result {
                Ok(result) => result,
                Err(e) => ExtractResult::task_failed(url, e),
            })
            .collect()
    }

    /// Discovers article URLs from list/feed pages
    pub async fn crawl(&self, seeds: &[String]) -> Vec<String> {
        self.crawl_report(seeds).await.urls()
    }

    /// Like [`Pipeline::crawl`] but returns depths and page counts too
    pub async fn crawl_report(&self, seeds: &[String]) -> CrawlReport {
        self.inner.crawler.run(seeds).await
    }

    /// Crawls from `seeds`, then extracts every discovered URL
    pub async fn crawl_and_extract(&self, seeds: &[String]) -> Vec<ExtractResult> {
        let urls = self.crawl(seeds).await;
        if urls.is_empty() {
            return Vec::new();
        }
        tracing::info!(urls = urls.len(), "Extracting crawled URLs");
        self.extract_urls(&urls).await
    }

    /// Closes pooled browser contexts
    pub async fn shutdown(&self) {
        if let Some(renderer) = &self.inner.renderer {
            renderer.shutdown().await;
        }
    }

    /// Result built from the fetch alone
    fn fetch_only(
        &self,
        fetch: &FetchOutcome,
        fetched: Option<Processed>,
        mut result: ExtractResult,
    ) -> ExtractResult {
        match (fetched, &fetch.error) {
            (Some(processed), _) => {
                result.apply(processed, self.inner.config.extract.min_text_len);
                result
            }
            (None, Some(error)) => result.with_error(ResultError::Fetch(error.clone())),
            (None, None) => result.with_error(ResultError::ExtractionEmpty),
        }
    }

    async fn render_stage(
        &self,
        renderer: &RenderOrchestrator,
        url: &str,
        fetch: &FetchOutcome,
        fetched: Option<Processed>,
        mut result: ExtractResult,
    ) -> ExtractResult {
        let inner = &*self.inner;
        let min_text_len = inner.config.extract.min_text_len;

        let rendered = renderer.render(url).await;
        result.render_ms = Some(rendered.elapsed_ms());
        if result.status_code.is_none() {
            result.status_code = rendered.status;
        }

        let render_error = match (rendered.is_usable(), rendered.html()) {
            (true, Some(html)) => {
                if inner.decision.is_captcha(html) {
                    tracing::warn!(url = %url, stage = "render", "Captcha page detected");
                    result.used_render = true;
                    return result.with_error(ResultError::CaptchaDetected);
                }
                if let Some(error) = &rendered.error {
                    tracing::warn!(url = %url, error = %error, "Extracting partial render");
                }

                let processed = self.process(html, url, &rendered.media_urls).await;
                if meets_threshold(&processed, min_text_len) {
                    result.used_render = true;
                    result.apply(processed, min_text_len);
                    return result;
                }
                tracing::debug!(url = %url, len = processed.text_len, "Rendered text below threshold");
                None
            }
            _ => rendered.error.clone(),
        };

        let fetched = match fetched {
            Some(processed) => Some(processed),
            None => match fetch.html() {
                Some(html) => Some(self.process(html, url, &[]).await),
                None => None,
            },
        };

        if let Some(processed) = fetched.filter(|p| meets_threshold(p, min_text_len)) {
            tracing::warn!(url = %url, "Render did not help, keeping fetched content");
            result.apply(processed, min_text_len);
            return result;
        }

        match (render_error, &fetch.error) {
            (Some(render), Some(fetch)) => result.with_error(ResultError::FetchAndRender {
                fetch: fetch.clone(),
                render,
            }),
            (Some(render), None) => result.with_error(ResultError::Render(render)),
            (None, _) => {
                result.used_render = true;
                result.with_error(ResultError::ExtractionEmpty)
            }
        }
    }

    /// Runs extraction off the async workers
    async fn process(&self, html: &str, url: &str, media_urls: &[String]) -> Processed {
        let processor = self.inner.processor.clone();
        let html = html.to_string();
        let url = url.to_string();
        let media_urls = media_urls.to_vec();

        match tokio::task::spawn_blocking(move || processor.process(&html, &url, &media_urls)).await {
            Ok(processed) => processed,
            Err(e) => {
                tracing::error!(error = %e, "Extraction task failed");
                Processed::default()
            }
        }
    }
}

fn meets_threshold(processed: &Processed, min_text_len: usize) -> bool {
    processed.text.is_some() && processed.text_len >= min_text_len
}

fn finish(mut result: ExtractResult, start: Instant) -> ExtractResult {
    result.elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
    tracing::debug!(
        url = %result.url,
        used_render = result.used_render,
        error = result.error.as_ref().map(|e| e.kind()).unwrap_or("none"),
        elapsed_ms = result.elapsed_ms as u64,
        "Extracted"
    );
    result
}
