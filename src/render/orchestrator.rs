use super::{
    ContextOptions, ContextPool, PooledContext, RenderBackend, RenderError, RenderOutcome,
    SelectorRegistry,
};
use crate::config::RenderSpec;
use crate::url::host_of;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;

/// Drives one render per call against a shared context pool
///
/// # Render Steps
///
/// 1. Check out a context (waits while the pool is exhausted)
/// 2. Navigate, bounded by `timeout_ms`
/// 3. Poll the candidate selectors until one matches or the budget runs out
/// 4. Capture the DOM
///
/// A context that failed navigation or content capture is discarded rather
/// than returned to the pool.
pub struct RenderOrchestrator {
    pool: ContextPool,
    selectors: SelectorRegistry,
    timeout: Duration,
    poll_interval: Duration,
    ignore_wait_timeout: bool,
}

impl RenderOrchestrator {
    pub fn new(backend: Arc<dyn RenderBackend>, spec: &RenderSpec, user_agent: Option<&str>) -> Self {
        let options = ContextOptions::from_spec(spec, user_agent);
        Self {
            pool: ContextPool::new(backend, options, spec.pool_size, spec.reuse_context),
            selectors: SelectorRegistry::from_spec(spec),
            timeout: spec.timeout(),
            poll_interval: spec.poll_interval(),
            ignore_wait_timeout: spec.ignore_wait_timeout,
        }
    }

    pub fn pool(&self) -> &ContextPool {
        &self.pool
    }

    pub async fn shutdown(&self) {
        self.pool.shutdown().await;
    }

    /// Renders `url` and returns the captured HTML
    ///
    /// # Returns
    ///
    /// A RenderOutcome; this method never fails outright. On selector-wait
    /// timeout the outcome carries both the partial HTML and
    /// [`RenderError::SelectorTimeout`], unless `ignore_wait_timeout` is off,
    /// in which case no HTML is returned.
    pub async fn render(&self, url: &str) -> RenderOutcome {
        let queued = Instant::now();
        let mut ctx = match self.pool.checkout().await {
            Ok(ctx) => ctx,
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "Could not obtain a browser context");
                return RenderOutcome::failed(e, queued.elapsed());
            }
        };

        // The page budget starts once a context is held
        let start = Instant::now();
        let deadline = start + self.timeout;
        tracing::trace!(url = %url, waited_ms = (start - queued).as_millis() as u64, "Context checked out");

        let navigated = timeout(self.timeout, ctx.navigate(url, self.timeout)).await;
        let navigation = match navigated {
            Ok(Ok(navigation)) => navigation,
            Ok(Err(e)) => {
                ctx.discard();
                tracing::debug!(url = %url, error = %e, "Navigation failed");
                return RenderOutcome::failed(e, start.elapsed());
            }
            Err(_) => {
                ctx.discard();
                let error = RenderError::NavigationTimeout {
                    url: url.to_string(),
                    timeout_ms: self.timeout.as_millis() as u64,
                };
                tracing::debug!(url = %url, error = %error, "Navigation timed out");
                return RenderOutcome::failed(error, start.elapsed());
            }
        };

        let host = host_of(url).unwrap_or_default();
        let candidates = self.selectors.candidates(&host);

        let waited = self.wait_for_any(&mut ctx, url, &candidates, deadline).await;
        let (matched_selector, wait_error) = match waited {
            Ok(matched) => (matched, None),
            Err(e) if e.is_selector_timeout() => (None, Some(e)),
            Err(e) => {
                ctx.discard();
                return RenderOutcome::failed(e, start.elapsed());
            }
        };

        if let Some(error) = &wait_error {
            if !self.ignore_wait_timeout {
                tracing::debug!(url = %url, error = %error, "Selector wait timed out");
                return RenderOutcome::failed(error.clone(), start.elapsed());
            }
            tracing::warn!(url = %url, "Selector wait timed out, keeping partial HTML");
        }

        let html = match ctx.content().await {
            Ok(html) => html,
            Err(e) => {
                ctx.discard();
                return RenderOutcome::failed(e, start.elapsed());
            }
        };

        tracing::debug!(
            url = %url,
            selector = matched_selector.as_deref().unwrap_or("-"),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Rendered page"
        );

        RenderOutcome {
            html: Some(html),
            status: navigation.status,
            final_url: navigation.final_url,
            matched_selector,
            media_urls: navigation.media_urls,
            elapsed: start.elapsed(),
            error: wait_error,
        }
    }

    /// Polls `candidates` until one matches (first match wins)
    ///
    /// Returns `Ok(None)` when there is nothing to wait for.
    async fn wait_for_any(
        &self,
        ctx: &mut PooledContext,
        url: &str,
        candidates: &[String],
        deadline: Instant,
    ) -> Result<Option<String>, RenderError> {
        if candidates.is_empty() {
            return Ok(None);
        }

        loop {
            for selector in candidates {
                if ctx.matches_selector(selector).await? {
                    return Ok(Some(selector.clone()));
                }
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(RenderError::SelectorTimeout {
                    url: url.to_string(),
                    timeout_ms: self.timeout.as_millis() as u64,
                });
            }
            tokio::time::sleep(self.poll_interval.min(deadline - now)).await;
        }
    }
}
