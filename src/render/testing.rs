//! Scripted render backend for unit tests

use super::{ContextOptions, NavigationStatus, RenderBackend, RenderContext, RenderError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A page served by [`ScriptedBackend`]
#[derive(Debug, Clone, Default)]
pub struct ScriptedPage {
    pub html: String,
    pub status: Option<u16>,

    /// Selectors that eventually match
    pub selectors: Vec<String>,

    /// Number of polls before `selectors` start matching
    pub ready_after_polls: usize,

    pub nav_delay: Duration,
    pub media_urls: Vec<String>,
}

impl ScriptedPage {
    pub fn new(html: &str) -> Self {
        Self {
            html: html.to_string(),
            status: Some(200),
            ..Self::default()
        }
    }

    pub fn with_selector(mut self, selector: &str, ready_after_polls: usize) -> Self {
        self.selectors.push(selector.to_string());
        self.ready_after_polls = ready_after_polls;
        self
    }

    pub fn with_nav_delay(mut self, delay: Duration) -> Self {
        self.nav_delay = delay;
        self
    }
}

#[derive(Default)]
pub struct Counters {
    pub launched: AtomicUsize,
    pub closed: AtomicUsize,
    pub navigations: AtomicUsize,
    active: AtomicUsize,
    pub max_active: AtomicUsize,
}

/// Backend that serves canned pages and records context lifecycle events
#[derive(Default)]
pub struct ScriptedBackend {
    pages: HashMap<String, ScriptedPage>,
    pub counters: Arc<Counters>,
    pub fail_launch: bool,
    pub last_options: Mutex<Option<ContextOptions>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, url: &str, page: ScriptedPage) -> Self {
        self.pages.insert(url.to_string(), page);
        self
    }

    pub fn failing() -> Self {
        Self {
            fail_launch: true,
            ..Self::default()
        }
    }

    pub fn launched(&self) -> usize {
        self.counters.launched.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.counters.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RenderBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn launch_context(
        &self,
        options: &ContextOptions,
    ) -> Result<Box<dyn RenderContext>, RenderError> {
        if self.fail_launch {
            return Err(RenderError::Launch("scripted launch failure".to_string()));
        }
        if let Ok(mut last) = self.last_options.lock() {
            *last = Some(options.clone());
        }
        self.counters.launched.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedContext {
            pages: self.pages.clone(),
            counters: Arc::clone(&self.counters),
            current: None,
            polls: 0,
            checked_out: false,
        }))
    }
}

struct ScriptedContext {
    pages: HashMap<String, ScriptedPage>,
    counters: Arc<Counters>,
    current: Option<ScriptedPage>,
    polls: usize,
    checked_out: bool,
}

impl ScriptedContext {
    fn enter(&mut self) {
        if !self.checked_out {
            self.checked_out = true;
            let now = self.counters.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.counters.max_active.fetch_max(now, Ordering::SeqCst);
        }
    }

    fn leave(&mut self) {
        if self.checked_out {
            self.checked_out = false;
            self.counters.active.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

#[async_trait]
impl RenderContext for ScriptedContext {
    async fn navigate(
        &mut self,
        url: &str,
        _timeout: Duration,
    ) -> Result<NavigationStatus, RenderError> {
        self.enter();
        self.counters.navigations.fetch_add(1, Ordering::SeqCst);
        let page = self.pages.get(url).cloned().ok_or_else(|| RenderError::Navigation {
            url: url.to_string(),
            message: "net::ERR_NAME_NOT_RESOLVED".to_string(),
        })?;

        if !page.nav_delay.is_zero() {
            tokio::time::sleep(page.nav_delay).await;
        }

        let status = NavigationStatus {
            status: page.status,
            final_url: Some(url.to_string()),
            media_urls: page.media_urls.clone(),
        };
        self.current = Some(page);
        self.polls = 0;
        Ok(status)
    }

    async fn content(&mut self) -> Result<String, RenderError> {
        Ok(self
            .current
            .as_ref()
            .map(|p| p.html.clone())
            .unwrap_or_default())
    }

    async fn matches_selector(&mut self, selector: &str) -> Result<bool, RenderError> {
        let Some(page) = &self.current else {
            return Ok(false);
        };
        let ready = self.polls >= page.ready_after_polls;
        let matched = ready && page.selectors.iter().any(|s| s == selector);
        self.polls += 1;
        Ok(matched)
    }

    async fn reset(&mut self) -> Result<(), RenderError> {
        self.leave();
        self.current = None;
        self.polls = 0;
        Ok(())
    }

    async fn close(mut self: Box<Self>) -> Result<(), RenderError> {
        self.leave();
        self.counters.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
