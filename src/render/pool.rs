use super::{ContextOptions, NavigationStatus, RenderBackend, RenderContext, RenderError};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

type IdleContexts = Arc<Mutex<Vec<Box<dyn RenderContext>>>>;

/// Bounded pool of browser contexts with exclusive checkout
///
/// At most `size` contexts are checked out at any time. With reuse enabled a
/// released context goes back to the idle list and is reset before its next
/// checkout; otherwise it is closed when released.
pub struct ContextPool {
    backend: Arc<dyn RenderBackend>,
    options: ContextOptions,
    permits: Arc<Semaphore>,
    idle: IdleContexts,
    reuse: bool,
    size: usize,
}

impl ContextPool {
    pub fn new(
        backend: Arc<dyn RenderBackend>,
        options: ContextOptions,
        size: usize,
        reuse: bool,
    ) -> Self {
        let size = size.max(1);
        Self {
            backend,
            options,
            permits: Arc::new(Semaphore::new(size)),
            idle: Arc::new(Mutex::new(Vec::new())),
            reuse,
            size,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Number of contexts that can be checked out right now without waiting
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    pub fn idle_count(&self) -> usize {
        lock(&self.idle).len()
    }

    /// Waits for a free slot and returns an exclusively held context
    ///
    /// An idle context is reused when available; a context that fails to
    /// reset is closed and replaced by a fresh launch.
    pub async fn checkout(&self) -> Result<PooledContext, RenderError> {
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| RenderError::Unavailable("context pool is closed".to_string()))?;

        let reused = if self.reuse { lock(&self.idle).pop() } else { None };

        let context = match reused {
            Some(mut context) => match context.reset().await {
                Ok(()) => {
                    tracing::trace!(backend = self.backend.name(), "Reusing idle context");
                    context
                }
                Err(e) => {
                    tracing::debug!(error = %e, "Idle context failed to reset, relaunching");
                    let _ = context.close().await;
                    self.backend.launch_context(&self.options).await?
                }
            },
            None => {
                tracing::debug!(backend = self.backend.name(), "Launching browser context");
                self.backend.launch_context(&self.options).await?
            }
        };

        Ok(PooledContext {
            context: Some(context),
            idle: Arc::clone(&self.idle),
            reuse: self.reuse,
            discard: false,
            runtime: tokio::runtime::Handle::current(),
            _permit: permit,
        })
    }

    /// Closes every idle context and refuses further checkouts
    pub async fn shutdown(&self) {
        self.permits.close();
        let contexts: Vec<_> = lock(&self.idle).drain(..).collect();
        for context in contexts {
            if let Err(e) = context.close().await {
                tracing::debug!(error = %e, "Failed to close idle context");
            }
        }
    }
}

/// A checked-out context, returned to the pool when dropped
///
/// Release happens on every exit path, including errors and cancellation of
/// the render future. A discarded or non-reusable context is closed on a
/// background task.
pub struct PooledContext {
    context: Option<Box<dyn RenderContext>>,
    idle: IdleContexts,
    reuse: bool,
    discard: bool,
    runtime: tokio::runtime::Handle,
    _permit: OwnedSemaphorePermit,
}

impl PooledContext {
    fn inner(&mut self) -> Result<&mut (dyn RenderContext + 'static), RenderError> {
        self.context
            .as_deref_mut()
            .ok_or_else(|| RenderError::Unavailable("context already released".to_string()))
    }

    pub async fn navigate(
        &mut self,
        url: &str,
        timeout: Duration,
    ) -> Result<NavigationStatus, RenderError> {
        self.inner()?.navigate(url, timeout).await
    }

    pub async fn content(&mut self) -> Result<String, RenderError> {
        self.inner()?.content().await
    }

    pub async fn matches_selector(&mut self, selector: &str) -> Result<bool, RenderError> {
        self.inner()?.matches_selector(selector).await
    }

    /// Marks the context as unfit for reuse; it is closed on release
    pub fn discard(&mut self) {
        self.discard = true;
    }
}

impl Drop for PooledContext {
    fn drop(&mut self) {
        let Some(context) = self.context.take() else {
            return;
        };

        if self.reuse && !self.discard {
            lock(&self.idle).push(context);
            return;
        }

        self.runtime.spawn(async move {
            match context.close().await {
                Ok(()) => tracing::trace!("Closed released context"),
                Err(e) => tracing::warn!(error = %e, "Failed to close released context"),
            }
        });
    }
}

fn lock(idle: &Mutex<Vec<Box<dyn RenderContext>>>) -> MutexGuard<'_, Vec<Box<dyn RenderContext>>> {
    idle.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
