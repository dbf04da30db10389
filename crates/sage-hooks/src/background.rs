//! Background hook task tracker.
//!
//! Tracks fire-and-forget hook executions so shutdown can wait for them.
//! Tasks still running when a drain deadline passes are aborted at their
//! next await point.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinSet;
use tracing::warn;

/// Decrements the pending count when a task finishes or is aborted.
struct PendingGuard(Arc<AtomicUsize>);

impl Drop for PendingGuard {
    fn drop(&mut self) {
        let _ = self.0.fetch_sub(1, Ordering::Relaxed);
    }
}

/// Tracks background hook task handles for eventual draining.
pub struct BackgroundTracker {
    tasks: Mutex<JoinSet<()>>,
    pending: Arc<AtomicUsize>,
}

impl BackgroundTracker {
    /// Create a new empty background tracker.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tasks: Mutex::new(JoinSet::new()),
            pending: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Spawn a future as a tracked background task.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn<F>(&self, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let _ = self.pending.fetch_add(1, Ordering::Relaxed);
        let guard = PendingGuard(Arc::clone(&self.pending));
        let mut tasks = self.tasks.lock();
        // Reap finished tasks so the set does not grow without bound
        while let Some(result) = tasks.try_join_next() {
            log_join_error(result);
        }
        let _ = tasks.spawn(async move {
            let _guard = guard;
            future.await;
        });
    }

    /// Wait for all tracked tasks, including ones spawned while draining.
    pub async fn drain_all(&self) {
        loop {
            let mut batch = std::mem::take(&mut *self.tasks.lock());
            if batch.is_empty() {
                return;
            }
            while let Some(result) = batch.join_next().await {
                log_join_error(result);
            }
        }
    }

    /// Wait for all tracked tasks with a deadline.
    ///
    /// Returns `true` if everything finished in time.
    pub async fn drain_with_timeout(&self, timeout: Duration) -> bool {
        let finished = tokio::time::timeout(timeout, self.drain_all())
            .await
            .is_ok();
        if !finished {
            warn!(
                timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                "background hook drain deadline reached, abandoning remaining tasks"
            );
        }
        finished
    }

    /// Approximate number of pending background tasks.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.load(Ordering::Relaxed)
    }
}

fn log_join_error(result: Result<(), tokio::task::JoinError>) {
    if let Err(e) = result {
        if e.is_panic() {
            warn!(error = %e, "Background hook task panicked");
        }
    }
}

impl Default for BackgroundTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for BackgroundTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackgroundTracker")
            .field("pending_count", &self.pending_count())
            .finish()
    }
}
