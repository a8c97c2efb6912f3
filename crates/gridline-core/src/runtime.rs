//! Async task integration.
//!
//! The grid itself is synchronous; the only asynchronous boundaries are
//! server page fetches and pushed row streams. Both are spawned on a Tokio
//! runtime through a [`TaskSpawner`] and paired with a [`CancellationToken`]
//! so that superseded work is dropped instead of applied.
//!
//! # Example
//!
//! ```no_run
//! use gridline_core::runtime::TaskSpawner;
//!
//! # async fn fetch_data() -> String { "data".to_string() }
//! let spawner = TaskSpawner::current();
//! let task = spawner
//!     .spawn_cancellable(async {
//!         let _ = fetch_data().await;
//!     })
//!     .expect("inside a tokio runtime");
//!
//! // A newer request arrived; the old future is dropped at its next await.
//! task.cancel();
//! ```

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use tokio::runtime::Handle;

use crate::error::CoreError;
use crate::logging::targets;

/// Counter for unique task IDs.
static NEXT_TASK_ID: AtomicU64 = AtomicU64::new(1);

/// A cooperative cancellation token.
///
/// Cloning shares the underlying state. Cancelling is idempotent and wakes
/// every task awaiting [`CancellationToken::cancelled`].
#[derive(Debug, Clone)]
pub struct CancellationToken {
    inner: Arc<CancellationState>,
}

#[derive(Debug)]
struct CancellationState {
    cancelled: AtomicBool,
    notify: tokio::sync::Notify,
}

impl CancellationToken {
    /// Create a new cancellation token.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(CancellationState {
                cancelled: AtomicBool::new(false),
                notify: tokio::sync::Notify::new(),
            }),
        }
    }

    /// Check if cancellation has been requested.
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        if !self.inner.cancelled.swap(true, Ordering::AcqRel) {
            self.inner.notify.notify_waiters();
        }
    }

    /// Wait asynchronously until cancellation is requested.
    ///
    /// Returns immediately if already cancelled.
    pub async fn cancelled(&self) {
        loop {
            let notified = self.inner.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
            if self.is_cancelled() {
                return;
            }
        }
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle to a spawned cancellable task.
#[derive(Debug, Clone)]
pub struct TaskHandle {
    id: u64,
    token: CancellationToken,
}

impl TaskHandle {
    /// Unique task ID.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Cancel the task. Its future is dropped at the next await point.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// The token shared with the task.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

/// Spawns grid background work onto a Tokio runtime.
#[derive(Debug, Clone, Default)]
pub struct TaskSpawner {
    handle: Option<Handle>,
}

impl TaskSpawner {
    /// Use an explicit runtime handle.
    pub fn with_handle(handle: Handle) -> Self {
        Self {
            handle: Some(handle),
        }
    }

    /// Capture the runtime of the calling context, if there is one.
    pub fn current() -> Self {
        Self {
            handle: Handle::try_current().ok(),
        }
    }

    /// A spawner without a captured runtime. Spawns use the ambient runtime
    /// at call time and fail with [`CoreError::NoRuntime`] outside one.
    pub fn detached() -> Self {
        Self { handle: None }
    }

    /// Whether a runtime is available, either captured or ambient.
    pub fn has_runtime(&self) -> bool {
        self.handle.is_some() || Handle::try_current().is_ok()
    }

    fn resolve_handle(&self) -> Result<Handle, CoreError> {
        match &self.handle {
            Some(handle) => Ok(handle.clone()),
            None => Handle::try_current().map_err(|_| CoreError::NoRuntime),
        }
    }

    /// Spawn a future that is dropped as soon as its token is cancelled.
    pub fn spawn_cancellable<F>(&self, future: F) -> Result<TaskHandle, CoreError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.spawn_with_token(CancellationToken::new(), future)
    }

    /// Like [`spawn_cancellable`](Self::spawn_cancellable), but tied to a
    /// token the caller already holds.
    pub fn spawn_with_token<F>(&self, token: CancellationToken, future: F) -> Result<TaskHandle, CoreError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = match self.resolve_handle() {
            Ok(handle) => handle,
            Err(err) => {
                tracing::warn!(target: targets::RUNTIME, "no tokio runtime available for background task");
                return Err(err);
            }
        };

        let id = NEXT_TASK_ID.fetch_add(1, Ordering::Relaxed);
        let task_token = token.clone();

        handle.spawn(async move {
            tokio::select! {
                biased;
                _ = task_token.cancelled() => {
                    tracing::trace!(target: targets::RUNTIME, task_id = id, "task cancelled");
                }
                _ = future => {}
            }
        });

        Ok(TaskHandle { id, token })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_token_cancel_is_idempotent() {
        let token = CancellationToken::new();
        assert!(!token.is_cancelled());
        token.cancel();
        token.cancel();
        assert!(token.is_cancelled());
        assert!(token.clone().is_cancelled());
    }

    #[test]
    fn test_detached_spawner_has_no_runtime() {
        let spawner = TaskSpawner::detached();
        let result = spawner.spawn_cancellable(async {});
        assert!(matches!(result, Err(CoreError::NoRuntime)));
    }

    #[tokio::test]
    async fn test_spawn_runs_to_completion() {
        let (tx, rx) = tokio::sync::oneshot::channel();
        let spawner = TaskSpawner::current();
        let task = spawner
            .spawn_cancellable(async move {
                let _ = tx.send(7);
            })
            .unwrap();
        assert_eq!(rx.await.unwrap(), 7);
        assert!(!task.is_cancelled());
    }

    #[tokio::test]
    async fn test_cancel_drops_pending_future() {
        let (tx, rx) = tokio::sync::oneshot::channel::<u32>();
        let spawner = TaskSpawner::current();
        let task = spawner
            .spawn_cancellable(async move {
                tokio::time::sleep(Duration::from_secs(30)).await;
                let _ = tx.send(1);
            })
            .unwrap();

        task.cancel();
        // Dropping the future drops the sender, closing the channel.
        assert!(rx.await.is_err());
    }

    #[tokio::test]
    async fn test_pre_cancelled_token_never_runs() {
        let (tx, rx) = tokio::sync::oneshot::channel::<u32>();
        let token = CancellationToken::new();
        token.cancel();
        TaskSpawner::current()
            .spawn_with_token(token, async move {
                let _ = tx.send(1);
            })
            .unwrap();
        assert!(rx.await.is_err());
    }
}
