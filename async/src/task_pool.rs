//! Unbounded task pool with graceful shutdown.
//!
//! [`TaskPool`] combines a [`tokio_util::sync::CancellationToken`] and
//! [`tokio_util::task::TaskTracker`] into the shutdown pattern used
//! throughout forge:
//!
//! 1. **Signal**: cancel all tasks via the cancellation token.
//! 2. **Close**: stop accepting new spawns.
//! 3. **Wait**: block until every spawned task has completed.

/// Manages a group of cooperatively-cancellable tasks.
pub struct TaskPool {
    cancel_token: tokio_util::sync::CancellationToken,
    task_tracker: tokio_util::task::TaskTracker,
}

impl TaskPool {
    pub fn new() -> Self {
        Self {
            cancel_token: tokio_util::sync::CancellationToken::new(),
            task_tracker: tokio_util::task::TaskTracker::new(),
        }
    }

    pub fn cancel_token(&self) -> &tokio_util::sync::CancellationToken {
        &self.cancel_token
    }

    pub fn child_token(&self) -> tokio_util::sync::CancellationToken {
        self.cancel_token.child_token()
    }

    /// Spawns a task tracked by this pool.
    ///
    /// # Panics
    ///
    /// Panics if called after [`shutdown`](Self::shutdown) has closed the
    /// tracker.
    pub fn spawn<F>(&self, task: F) -> tokio::task::JoinHandle<F::Output>
    where
        F: std::future::Future + Send + 'static,
        F::Output: Send + 'static,
    {
        self.task_tracker.spawn(task)
    }

    /// Cancels every task, stops accepting new ones, and waits for the
    /// rest to finish.
    pub async fn shutdown(&self) {
        self.cancel_token.cancel();
        self.task_tracker.close();
        self.task_tracker.wait().await;
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }
}

impl Default for TaskPool {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn spawn_and_shutdown() {
        let pool = TaskPool::new();
        let cancel = pool.cancel_token().clone();

        pool.spawn(async move {
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(std::time::Duration::from_millis(10)) => {}
                    _ = cancel.cancelled() => break,
                }
            }
        });

        pool.shutdown().await;
        assert!(pool.is_cancelled());
    }

    #[tokio::test]
    async fn child_token_cancels_independently() {
        let pool = TaskPool::new();
        let child = pool.child_token();

        child.cancel();

        assert!(child.is_cancelled());
        assert!(!pool.is_cancelled());
    }

    #[tokio::test]
    async fn parent_shutdown_cancels_children() {
        let pool = TaskPool::new();
        let child = pool.child_token();

        pool.shutdown().await;

        assert!(child.is_cancelled());
    }
}
