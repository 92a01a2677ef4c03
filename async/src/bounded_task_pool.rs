//! Bounded task pool: the async work pool behind Event Admin dispatch
//! and any other concurrency-limited background work.
//!
//! Submitting beyond capacity blocks the submitter rather than growing an
//! unbounded queue: backpressure over unbounded memory growth is the
//! explicit design choice.

use std::sync::Arc;

use crate::task_pool::TaskPool;

/// A [`TaskPool`] with a fixed concurrency limit enforced by a semaphore.
pub struct BoundedTaskPool {
    inner: TaskPool,
    semaphore: Arc<tokio::sync::Semaphore>,
}

impl BoundedTaskPool {
    /// Creates a pool that runs at most `capacity` tasks concurrently.
    pub fn new(capacity: std::num::NonZeroUsize) -> Self {
        Self {
            inner: TaskPool::new(),
            semaphore: Arc::new(tokio::sync::Semaphore::new(capacity.into())),
        }
    }

    /// Spawns a task, waiting for a free permit if the pool is at capacity.
    pub async fn spawn<F>(&self, task: F) -> tokio::task::JoinHandle<F::Output>
    where
        F: std::future::Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .expect("bounded task pool semaphore closed unexpectedly");

        self.inner.spawn(async move {
            let result = task.await;
            drop(permit);
            result
        })
    }

    pub fn cancel_token(&self) -> &tokio_util::sync::CancellationToken {
        self.inner.cancel_token()
    }

    pub fn child_token(&self) -> tokio_util::sync::CancellationToken {
        self.inner.cancel_token().child_token()
    }

    pub async fn shutdown(&self) {
        self.inner.shutdown().await;
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.is_cancelled()
    }
}

impl Default for BoundedTaskPool {
    /// Uses [`crate::available_parallelism`] as the concurrency limit.
    fn default() -> Self {
        Self::new(crate::available_parallelism())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn limits_concurrency() {
        let pool = BoundedTaskPool::new(std::num::NonZeroUsize::new(2).unwrap());
        let concurrent = Arc::new(AtomicUsize::new(0));
        let max_concurrent = Arc::new(AtomicUsize::new(0));

        let mut handles = vec![];
        for _ in 0..10 {
            let concurrent = concurrent.clone();
            let max_concurrent = max_concurrent.clone();
            let handle = pool
                .spawn(async move {
                    let current = concurrent.fetch_add(1, Ordering::SeqCst) + 1;
                    max_concurrent.fetch_max(current, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    concurrent.fetch_sub(1, Ordering::SeqCst);
                })
                .await;
            handles.push(handle);
        }

        for handle in handles {
            handle.await.unwrap();
        }

        assert!(max_concurrent.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn saturated_pool_blocks_submitter() {
        let pool = Arc::new(BoundedTaskPool::new(std::num::NonZeroUsize::new(1).unwrap()));
        let gate = Arc::new(tokio::sync::Notify::new());

        let gate_clone = gate.clone();
        pool.spawn(async move {
            gate_clone.notified().await;
        })
        .await;

        // Second spawn must wait for the first task's permit.
        let pool2 = pool.clone();
        let second = tokio::spawn(async move {
            pool2.spawn(async {}).await;
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!second.is_finished());

        gate.notify_one();
        second.await.unwrap();
    }

    #[tokio::test]
    async fn shutdown_waits_for_all_tasks() {
        let pool = BoundedTaskPool::new(std::num::NonZeroUsize::new(4).unwrap());
        let completed = Arc::new(AtomicUsize::new(0));

        for _ in 0..4 {
            let completed = completed.clone();
            let cancel = pool.cancel_token().clone();
            pool.spawn(async move {
                loop {
                    tokio::select! {
                        _ = tokio::time::sleep(Duration::from_millis(10)) => {}
                        _ = cancel.cancelled() => {
                            completed.fetch_add(1, Ordering::SeqCst);
                            break;
                        }
                    }
                }
            })
            .await;
        }

        pool.shutdown().await;
        assert_eq!(completed.load(Ordering::SeqCst), 4);
    }
}
