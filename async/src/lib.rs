//! Cancellable, boundable task pools used throughout the forge platform.
//!
//! The event admin (`forge-core::event`) and DCR asynchronous activations
//! both need a place to run user callbacks without growing memory
//! unboundedly under load. [`BoundedTaskPool`] is that place: a fixed
//! number of permits gate how many spawned tasks may run concurrently,
//! and [`TaskPool::shutdown`] gives every consumer the same three-phase
//! graceful-shutdown sequence (signal cancellation, stop accepting new
//! tasks, wait for the rest to drain).

pub mod task_pool;
pub mod bounded_task_pool;

pub use task_pool::TaskPool;
pub use bounded_task_pool::BoundedTaskPool;

/// Number of worker threads/permits to use when a caller hasn't specified
/// an explicit bound. Mirrors the host's available parallelism, never
/// less than one.
pub fn available_parallelism() -> std::num::NonZeroUsize {
    std::thread::available_parallelism().unwrap_or(std::num::NonZeroUsize::new(1).unwrap())
}
