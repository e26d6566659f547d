//! Core admission, queueing, and worker pool abstractions.

pub mod cancel;
pub mod error;
pub mod executor;
pub mod limiter;
pub mod producer;
pub mod queue;
pub mod store;
pub mod worker_pool;

pub use cancel::{CancelReason, CancellationController};
pub use error::{AppResult, PoolError};
pub use executor::{processor_fn, FnProcessor, JobMeta, JobProcessor};
pub use limiter::TokenBucket;
pub use producer::{feed, FeedReport};
pub use queue::{JobQueue, QueuedJob};
pub use store::ResultStore;
pub use worker_pool::{
    PoolReport, PoolStats, RunOutcome, Spawn, StopReason, WorkerExit, WorkerPool, WorkerState,
};
