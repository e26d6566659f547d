//! Error types for admission, queueing, and worker pool operations.

use thiserror::Error;

/// Errors produced by pool components.
///
/// `Cancelled` and `QueueClosed` are termination signals rather than faults: every blocking
/// operation reports them so the caller can stop cleanly.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PoolError {
    /// The cancellation token fired before the operation could complete.
    #[error("operation cancelled")]
    Cancelled,
    /// The job queue is closed (and, for dequeue, drained).
    #[error("queue closed")]
    QueueClosed,
    /// Non-blocking enqueue found the queue at capacity.
    #[error("queue full: capacity {0}")]
    QueueFull(usize),
    /// A single job failed in the processor.
    #[error("processing failed: {0}")]
    Processing(String),
    /// Configuration validation failed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// Internal failure (runtime missing, task lost, etc.).
    #[error("internal error: {0}")]
    Internal(String),
}

impl PoolError {
    /// True for the signals that end a worker loop without indicating a fault.
    #[must_use]
    pub const fn is_termination(&self) -> bool {
        matches!(self, Self::Cancelled | Self::QueueClosed)
    }
}

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;
