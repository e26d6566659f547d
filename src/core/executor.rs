//! Job processing trait and closure adapter.

use std::future::Future;

use async_trait::async_trait;
use tokio::time::Instant;
use uuid::Uuid;

use crate::core::AppResult;
use crate::util::serde::{JobId, WorkerId};

/// Context handed to the processor alongside each job.
#[derive(Debug, Clone)]
pub struct JobMeta {
    /// Queue-assigned job identifier.
    pub id: JobId,
    /// Worker processing the job.
    pub worker_id: WorkerId,
    /// Identifier of the pool run.
    pub run_id: Uuid,
    /// When the job entered the queue.
    pub enqueued_at: Instant,
}

/// Abstraction for turning one job into one result.
///
/// The processor is the domain collaborator of the pool. An `Err` drops the job: the worker
/// logs it, counts it as a failure, and moves on to the next job. Nothing is retried.
///
/// # Example
///
/// ```rust,ignore
/// use async_trait::async_trait;
/// use prometheus_admission::core::{AppResult, JobMeta, JobProcessor};
///
/// #[derive(Clone)]
/// struct Doubler;
///
/// #[async_trait]
/// impl JobProcessor<u64, u64> for Doubler {
///     async fn process(&self, job: u64, _meta: JobMeta) -> AppResult<u64> {
///         Ok(job * 2)
///     }
/// }
/// ```
#[async_trait]
pub trait JobProcessor<J, R>: Send + Sync + Clone + 'static
where
    J: Send + 'static,
    R: Send + 'static,
{
    /// Process one job.
    ///
    /// Once started, processing runs to completion even if the pool is cancelled meanwhile.
    async fn process(&self, job: J, meta: JobMeta) -> AppResult<R>;
}

/// [`JobProcessor`] backed by an async closure. Build one with [`processor_fn`].
#[derive(Clone)]
pub struct FnProcessor<F> {
    f: F,
}

impl<F> std::fmt::Debug for FnProcessor<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnProcessor").finish_non_exhaustive()
    }
}

/// Wrap `f` as a [`JobProcessor`].
pub const fn processor_fn<F>(f: F) -> FnProcessor<F> {
    FnProcessor { f }
}

#[async_trait]
impl<J, R, F, Fut> JobProcessor<J, R> for FnProcessor<F>
where
    J: Send + 'static,
    R: Send + 'static,
    F: Fn(J, JobMeta) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = AppResult<R>> + Send + 'static,
{
    async fn process(&self, job: J, meta: JobMeta) -> AppResult<R> {
        (self.f)(job, meta).await
    }
}
