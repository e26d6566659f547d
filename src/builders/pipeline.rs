//! End-to-end pipeline: controller, limiter, queue, producer, and pool built from one
//! [`WorkerPoolConfig`].

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::WorkerPoolConfig;
use crate::core::{
    feed, CancellationController, FeedReport, JobProcessor, JobQueue, PoolError, PoolReport,
    Spawn, TokenBucket, WorkerPool,
};
use crate::runtime::TokioSpawner;

/// Outcome of a pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineReport<R> {
    /// Pool accounting and the final result snapshot.
    pub pool: PoolReport<R>,
    /// What the producer managed to enqueue.
    pub feed: FeedReport,
}

/// Runs batches of jobs through a freshly wired pool per call.
#[derive(Debug, Clone)]
pub struct Pipeline<P, S = TokioSpawner> {
    config: WorkerPoolConfig,
    processor: P,
    spawner: S,
}

impl<P, S> Pipeline<P, S>
where
    S: Spawn + Clone,
{
    /// Validate `config` and build a pipeline.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::InvalidConfig`] if the configuration is invalid.
    pub fn new(config: WorkerPoolConfig, processor: P, spawner: S) -> Result<Self, PoolError> {
        config.validate().map_err(PoolError::InvalidConfig)?;
        Ok(Self {
            config,
            processor,
            spawner,
        })
    }

    /// Configuration every run uses.
    #[must_use]
    pub const fn config(&self) -> &WorkerPoolConfig {
        &self.config
    }

    /// Feed `jobs` through the pool under the configured deadline.
    ///
    /// # Errors
    ///
    /// Only setup failures (no tokio runtime, invalid limiter or queue settings); the run
    /// itself always produces a report.
    pub async fn run<J, R, I>(&self, jobs: I) -> Result<PipelineReport<R>, PoolError>
    where
        J: Send + 'static,
        R: Clone + Send + 'static,
        P: JobProcessor<J, R>,
        I: IntoIterator<Item = J>,
    {
        let controller = CancellationController::new(self.config.deadline());
        self.run_controlled(jobs, controller).await
    }

    /// Like [`run`](Self::run), but also stops when `parent` is cancelled.
    ///
    /// # Errors
    ///
    /// Same as [`run`](Self::run).
    pub async fn run_with_parent<J, R, I>(
        &self,
        jobs: I,
        parent: &CancellationToken,
    ) -> Result<PipelineReport<R>, PoolError>
    where
        J: Send + 'static,
        R: Clone + Send + 'static,
        P: JobProcessor<J, R>,
        I: IntoIterator<Item = J>,
    {
        let controller = CancellationController::derived_from(parent, self.config.deadline());
        self.run_controlled(jobs, controller).await
    }

    async fn run_controlled<J, R, I>(
        &self,
        jobs: I,
        controller: CancellationController,
    ) -> Result<PipelineReport<R>, PoolError>
    where
        J: Send + 'static,
        R: Clone + Send + 'static,
        P: JobProcessor<J, R>,
        I: IntoIterator<Item = J>,
    {
        // The refill task gets its own child token so it can be stopped after a run that
        // finished before the deadline.
        let limiter_token = controller.child_token();
        let limiter = TokenBucket::spawn(&self.config.limiter, limiter_token.clone())?;
        let queue = Arc::new(JobQueue::new(self.config.queue_capacity)?);
        let pool = WorkerPool::new(
            self.config.worker_count,
            self.processor.clone(),
            self.spawner.clone(),
        )?;
        let producer_token = controller.token();

        let workers = async {
            let report = pool
                .run(Arc::clone(&queue), Arc::clone(&limiter), &controller)
                .await;
            // Unblock a producer stuck on a full queue if every worker is gone.
            queue.close();
            report
        };
        let (feed_report, pool_report) =
            tokio::join!(feed(&*queue, jobs, &producer_token), workers);

        limiter_token.cancel();
        limiter.shutdown().await;

        info!(
            fed = feed_report.enqueued,
            results = pool_report.results_recorded,
            unprocessed = pool_report.unprocessed(),
            "pipeline run finished"
        );

        Ok(PipelineReport {
            pool: pool_report,
            feed: feed_report,
        })
    }
}
