//! Rate-limited worker pool.
//!
//! A `WorkerPool` runs a fixed number of workers as tasks on a [`Spawn`] implementation. Each
//! worker loops: acquire a token from the [`TokenBucket`], dequeue a job from the
//! [`JobQueue`], hand it to the [`JobProcessor`], and record the result in a shared
//! [`ResultStore`]. Workers stop when the queue reports closed-and-drained or when the run's
//! cancellation token fires.
//!
//! # Key Features
//!
//! - **Single blocking call**: [`WorkerPool::run`] returns only after every worker has exited,
//!   tracked by a [`TaskTracker`] that also counts a worker out when it unwinds
//! - **Cooperative cancellation**: blocked workers observe cancellation immediately; a worker
//!   already processing finishes and records its result
//! - **Failure isolation**: a processing error drops that job only
//! - **Live gauges**: [`WorkerPool::stats`] reports how many workers sit in each state
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use prometheus_admission::config::LimiterConfig;
//! use prometheus_admission::core::{
//!     processor_fn, CancellationController, JobQueue, TokenBucket, WorkerPool,
//! };
//! use prometheus_admission::runtime::TokioSpawner;
//!
//! let controller = CancellationController::new(Some(Duration::from_secs(1)));
//! let limiter = TokenBucket::spawn(&LimiterConfig::default(), controller.child_token())?;
//! let queue = Arc::new(JobQueue::new(8)?);
//! let pool = WorkerPool::new(5, processor_fn(|j: u64, _| async move { Ok(j * 2) }), TokioSpawner::current())?;
//!
//! // ...producer feeds and closes `queue`...
//! let report = pool.run(queue, limiter, &controller).await;
//! println!("{} results, {} unprocessed", report.results.len(), report.unprocessed());
//! ```

mod worker;

use std::future::Future;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{info, warn, Instrument};
use uuid::Uuid;

use crate::config::WorkerPoolConfig;
use tokio_util::task::TaskTracker;

use crate::core::{
    CancelReason, CancellationController, JobProcessor, JobQueue, PoolError, ResultStore,
    TokenBucket,
};
use crate::runtime::TokioSpawner;
use crate::util::clock::now_ms;
use crate::util::serde::{RunSummary, WorkerId};

use worker::WorkerContext;

/// Abstraction for spawning task execution on a runtime.
pub trait Spawn {
    /// Spawn an async task that returns a future.
    fn spawn<F>(&self, fut: F)
    where
        F: Future<Output = ()> + Send + 'static;
}

/// Lifecycle state of one worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    /// Between jobs.
    Idle,
    /// Waiting on the token bucket.
    AcquiringToken,
    /// Waiting on the job queue.
    Dequeuing,
    /// Running the processor.
    Processing,
    /// Exited; terminal.
    Stopped,
}

/// Why a worker stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The run's cancellation token fired.
    Cancelled,
    /// The queue was closed and fully drained.
    QueueClosed,
    /// The worker task ended without reporting (e.g. the processor panicked).
    Aborted,
}

/// Final accounting for one worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerExit {
    /// Worker index.
    pub worker_id: WorkerId,
    /// Why it stopped.
    pub reason: StopReason,
    /// Jobs it processed successfully, including those before an abort.
    pub completed: u64,
    /// Jobs the processor failed on.
    pub failed: u64,
}

/// How a pool run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// Every worker stopped because the queue was closed and drained.
    Completed,
    /// At least one worker stopped on cancellation.
    Cancelled(CancelReason),
    /// No cancellation, but this many workers ended without reporting (a processor panicked).
    /// The job each of them held is lost; the other workers drained the queue.
    WorkersAborted(usize),
}

/// Point-in-time view of a pool's workers and job counts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Configured number of workers.
    pub worker_count: usize,
    /// Workers between jobs.
    pub idle: usize,
    /// Workers waiting on the token bucket.
    pub acquiring: usize,
    /// Workers waiting on the queue.
    pub dequeuing: usize,
    /// Workers running the processor.
    pub processing: usize,
    /// Workers that have exited.
    pub stopped: usize,
    /// Jobs taken from the queue.
    pub dequeued_jobs: u64,
    /// Jobs processed successfully.
    pub completed_jobs: u64,
    /// Jobs the processor failed on.
    pub failed_jobs: u64,
}

/// Job counts of one worker, kept outside the task so they survive an abort.
#[derive(Debug, Default)]
struct WorkerTally {
    completed: AtomicU64,
    failed: AtomicU64,
}

/// Internal counters for pool statistics (thread-safe).
#[derive(Debug)]
pub(crate) struct PoolCounters {
    idle: AtomicUsize,
    acquiring: AtomicUsize,
    dequeuing: AtomicUsize,
    processing: AtomicUsize,
    stopped: AtomicUsize,
    pub dequeued: AtomicU64,
    pub completed: AtomicU64,
    pub failed: AtomicU64,
    per_worker: Vec<WorkerTally>,
}

impl PoolCounters {
    pub fn new(worker_count: usize) -> Self {
        Self {
            idle: AtomicUsize::new(0),
            acquiring: AtomicUsize::new(0),
            dequeuing: AtomicUsize::new(0),
            processing: AtomicUsize::new(0),
            stopped: AtomicUsize::new(0),
            dequeued: AtomicU64::new(0),
            completed: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            per_worker: (0..worker_count).map(|_| WorkerTally::default()).collect(),
        }
    }

    /// Count a successful job for `worker_id`.
    pub fn job_completed(&self, worker_id: WorkerId) {
        self.completed.fetch_add(1, Ordering::Relaxed);
        if let Some(tally) = self.per_worker.get(worker_id) {
            tally.completed.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Count a failed job for `worker_id`.
    pub fn job_failed(&self, worker_id: WorkerId) {
        self.failed.fetch_add(1, Ordering::Relaxed);
        if let Some(tally) = self.per_worker.get(worker_id) {
            tally.failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Exit record for `worker_id` built from its tally.
    pub fn exit(&self, worker_id: WorkerId, reason: StopReason) -> WorkerExit {
        let (completed, failed) = self.per_worker.get(worker_id).map_or((0, 0), |t| {
            (
                t.completed.load(Ordering::Acquire),
                t.failed.load(Ordering::Acquire),
            )
        });
        WorkerExit {
            worker_id,
            reason,
            completed,
            failed,
        }
    }

    /// Gauge tracking how many workers are in `state`.
    pub fn gauge(&self, state: WorkerState) -> &AtomicUsize {
        match state {
            WorkerState::Idle => &self.idle,
            WorkerState::AcquiringToken => &self.acquiring,
            WorkerState::Dequeuing => &self.dequeuing,
            WorkerState::Processing => &self.processing,
            WorkerState::Stopped => &self.stopped,
        }
    }

    /// Get a snapshot of current statistics.
    pub fn snapshot(&self, worker_count: usize) -> PoolStats {
        PoolStats {
            worker_count,
            idle: self.idle.load(Ordering::Relaxed),
            acquiring: self.acquiring.load(Ordering::Relaxed),
            dequeuing: self.dequeuing.load(Ordering::Relaxed),
            processing: self.processing.load(Ordering::Relaxed),
            stopped: self.stopped.load(Ordering::Relaxed),
            dequeued_jobs: self.dequeued.load(Ordering::Relaxed),
            completed_jobs: self.completed.load(Ordering::Relaxed),
            failed_jobs: self.failed.load(Ordering::Relaxed),
        }
    }
}

/// Result of a pool run: the final snapshot plus job accounting.
#[derive(Debug, Clone)]
pub struct PoolReport<R> {
    /// Run identifier.
    pub run_id: Uuid,
    /// Every result recorded, in arrival order.
    pub results: Vec<R>,
    /// One entry per worker, ordered by worker id.
    pub workers: Vec<WorkerExit>,
    /// Jobs the queue had accepted when the last worker exited.
    pub jobs_enqueued: u64,
    /// Jobs taken from the queue by workers.
    pub jobs_dequeued: u64,
    /// Length of `results`.
    pub results_recorded: u64,
    /// Jobs dropped because the processor failed.
    pub processing_failures: u64,
    /// How the run ended.
    pub outcome: RunOutcome,
    /// Wall-clock start (ms since epoch).
    pub started_at_ms: u128,
    /// Wall-clock end (ms since epoch).
    pub finished_at_ms: u128,
    /// Time from start until the last worker exited.
    pub elapsed: Duration,
}

impl<R> PoolReport<R> {
    /// Jobs accepted but never turned into a result: still queued, dropped on cancellation,
    /// or failed in the processor. Never negative.
    #[must_use]
    pub const fn unprocessed(&self) -> u64 {
        self.jobs_enqueued.saturating_sub(self.results_recorded)
    }

    /// Whether the run drained the queue with every worker reporting, rather than being cut
    /// short by cancellation or losing a worker.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        matches!(self.outcome, RunOutcome::Completed)
    }

    /// Counts-only summary for logs and JSON export.
    #[must_use]
    pub fn summary(&self) -> RunSummary {
        RunSummary {
            run_id: self.run_id.to_string(),
            worker_count: self.workers.len(),
            jobs_enqueued: self.jobs_enqueued,
            jobs_dequeued: self.jobs_dequeued,
            results_recorded: self.results_recorded,
            processing_failures: self.processing_failures,
            unprocessed: self.unprocessed(),
            outcome: self.outcome,
            started_at_ms: self.started_at_ms,
            finished_at_ms: self.finished_at_ms,
        }
    }
}

/// Fixed-size pool of rate-limited workers.
pub struct WorkerPool<J, R, P, S = TokioSpawner> {
    worker_count: usize,
    processor: P,
    spawner: S,
    /// Counters of the current (or most recent) run.
    counters: RwLock<Arc<PoolCounters>>,
    _marker: PhantomData<fn(J) -> R>,
}

impl<J, R, P, S> std::fmt::Debug for WorkerPool<J, R, P, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("worker_count", &self.worker_count)
            .finish_non_exhaustive()
    }
}

impl<J, R, P, S> WorkerPool<J, R, P, S>
where
    J: Send + 'static,
    R: Clone + Send + 'static,
    P: JobProcessor<J, R>,
    S: Spawn,
{
    /// Create a pool of `worker_count` workers.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::InvalidConfig`] when `worker_count` is zero.
    pub fn new(worker_count: usize, processor: P, spawner: S) -> Result<Self, PoolError> {
        if worker_count == 0 {
            return Err(PoolError::InvalidConfig(
                "worker_count must be greater than 0".into(),
            ));
        }
        Ok(Self {
            worker_count,
            processor,
            spawner,
            counters: RwLock::new(Arc::new(PoolCounters::new(worker_count))),
            _marker: PhantomData,
        })
    }

    /// Create a pool sized from a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::InvalidConfig`] if the configuration is invalid.
    pub fn from_config(
        config: &WorkerPoolConfig,
        processor: P,
        spawner: S,
    ) -> Result<Self, PoolError> {
        config.validate().map_err(PoolError::InvalidConfig)?;
        Self::new(config.worker_count, processor, spawner)
    }

    /// Number of workers started per run.
    #[must_use]
    pub const fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Get current pool statistics.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        self.counters.read().snapshot(self.worker_count)
    }

    /// Run every worker until the queue drains or `cancel` fires, then return the final
    /// snapshot.
    ///
    /// Never fails: a cancelled run returns whatever was recorded, and the report's
    /// [`unprocessed`](PoolReport::unprocessed) count says how much was left behind.
    /// One run at a time per pool; a concurrent second run would share the stats gauges.
    pub async fn run(
        &self,
        queue: Arc<JobQueue<J>>,
        limiter: Arc<TokenBucket>,
        cancel: &CancellationController,
    ) -> PoolReport<R> {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("pool_run", %run_id, workers = self.worker_count);
        self.run_workers(run_id, queue, limiter, cancel)
            .instrument(span)
            .await
    }

    async fn run_workers(
        &self,
        run_id: Uuid,
        queue: Arc<JobQueue<J>>,
        limiter: Arc<TokenBucket>,
        cancel: &CancellationController,
    ) -> PoolReport<R> {
        let started_at_ms = now_ms();
        let started = Instant::now();

        let counters = Arc::new(PoolCounters::new(self.worker_count));
        *self.counters.write() = Arc::clone(&counters);

        let store = Arc::new(ResultStore::with_capacity(queue.capacity()));
        let exits = Arc::new(Mutex::new(Vec::with_capacity(self.worker_count)));
        let tracker = TaskTracker::new();
        let token = cancel.token();

        info!(
            queue_capacity = queue.capacity(),
            rate_per_sec = limiter.rate_per_sec(),
            burst = limiter.burst(),
            "starting workers"
        );

        for worker_id in 0..self.worker_count {
            let ctx = WorkerContext {
                worker_id,
                run_id,
                queue: Arc::clone(&queue),
                limiter: Arc::clone(&limiter),
                store: Arc::clone(&store),
                processor: self.processor.clone(),
                token: token.clone(),
                counters: Arc::clone(&counters),
            };
            let exits = Arc::clone(&exits);
            self.spawner.spawn(tracker.track_future(
                async move {
                    let exit = worker::run_worker(ctx).await;
                    exits.lock().push(exit);
                }
                .in_current_span(),
            ));
        }

        tracker.close();
        tracker.wait().await;

        let mut workers = std::mem::take(&mut *exits.lock());
        for worker_id in 0..self.worker_count {
            if !workers.iter().any(|w| w.worker_id == worker_id) {
                warn!(worker_id, "worker exited without reporting");
                workers.push(counters.exit(worker_id, StopReason::Aborted));
            }
        }
        workers.sort_by_key(|w| w.worker_id);

        let aborted = workers
            .iter()
            .filter(|w| w.reason == StopReason::Aborted)
            .count();
        let outcome = if workers.iter().any(|w| w.reason == StopReason::Cancelled) {
            RunOutcome::Cancelled(cancel.reason().unwrap_or(CancelReason::Explicit))
        } else if aborted > 0 {
            RunOutcome::WorkersAborted(aborted)
        } else {
            RunOutcome::Completed
        };

        let results = store.snapshot();
        let report = PoolReport {
            run_id,
            results_recorded: results.len() as u64,
            results,
            workers,
            jobs_enqueued: queue.enqueued_total(),
            jobs_dequeued: counters.dequeued.load(Ordering::Acquire),
            processing_failures: counters.failed.load(Ordering::Acquire),
            outcome,
            started_at_ms,
            finished_at_ms: now_ms(),
            elapsed: started.elapsed(),
        };

        info!(
            outcome = ?report.outcome,
            jobs_enqueued = report.jobs_enqueued,
            results_recorded = report.results_recorded,
            unprocessed = report.unprocessed(),
            elapsed_ms = u64::try_from(report.elapsed.as_millis()).unwrap_or(u64::MAX),
            "all workers stopped"
        );

        report
    }
}
