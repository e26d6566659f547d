//! Per-worker loop: acquire a token, dequeue, process, record.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};
use uuid::Uuid;

use crate::core::{JobMeta, JobProcessor, JobQueue, PoolError, ResultStore, TokenBucket};
use crate::util::serde::WorkerId;

use super::{PoolCounters, StopReason, WorkerExit, WorkerState};

/// Everything one worker task owns.
pub(super) struct WorkerContext<J, R, P> {
    pub(super) worker_id: WorkerId,
    pub(super) run_id: Uuid,
    pub(super) queue: Arc<JobQueue<J>>,
    pub(super) limiter: Arc<TokenBucket>,
    pub(super) store: Arc<ResultStore<R>>,
    pub(super) processor: P,
    pub(super) token: CancellationToken,
    pub(super) counters: Arc<PoolCounters>,
}

/// Keeps the pool's state gauges in step with one worker. Dropping it mid-loop (the task
/// unwinding from a panic) still moves the worker to `Stopped`.
struct StateTracker<'a> {
    worker_id: WorkerId,
    state: WorkerState,
    counters: &'a PoolCounters,
}

impl<'a> StateTracker<'a> {
    fn new(worker_id: WorkerId, counters: &'a PoolCounters) -> Self {
        counters.gauge(WorkerState::Idle).fetch_add(1, Ordering::Relaxed);
        Self {
            worker_id,
            state: WorkerState::Idle,
            counters,
        }
    }

    fn enter(&mut self, next: WorkerState) {
        if self.state == next {
            return;
        }
        self.counters.gauge(self.state).fetch_sub(1, Ordering::Relaxed);
        self.counters.gauge(next).fetch_add(1, Ordering::Relaxed);
        trace!(worker_id = self.worker_id, from = ?self.state, to = ?next, "worker state");
        self.state = next;
    }
}

impl Drop for StateTracker<'_> {
    fn drop(&mut self) {
        self.enter(WorkerState::Stopped);
    }
}

pub(super) async fn run_worker<J, R, P>(ctx: WorkerContext<J, R, P>) -> WorkerExit
where
    J: Send + 'static,
    R: Send + 'static,
    P: JobProcessor<J, R>,
{
    let worker_id = ctx.worker_id;
    let mut tracker = StateTracker::new(worker_id, &ctx.counters);

    debug!(worker_id, "worker started");

    let reason = loop {
        tracker.enter(WorkerState::AcquiringToken);
        if ctx.limiter.acquire(&ctx.token).await.is_err() {
            break StopReason::Cancelled;
        }

        tracker.enter(WorkerState::Dequeuing);
        let job = match ctx.queue.dequeue(&ctx.token).await {
            Ok(job) => job,
            Err(PoolError::QueueClosed) => break StopReason::QueueClosed,
            Err(_) => {
                // The token taken above is forfeited.
                break StopReason::Cancelled;
            }
        };
        ctx.counters.dequeued.fetch_add(1, Ordering::Relaxed);

        tracker.enter(WorkerState::Processing);
        let job_id = job.id;
        let meta = JobMeta {
            id: job_id,
            worker_id,
            run_id: ctx.run_id,
            enqueued_at: job.enqueued_at,
        };
        match ctx.processor.process(job.payload, meta).await {
            Ok(result) => {
                ctx.store.record(result);
                ctx.counters.job_completed(worker_id);
                debug!(worker_id, job_id, "job processed");
            }
            Err(e) => {
                ctx.counters.job_failed(worker_id);
                warn!(worker_id, job_id, error = %e, "job processing failed, dropping job");
            }
        }
        tracker.enter(WorkerState::Idle);
    };

    tracker.enter(WorkerState::Stopped);
    let exit = ctx.counters.exit(worker_id, reason);
    debug!(
        worker_id,
        ?reason,
        completed = exit.completed,
        failed = exit.failed,
        "worker stopped"
    );
    exit
}
