//! Bounded FIFO job queue with cancellable blocking operations.
//!
//! The queue is the hand-off between a producer and the worker pool. `enqueue` blocks while
//! the queue is at capacity (backpressure) and `dequeue` blocks while it is empty; both race
//! against a cancellation token. After [`JobQueue::close`] no new jobs are accepted, but jobs
//! already queued can still be drained.

use std::collections::VecDeque;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::core::PoolError;
use crate::util::serde::JobId;

/// A job as held by the queue: payload plus the identity assigned on enqueue.
#[derive(Debug, Clone)]
pub struct QueuedJob<J> {
    /// Sequence number assigned in enqueue order, starting at 0.
    pub id: JobId,
    /// Caller-supplied payload.
    pub payload: J,
    /// When the job entered the queue.
    pub enqueued_at: Instant,
}

struct QueueState<J> {
    buf: VecDeque<QueuedJob<J>>,
    closed: bool,
    next_id: JobId,
    dequeued: u64,
}

/// Bounded, closable, multi-consumer FIFO queue.
pub struct JobQueue<J> {
    capacity: usize,
    state: Mutex<QueueState<J>>,
    /// Signalled when a job is pushed or the queue closes.
    not_empty: Notify,
    /// Signalled when a slot frees up or the queue closes.
    not_full: Notify,
}

impl<J> std::fmt::Debug for JobQueue<J> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("JobQueue")
            .field("capacity", &self.capacity)
            .field("len", &state.buf.len())
            .field("closed", &state.closed)
            .finish_non_exhaustive()
    }
}

impl<J> JobQueue<J> {
    /// Create a queue that holds at most `capacity` jobs.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::InvalidConfig`] when `capacity` is zero.
    pub fn new(capacity: usize) -> Result<Self, PoolError> {
        if capacity == 0 {
            return Err(PoolError::InvalidConfig(
                "queue capacity must be greater than 0".into(),
            ));
        }
        Ok(Self {
            capacity,
            state: Mutex::new(QueueState {
                buf: VecDeque::with_capacity(capacity.min(1024)),
                closed: false,
                next_id: 0,
                dequeued: 0,
            }),
            not_empty: Notify::new(),
            not_full: Notify::new(),
        })
    }

    /// Push a job if there is room. Called with the lock held by the caller's scope.
    fn push_locked(state: &mut QueueState<J>, payload: J) -> JobId {
        let id = state.next_id;
        state.next_id += 1;
        state.buf.push_back(QueuedJob {
            id,
            payload,
            enqueued_at: Instant::now(),
        });
        id
    }

    /// Enqueue a job, waiting while the queue is full.
    ///
    /// # Errors
    ///
    /// - [`PoolError::Cancelled`] if `token` fires before a slot frees up; the job is dropped.
    /// - [`PoolError::QueueClosed`] if the queue was closed.
    pub async fn enqueue(&self, payload: J, token: &CancellationToken) -> Result<JobId, PoolError> {
        loop {
            if token.is_cancelled() {
                return Err(PoolError::Cancelled);
            }

            let slot_freed = self.not_full.notified();
            tokio::pin!(slot_freed);
            slot_freed.as_mut().enable();

            {
                let mut state = self.state.lock();
                if state.closed {
                    return Err(PoolError::QueueClosed);
                }
                if state.buf.len() < self.capacity {
                    let id = Self::push_locked(&mut state, payload);
                    drop(state);
                    trace!(job_id = id, "job enqueued");
                    self.not_empty.notify_one();
                    return Ok(id);
                }
            }

            tokio::select! {
                biased;
                () = token.cancelled() => return Err(PoolError::Cancelled),
                () = &mut slot_freed => {}
            }
        }
    }

    /// Enqueue without waiting.
    ///
    /// # Errors
    ///
    /// - [`PoolError::QueueFull`] when at capacity.
    /// - [`PoolError::QueueClosed`] if the queue was closed.
    pub fn try_enqueue(&self, payload: J) -> Result<JobId, PoolError> {
        let id = {
            let mut state = self.state.lock();
            if state.closed {
                return Err(PoolError::QueueClosed);
            }
            if state.buf.len() >= self.capacity {
                return Err(PoolError::QueueFull(self.capacity));
            }
            Self::push_locked(&mut state, payload)
        };
        self.not_empty.notify_one();
        Ok(id)
    }

    /// Take the oldest job, waiting while the queue is empty and open.
    ///
    /// # Errors
    ///
    /// - [`PoolError::Cancelled`] if `token` fires; checked before the buffer, so a cancelled
    ///   caller never takes a job.
    /// - [`PoolError::QueueClosed`] once the queue is closed and drained.
    pub async fn dequeue(&self, token: &CancellationToken) -> Result<QueuedJob<J>, PoolError> {
        loop {
            if token.is_cancelled() {
                return Err(PoolError::Cancelled);
            }

            let job_ready = self.not_empty.notified();
            tokio::pin!(job_ready);
            job_ready.as_mut().enable();

            {
                let mut state = self.state.lock();
                if let Some(job) = state.buf.pop_front() {
                    state.dequeued += 1;
                    drop(state);
                    self.not_full.notify_one();
                    return Ok(job);
                }
                if state.closed {
                    return Err(PoolError::QueueClosed);
                }
            }

            tokio::select! {
                biased;
                () = token.cancelled() => return Err(PoolError::Cancelled),
                () = &mut job_ready => {}
            }
        }
    }

    /// Mark the queue closed and wake every waiter. Returns `true` for the call that closed it.
    pub fn close(&self) -> bool {
        let newly_closed = {
            let mut state = self.state.lock();
            !std::mem::replace(&mut state.closed, true)
        };
        if newly_closed {
            debug!(pending = self.len(), "job queue closed");
            self.not_empty.notify_waiters();
            self.not_full.notify_waiters();
        }
        newly_closed
    }

    /// Whether [`close`](Self::close) has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Jobs currently queued.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().buf.len()
    }

    /// Whether no jobs are queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.lock().buf.is_empty()
    }

    /// Maximum number of queued jobs.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Jobs accepted since creation.
    #[must_use]
    pub fn enqueued_total(&self) -> u64 {
        self.state.lock().next_id
    }

    /// Jobs handed to consumers since creation.
    #[must_use]
    pub fn dequeued_total(&self) -> u64 {
        self.state.lock().dequeued
    }
}
