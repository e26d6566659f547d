//! Cancellation and deadline controller.
//!
//! A [`CancellationController`] owns one [`CancellationToken`] and, optionally, a deadline.
//! When a deadline is set a timer task is armed that cancels the token once it elapses; the
//! owner may also cancel explicitly before that. Cancellation is one-way: once fired the token
//! stays cancelled, and every blocking operation in the pool races against it.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};
use tracing::debug;

/// Why a controller's token fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelReason {
    /// The configured deadline elapsed.
    DeadlineExceeded,
    /// Cancelled by the owner (or by a parent token).
    Explicit,
}

/// Shared state between the controller and its timer task.
#[derive(Debug, Default)]
struct Cause {
    reason: OnceLock<CancelReason>,
}

impl Cause {
    fn trigger(&self, token: &CancellationToken, reason: CancelReason) {
        // First cause wins; later triggers only re-cancel, which is a no-op.
        let _ = self.reason.set(reason);
        token.cancel();
    }
}

/// Cancellation signal with an optional deadline.
#[derive(Debug)]
pub struct CancellationController {
    token: CancellationToken,
    deadline: Option<Instant>,
    cause: Arc<Cause>,
    timer: Option<JoinHandle<()>>,
}

impl CancellationController {
    /// Create a controller with a fresh root token.
    ///
    /// Arming a deadline spawns a timer task, so this must be called from within a tokio
    /// runtime when `deadline` is `Some`.
    #[must_use]
    pub fn new(deadline: Option<Duration>) -> Self {
        Self::with_token(CancellationToken::new(), deadline)
    }

    /// Create a controller whose token is a child of `parent`: cancelling the parent cancels
    /// this controller, never the other way round.
    #[must_use]
    pub fn derived_from(parent: &CancellationToken, deadline: Option<Duration>) -> Self {
        Self::with_token(parent.child_token(), deadline)
    }

    fn with_token(token: CancellationToken, deadline: Option<Duration>) -> Self {
        let cause = Arc::new(Cause::default());
        let deadline = deadline.map(|d| Instant::now() + d);
        let timer = deadline.map(|at| {
            let token = token.clone();
            let cause = Arc::clone(&cause);
            tokio::spawn(async move {
                tokio::select! {
                    biased;
                    () = token.cancelled() => {}
                    () = tokio::time::sleep_until(at) => {
                        debug!("deadline elapsed, cancelling");
                        cause.trigger(&token, CancelReason::DeadlineExceeded);
                    }
                }
            })
        });
        Self {
            token,
            deadline,
            cause,
            timer,
        }
    }

    /// Clone of the controller's token, for threading into queue and limiter calls.
    #[must_use]
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// A child token that fires with this controller but can also be cancelled on its own.
    #[must_use]
    pub fn child_token(&self) -> CancellationToken {
        self.token.child_token()
    }

    /// Trigger cancellation explicitly. Idempotent.
    pub fn cancel(&self) {
        self.cause.trigger(&self.token, CancelReason::Explicit);
    }

    /// Non-blocking check. Fires the token eagerly if the deadline instant has already passed
    /// but the timer task has not run yet.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        if !self.token.is_cancelled() {
            if let Some(at) = self.deadline {
                if Instant::now() >= at {
                    self.cause.trigger(&self.token, CancelReason::DeadlineExceeded);
                }
            }
        }
        self.token.is_cancelled()
    }

    /// Wait until the token fires.
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.token.cancelled()
    }

    /// Absolute deadline, if one was armed.
    #[must_use]
    pub const fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left until the deadline; `None` without a deadline, zero once it passed.
    #[must_use]
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|at| at.saturating_duration_since(Instant::now()))
    }

    /// Why the token fired, or `None` while it has not.
    ///
    /// Cancellation that arrived through a parent token reports [`CancelReason::Explicit`].
    #[must_use]
    pub fn reason(&self) -> Option<CancelReason> {
        if !self.token.is_cancelled() {
            return None;
        }
        Some(
            self.cause
                .reason
                .get()
                .copied()
                .unwrap_or(CancelReason::Explicit),
        )
    }
}

impl Drop for CancellationController {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}
