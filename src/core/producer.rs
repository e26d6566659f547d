//! Reference producer: feeds a job iterator into a queue and closes it.

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::core::{JobQueue, PoolError};

/// What a [`feed`] call managed to enqueue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FeedReport {
    /// Jobs accepted by the queue.
    pub enqueued: u64,
    /// Whether feeding stopped early because the token fired.
    pub cancelled: bool,
    /// Whether feeding stopped early because someone else closed the queue.
    pub closed_early: bool,
}

/// Enqueue every job from `jobs`, blocking on backpressure, then close the queue.
///
/// Stops early when `token` fires; the queue is closed on every exit path, exactly once from
/// this producer's side.
pub async fn feed<J, I>(queue: &JobQueue<J>, jobs: I, token: &CancellationToken) -> FeedReport
where
    I: IntoIterator<Item = J>,
{
    let mut report = FeedReport::default();

    for job in jobs {
        match queue.enqueue(job, token).await {
            Ok(_) => report.enqueued += 1,
            Err(PoolError::Cancelled) => {
                debug!(enqueued = report.enqueued, "producer cancelled");
                report.cancelled = true;
                break;
            }
            Err(e) => {
                warn!(error = %e, enqueued = report.enqueued, "producer stopped: queue rejected job");
                report.closed_early = true;
                break;
            }
        }
    }

    queue.close();
    report
}
