//! Token bucket admission limiter.
//!
//! The bucket holds at most `burst` tokens. A background refill task adds one token every
//! `1 / rate_per_sec` seconds; a tick that finds the bucket full is dropped, so idle periods
//! never bank credit beyond `burst`. Workers call [`TokenBucket::acquire`] before each dequeue,
//! which caps steady-state admissions at `rate_per_sec` no matter how many workers wait.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::config::LimiterConfig;
use crate::core::PoolError;

/// Token count plus the wake channel for parked acquirers.
#[derive(Debug)]
struct Bucket {
    tokens: Mutex<u32>,
    burst: u32,
    refilled: Notify,
}

impl Bucket {
    /// Take one token if present.
    fn try_take(&self) -> bool {
        let mut tokens = self.tokens.lock();
        if *tokens == 0 {
            return false;
        }
        *tokens -= 1;
        true
    }

    /// Add one token unless the bucket is full. Returns the count after the tick.
    fn refill_one(&self) -> u32 {
        let available = {
            let mut tokens = self.tokens.lock();
            if *tokens < self.burst {
                *tokens += 1;
            }
            *tokens
        };
        if available > 0 {
            // Also re-signal on a full bucket: a waiter woken earlier may have lost the race to
            // cancellation and left its token behind.
            self.refilled.notify_one();
        }
        available
    }
}

/// Rate-limited admission control shared by all workers of a pool.
#[derive(Debug)]
pub struct TokenBucket {
    bucket: Arc<Bucket>,
    rate_per_sec: u32,
    refill_task: Mutex<Option<JoinHandle<()>>>,
}

impl TokenBucket {
    /// Validate `config` and start the refill task, bound to `token`.
    ///
    /// Must be called from within a tokio runtime. The first refill happens one period after
    /// this call.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::InvalidConfig`] for a zero rate or burst, a rate above
    /// [`MAX_RATE_PER_SEC`](crate::config::MAX_RATE_PER_SEC), or when `initial_tokens` exceeds
    /// `burst`.
    pub fn spawn(config: &LimiterConfig, token: CancellationToken) -> Result<Arc<Self>, PoolError> {
        config.validate().map_err(PoolError::InvalidConfig)?;

        let bucket = Arc::new(Bucket {
            tokens: Mutex::new(config.initial_tokens),
            burst: config.burst,
            refilled: Notify::new(),
        });
        let period = config.refill_period();
        let refill_task = tokio::spawn(refill_loop(Arc::clone(&bucket), period, token));

        debug!(
            rate_per_sec = config.rate_per_sec,
            burst = config.burst,
            initial_tokens = config.initial_tokens,
            "token bucket started"
        );

        Ok(Arc::new(Self {
            bucket,
            rate_per_sec: config.rate_per_sec,
            refill_task: Mutex::new(Some(refill_task)),
        }))
    }

    /// Wait for one token, or return [`PoolError::Cancelled`] once `token` fires.
    ///
    /// Cancellation is checked first, so a cancelled caller never consumes a token.
    ///
    /// # Errors
    ///
    /// Only [`PoolError::Cancelled`].
    pub async fn acquire(&self, token: &CancellationToken) -> Result<(), PoolError> {
        loop {
            if token.is_cancelled() {
                return Err(PoolError::Cancelled);
            }

            // Register interest before checking so a refill between the check and the await
            // is not lost.
            let refilled = self.bucket.refilled.notified();
            tokio::pin!(refilled);
            refilled.as_mut().enable();

            if self.bucket.try_take() {
                return Ok(());
            }

            tokio::select! {
                biased;
                () = token.cancelled() => return Err(PoolError::Cancelled),
                () = &mut refilled => {}
            }
        }
    }

    /// Take a token without waiting.
    #[must_use]
    pub fn try_acquire(&self) -> bool {
        self.bucket.try_take()
    }

    /// Tokens currently in the bucket.
    #[must_use]
    pub fn available(&self) -> u32 {
        *self.bucket.tokens.lock()
    }

    /// Bucket capacity.
    #[must_use]
    pub fn burst(&self) -> u32 {
        self.bucket.burst
    }

    /// Refill rate in tokens per second.
    #[must_use]
    pub const fn rate_per_sec(&self) -> u32 {
        self.rate_per_sec
    }

    /// Interval between refill ticks.
    #[must_use]
    pub fn refill_period(&self) -> Duration {
        (Duration::from_secs(1) / self.rate_per_sec.max(1)).max(Duration::from_nanos(1))
    }

    /// Wait for the refill task to exit. The task only exits once its token fires; cancel
    /// that token first. Subsequent calls return immediately.
    pub async fn shutdown(&self) {
        let handle = self.refill_task.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                debug!(error = %e, "refill task ended abnormally");
            }
        }
    }
}

async fn refill_loop(bucket: Arc<Bucket>, period: Duration, token: CancellationToken) {
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            () = token.cancelled() => break,
            _ = ticker.tick() => {
                let available = bucket.refill_one();
                trace!(available, "refill tick");
            }
        }
    }

    debug!("refill task stopped");
}
