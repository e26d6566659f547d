//! Worker pool and limiter configuration structures.

use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Highest accepted refill rate: one token per nanosecond.
pub const MAX_RATE_PER_SEC: u32 = 1_000_000_000;

/// Token bucket settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimiterConfig {
    /// Tokens added per second; the refill period is `1s / rate_per_sec`.
    pub rate_per_sec: u32,
    /// Bucket capacity.
    pub burst: u32,
    /// Tokens present at start. Zero reproduces a cold start.
    #[serde(default)]
    pub initial_tokens: u32,
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            rate_per_sec: 5,
            burst: 10,
            initial_tokens: 0,
        }
    }
}

impl LimiterConfig {
    /// Validate limiter values.
    pub fn validate(&self) -> Result<(), String> {
        if self.rate_per_sec == 0 {
            return Err("rate_per_sec must be greater than 0".into());
        }
        if self.rate_per_sec > MAX_RATE_PER_SEC {
            return Err(format!(
                "rate_per_sec ({}) must not exceed {MAX_RATE_PER_SEC}",
                self.rate_per_sec
            ));
        }
        if self.burst == 0 {
            return Err("burst must be greater than 0".into());
        }
        if self.initial_tokens > self.burst {
            return Err(format!(
                "initial_tokens ({}) must not exceed burst ({})",
                self.initial_tokens, self.burst
            ));
        }
        Ok(())
    }

    /// Interval between refill ticks, never shorter than one nanosecond.
    #[must_use]
    pub fn refill_period(&self) -> Duration {
        (Duration::from_secs(1) / self.rate_per_sec.max(1)).max(Duration::from_nanos(1))
    }
}

/// Pool configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerPoolConfig {
    /// Number of concurrent workers.
    pub worker_count: usize,
    /// Maximum jobs buffered between producer and workers.
    pub queue_capacity: usize,
    /// Admission rate limiting.
    #[serde(default)]
    pub limiter: LimiterConfig,
    /// Global deadline in milliseconds; `None` runs until the queue drains.
    #[serde(default)]
    pub deadline_ms: Option<u64>,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            worker_count: 5,
            queue_capacity: 8,
            limiter: LimiterConfig::default(),
            deadline_ms: Some(1_000),
        }
    }
}

impl WorkerPoolConfig {
    /// Create a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults, with one worker per available CPU.
    #[must_use]
    pub fn for_host() -> Self {
        Self::default().with_worker_count(num_cpus::get())
    }

    /// Set the number of workers.
    #[must_use]
    pub const fn with_worker_count(mut self, worker_count: usize) -> Self {
        self.worker_count = worker_count;
        self
    }

    /// Set the queue capacity.
    #[must_use]
    pub const fn with_queue_capacity(mut self, queue_capacity: usize) -> Self {
        self.queue_capacity = queue_capacity;
        self
    }

    /// Set the refill rate in tokens per second.
    #[must_use]
    pub const fn with_rate(mut self, rate_per_sec: u32) -> Self {
        self.limiter.rate_per_sec = rate_per_sec;
        self
    }

    /// Set the bucket capacity.
    #[must_use]
    pub const fn with_burst(mut self, burst: u32) -> Self {
        self.limiter.burst = burst;
        self
    }

    /// Set the tokens present at start.
    #[must_use]
    pub const fn with_initial_tokens(mut self, initial_tokens: u32) -> Self {
        self.limiter.initial_tokens = initial_tokens;
        self
    }

    /// Set the global deadline.
    #[must_use]
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline_ms = Some(u64::try_from(deadline.as_millis()).unwrap_or(u64::MAX));
        self
    }

    /// Remove the global deadline.
    #[must_use]
    pub const fn without_deadline(mut self) -> Self {
        self.deadline_ms = None;
        self
    }

    /// Global deadline as a duration.
    #[must_use]
    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_ms.map(Duration::from_millis)
    }

    /// Validate pool configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.worker_count == 0 {
            return Err("worker_count must be greater than 0".into());
        }
        if self.queue_capacity == 0 {
            return Err("queue_capacity must be greater than 0".into());
        }
        if self.deadline_ms == Some(0) {
            return Err("deadline_ms must be greater than 0 when set".into());
        }
        self.limiter
            .validate()
            .map_err(|e| format!("limiter invalid: {e}"))
    }

    /// Parse configuration from a JSON string and validate.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Build configuration from `ADMISSION_*` environment variables over the defaults.
    ///
    /// A `.env` file in the working directory is loaded first when present.
    /// `ADMISSION_DEADLINE_MS` accepts `0` or `none` to disable the deadline.
    pub fn from_env() -> Result<Self, String> {
        // A missing .env file is not an error.
        let _ = dotenvy::dotenv();

        let mut cfg = Self::default();
        if let Some(v) = env_parse("ADMISSION_WORKER_COUNT")? {
            cfg.worker_count = v;
        }
        if let Some(v) = env_parse("ADMISSION_QUEUE_CAPACITY")? {
            cfg.queue_capacity = v;
        }
        if let Some(v) = env_parse("ADMISSION_RATE_PER_SEC")? {
            cfg.limiter.rate_per_sec = v;
        }
        if let Some(v) = env_parse("ADMISSION_BURST")? {
            cfg.limiter.burst = v;
        }
        if let Some(v) = env_parse("ADMISSION_INITIAL_TOKENS")? {
            cfg.limiter.initial_tokens = v;
        }
        if let Ok(raw) = std::env::var("ADMISSION_DEADLINE_MS") {
            let raw = raw.trim();
            cfg.deadline_ms = if raw == "0" || raw.eq_ignore_ascii_case("none") {
                None
            } else {
                Some(
                    raw.parse()
                        .map_err(|e| format!("ADMISSION_DEADLINE_MS: {e}"))?,
                )
            };
        }

        cfg.validate()?;
        Ok(cfg)
    }
}

fn env_parse<T>(key: &str) -> Result<Option<T>, String>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| format!("{key}: {e}")),
        Err(_) => Ok(None),
    }
}
