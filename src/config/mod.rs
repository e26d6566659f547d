//! Configuration models for the worker pool, limiter, and deadline.

pub mod pool;

pub use pool::{LimiterConfig, WorkerPoolConfig, MAX_RATE_PER_SEC};
