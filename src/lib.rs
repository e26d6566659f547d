//! # Prometheus Admission
//!
//! A bounded, rate-limited, cancellable worker pool for the Prometheus AI Platform.
//!
//! Units of work are admitted under a token-bucket quota, handed to a fixed pool of workers
//! through a bounded queue, and their results aggregated under a global deadline. Every
//! blocking point (token acquisition, enqueue, dequeue) races against one cancellation signal,
//! so a cancelled run stops promptly and still returns whatever was finished.
//!
//! ## Core Problem Solved
//!
//! Downstream services (model endpoints, paid APIs, shared GPUs) impose throughput ceilings
//! that must hold regardless of how many workers are ready:
//!
//! - **Admission Control**: A token bucket caps steady-state starts at `rate` per second while
//!   absorbing short bursts up to `burst`
//! - **Backpressure**: A bounded queue blocks the producer instead of buffering without limit
//! - **Deadlines**: A global deadline cancels everything still waiting; in-flight jobs finish
//! - **Accounting**: Callers always get a snapshot plus how many jobs were left unprocessed
//!
//! ## Components
//!
//! - [`core::TokenBucket`]: refill task plus cancellable `acquire`
//! - [`core::JobQueue`]: bounded FIFO with cancellable `enqueue`/`dequeue` and idempotent `close`
//! - [`core::ResultStore`]: append-only results with copy-out snapshots
//! - [`core::WorkerPool`]: N tracked workers, one blocking `run`
//! - [`core::CancellationController`]: cancellation token with an optional deadline timer
//! - [`builders::Pipeline`]: everything above wired from a [`config::WorkerPoolConfig`]
//!
//! ```rust,ignore
//! use prometheus_admission::builders::Pipeline;
//! use prometheus_admission::config::WorkerPoolConfig;
//! use prometheus_admission::core::processor_fn;
//! use prometheus_admission::runtime::TokioSpawner;
//!
//! let pipeline = Pipeline::new(
//!     WorkerPoolConfig::new()
//!         .with_worker_count(5)
//!         .with_queue_capacity(8)
//!         .with_rate(5)
//!         .with_burst(10)
//!         .with_deadline(Duration::from_secs(1)),
//!     processor_fn(|job: u64, _meta| async move { Ok(job * 2) }),
//!     TokioSpawner::current(),
//! )?;
//!
//! let report = pipeline.run(1..=12).await?;
//! println!(
//!     "collected {} results, {} unprocessed",
//!     report.pool.results.len(),
//!     report.pool.unprocessed()
//! );
//! ```
//!
//! For complete examples, see:
//! - `tests/pipeline_test.rs` - End-to-end runs under a deadline
//! - `tests/worker_pool_test.rs` - Pool behavior, cancellation, and failure isolation

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Builders that wire components together from configuration.
pub mod builders;
/// Configuration models for the pool, limiter, and deadline.
pub mod config;
/// Core admission, queueing, and worker pool abstractions.
pub mod core;
/// Runtime adapters for spawning worker tasks.
pub mod runtime;
/// Shared utilities.
pub mod util;
