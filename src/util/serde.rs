//! Serializable identifiers and summaries shared across modules.

use serde::{Deserialize, Serialize};

use crate::core::RunOutcome;

/// Job identifier, assigned by the queue in enqueue order.
pub type JobId = u64;

/// Worker index within a pool, `0..worker_count`.
pub type WorkerId = usize;

/// Counts-only view of a finished pool run, suitable for logging or JSON export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Run identifier (UUID v4, hyphenated).
    pub run_id: String,
    /// Number of workers that ran.
    pub worker_count: usize,
    /// Jobs accepted by the queue.
    pub jobs_enqueued: u64,
    /// Jobs handed to workers.
    pub jobs_dequeued: u64,
    /// Results in the final snapshot.
    pub results_recorded: u64,
    /// Jobs the processor failed on.
    pub processing_failures: u64,
    /// `jobs_enqueued - results_recorded`.
    pub unprocessed: u64,
    /// How the run ended.
    pub outcome: RunOutcome,
    /// Wall-clock start (ms since epoch).
    pub started_at_ms: u128,
    /// Wall-clock end (ms since epoch).
    pub finished_at_ms: u128,
}
