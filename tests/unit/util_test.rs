//! Tests for utility functions

use prometheus_admission::core::{CancelReason, RunOutcome};
use prometheus_admission::util::{init_tracing, now_ms, JobId, RunSummary, WorkerId};

fn summary(outcome: RunOutcome) -> RunSummary {
    RunSummary {
        run_id: "00000000-0000-4000-8000-000000000000".to_string(),
        worker_count: 5,
        jobs_enqueued: 12,
        jobs_dequeued: 5,
        results_recorded: 5,
        processing_failures: 0,
        unprocessed: 7,
        outcome,
        started_at_ms: 1_000,
        finished_at_ms: 2_000,
    }
}

#[test]
fn test_ids() {
    let job: JobId = 12345;
    let worker: WorkerId = 4;
    assert_eq!(job, 12345);
    assert_eq!(worker, 4);
}

#[test]
fn test_now_ms_is_monotone_enough() {
    let a = now_ms();
    let b = now_ms();
    assert!(a > 0);
    assert!(b >= a);
}

#[test]
fn test_summary_outcome_encoding() {
    let json = serde_json::to_value(summary(RunOutcome::Cancelled(
        CancelReason::DeadlineExceeded,
    )))
    .unwrap();
    assert_eq!(
        json["outcome"],
        serde_json::json!({ "cancelled": "deadline_exceeded" })
    );
    assert_eq!(json["unprocessed"], 7);

    let json = serde_json::to_value(summary(RunOutcome::Completed)).unwrap();
    assert_eq!(json["outcome"], "completed");
}

#[test]
fn test_summary_round_trips_from_json_text() {
    let text = r#"{
        "run_id": "00000000-0000-4000-8000-000000000000",
        "worker_count": 5,
        "jobs_enqueued": 12,
        "jobs_dequeued": 5,
        "results_recorded": 5,
        "processing_failures": 0,
        "unprocessed": 7,
        "outcome": {"cancelled": "explicit"},
        "started_at_ms": 1000,
        "finished_at_ms": 2000
    }"#;
    let parsed: RunSummary = serde_json::from_str(text).unwrap();
    assert_eq!(parsed, summary(RunOutcome::Cancelled(CancelReason::Explicit)));
}

#[test]
fn test_init_tracing_is_idempotent() {
    init_tracing();
    init_tracing();
    tracing::info!(target: "prometheus_admission", "tracing initialized");
}
