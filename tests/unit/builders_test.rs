//! Tests for builder modules

use std::time::Duration;

use prometheus_admission::builders::Pipeline;
use prometheus_admission::config::WorkerPoolConfig;
use prometheus_admission::core::{processor_fn, JobMeta};
use prometheus_admission::runtime::TokioSpawner;

#[tokio::test]
async fn test_pipeline_keeps_config() {
    let config = WorkerPoolConfig::new()
        .with_worker_count(2)
        .with_deadline(Duration::from_millis(300));
    let pipeline = Pipeline::new(
        config.clone(),
        processor_fn(|job: u32, _meta: JobMeta| async move { Ok::<_, anyhow::Error>(job) }),
        TokioSpawner::current(),
    )
    .unwrap();
    assert_eq!(pipeline.config(), &config);
}

#[tokio::test(start_paused = true)]
async fn test_pipeline_runs_are_independent() {
    let pipeline = Pipeline::new(
        WorkerPoolConfig::new()
            .with_worker_count(2)
            .with_rate(100)
            .with_initial_tokens(10)
            .without_deadline(),
        processor_fn(|job: u32, _meta: JobMeta| async move { Ok::<_, anyhow::Error>(job + 1) }),
        TokioSpawner::current(),
    )
    .unwrap();

    let first = pipeline.run(0..4u32).await.unwrap();
    let second = pipeline.run(10..12u32).await.unwrap();

    assert_eq!(first.pool.results.len(), 4);
    assert_eq!(second.pool.results.len(), 2);
    assert_ne!(first.pool.run_id, second.pool.run_id);
    assert!(second.pool.results.iter().all(|r| *r >= 11));
}

#[tokio::test(start_paused = true)]
async fn test_pipeline_with_empty_input() {
    let pipeline = Pipeline::new(
        WorkerPoolConfig::new().with_worker_count(3).with_initial_tokens(3),
        processor_fn(|job: u32, _meta: JobMeta| async move { Ok::<_, anyhow::Error>(job) }),
        TokioSpawner::current(),
    )
    .unwrap();

    let report = pipeline.run(std::iter::empty::<u32>()).await.unwrap();
    assert!(report.pool.results.is_empty());
    assert_eq!(report.feed.enqueued, 0);
    assert!(report.pool.is_complete());
}
