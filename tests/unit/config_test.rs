//! Tests for configuration validation

use std::time::Duration;

use prometheus_admission::config::{LimiterConfig, WorkerPoolConfig, MAX_RATE_PER_SEC};

#[test]
fn test_pool_config_validation() {
    let valid = WorkerPoolConfig {
        worker_count: 5,
        queue_capacity: 8,
        limiter: LimiterConfig {
            rate_per_sec: 5,
            burst: 10,
            initial_tokens: 0,
        },
        deadline_ms: Some(1_000),
    };
    assert!(valid.validate().is_ok());
    assert_eq!(valid, WorkerPoolConfig::default());
}

#[test]
fn test_pool_config_invalid_worker_count() {
    let invalid = WorkerPoolConfig::new().with_worker_count(0);
    assert!(invalid.validate().is_err());
}

#[test]
fn test_pool_config_invalid_queue_capacity() {
    let invalid = WorkerPoolConfig::new().with_queue_capacity(0);
    assert!(invalid.validate().is_err());
}

#[test]
fn test_pool_config_invalid_limiter() {
    assert!(WorkerPoolConfig::new().with_rate(0).validate().is_err());
    assert!(WorkerPoolConfig::new().with_burst(0).validate().is_err());

    let err = WorkerPoolConfig::new()
        .with_burst(2)
        .with_initial_tokens(3)
        .validate()
        .unwrap_err();
    assert!(err.starts_with("limiter invalid"), "{err}");
}

#[test]
fn test_pool_config_for_host() {
    let cfg = WorkerPoolConfig::for_host();
    assert_eq!(cfg.worker_count, num_cpus::get());
    assert!(cfg.validate().is_ok());
}

#[test]
fn test_pool_config_from_json() {
    let cfg = WorkerPoolConfig::from_json_str(
        r#"{
            "worker_count": 3,
            "queue_capacity": 4,
            "limiter": { "rate_per_sec": 20, "burst": 5 },
            "deadline_ms": 250
        }"#,
    )
    .unwrap();
    assert_eq!(cfg.worker_count, 3);
    assert_eq!(cfg.limiter.initial_tokens, 0);
    assert_eq!(cfg.limiter.refill_period(), Duration::from_millis(50));
    assert_eq!(cfg.deadline(), Some(Duration::from_millis(250)));
}

#[test]
fn test_pool_config_from_json_defaults_optional_sections() {
    let cfg = WorkerPoolConfig::from_json_str(r#"{ "worker_count": 2, "queue_capacity": 2 }"#)
        .unwrap();
    assert_eq!(cfg.limiter, LimiterConfig::default());
    assert_eq!(cfg.deadline(), None);
}

#[test]
fn test_pool_config_from_json_rejects_invalid() {
    let err = WorkerPoolConfig::from_json_str(r#"{ "worker_count": 0, "queue_capacity": 2 }"#)
        .unwrap_err();
    assert!(err.contains("worker_count"));

    let err = WorkerPoolConfig::from_json_str("not json").unwrap_err();
    assert!(err.starts_with("parse error"));
}

// The only test in this binary touching ADMISSION_* variables.
#[test]
fn test_pool_config_from_env() {
    let keys = [
        ("ADMISSION_WORKER_COUNT", "7"),
        ("ADMISSION_QUEUE_CAPACITY", "16"),
        ("ADMISSION_RATE_PER_SEC", "50"),
        ("ADMISSION_BURST", "20"),
        ("ADMISSION_INITIAL_TOKENS", "20"),
        ("ADMISSION_DEADLINE_MS", "none"),
    ];
    for (key, value) in keys {
        std::env::set_var(key, value);
    }

    let cfg = WorkerPoolConfig::from_env().unwrap();
    assert_eq!(cfg.worker_count, 7);
    assert_eq!(cfg.queue_capacity, 16);
    assert_eq!(cfg.limiter.rate_per_sec, 50);
    assert_eq!(cfg.limiter.burst, 20);
    assert_eq!(cfg.limiter.initial_tokens, 20);
    assert_eq!(cfg.deadline(), None);

    std::env::set_var("ADMISSION_DEADLINE_MS", "1500");
    assert_eq!(
        WorkerPoolConfig::from_env().unwrap().deadline(),
        Some(Duration::from_millis(1_500))
    );

    std::env::set_var("ADMISSION_WORKER_COUNT", "lots");
    let err = WorkerPoolConfig::from_env().unwrap_err();
    assert!(err.starts_with("ADMISSION_WORKER_COUNT"), "{err}");

    for (key, _) in keys {
        std::env::remove_var(key);
    }
    assert_eq!(WorkerPoolConfig::from_env().unwrap(), WorkerPoolConfig::default());
}

#[test]
fn test_pool_config_rejects_rate_above_limit() {
    assert!(WorkerPoolConfig::new()
        .with_rate(MAX_RATE_PER_SEC)
        .validate()
        .is_ok());
    let err = WorkerPoolConfig::new()
        .with_rate(2_000_000_000)
        .validate()
        .unwrap_err();
    assert!(err.contains("rate_per_sec"), "{err}");
}
