//! Tests for error types

use prometheus_admission::core::{AppResult, PoolError};

#[test]
fn test_queue_full_error() {
    let err = PoolError::QueueFull(8);
    assert_eq!(format!("{}", err), "queue full: capacity 8");
}

#[test]
fn test_termination_errors() {
    assert_eq!(format!("{}", PoolError::Cancelled), "operation cancelled");
    assert_eq!(format!("{}", PoolError::QueueClosed), "queue closed");
    assert!(PoolError::Cancelled.is_termination());
    assert!(!PoolError::Internal("lost task".to_string()).is_termination());
}

#[test]
fn test_invalid_config_error() {
    let err = PoolError::InvalidConfig("burst must be greater than 0".to_string());
    assert_eq!(
        format!("{}", err),
        "invalid configuration: burst must be greater than 0"
    );
}

#[test]
fn test_pool_error_converts_into_app_result() {
    fn fails() -> AppResult<()> {
        Err::<(), _>(PoolError::QueueClosed)?;
        Ok(())
    }
    let err = fails().unwrap_err();
    assert_eq!(err.downcast_ref::<PoolError>(), Some(&PoolError::QueueClosed));
}
