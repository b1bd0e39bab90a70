//! Tests for error types

use prometheus_command_queue::core::CommandError;

#[test]
fn test_execution_error() {
    let err = CommandError::Execution {
        command: "purchase".to_string(),
        reason: "store offline".to_string(),
    };
    assert_eq!(format!("{}", err), "command `purchase` failed: store offline");
}

#[test]
fn test_panicked_error() {
    let err = CommandError::Panicked("execute of `x`: boom".to_string());
    assert_eq!(format!("{}", err), "panic contained in execute of `x`: boom");
}

#[test]
fn test_resolve_in_progress_error() {
    let err = CommandError::ResolveInProgress("ui".to_string());
    assert_eq!(format!("{}", err), "resolve already in progress on queue `ui`");
}

#[test]
fn test_registration_errors() {
    assert_eq!(
        format!("{}", CommandError::AlreadyRegistered("ui".to_string())),
        "queue already registered: ui"
    );
    assert_eq!(
        format!("{}", CommandError::NotRegistered("ui".to_string())),
        "queue not registered: ui"
    );
}

#[test]
fn test_error_converts_into_anyhow() {
    let err: anyhow::Error = CommandError::InvalidConfig("budget".to_string()).into();
    assert_eq!(err.to_string(), "invalid config: budget");
}
