//! Tests for configuration validation

use prometheus_command_queue::config::{QueueConfig, SchedulerConfig, BUDGET_ENV, MAX_HISTORY_ENV};

#[test]
fn test_queue_config_defaults() {
    let cfg = QueueConfig::default();
    assert_eq!(cfg.budget, 10);
    assert_eq!(cfg.max_history, 100);
    assert!(cfg.validate().is_ok());
}

#[test]
fn test_queue_config_invalid_budget() {
    let invalid = QueueConfig {
        budget: 0,
        max_history: 100,
    };
    assert!(invalid.validate().is_err());
}

#[test]
fn test_scheduler_config_validation() {
    let mut queues = std::collections::HashMap::new();
    queues.insert("ui".to_string(), QueueConfig::default());

    let config = SchedulerConfig { queues };
    assert!(config.validate().is_ok());
}

#[test]
fn test_scheduler_config_empty_queues() {
    let config = SchedulerConfig::default();
    assert!(config.validate().is_err());
}

#[test]
fn test_scheduler_config_reports_bad_queue() {
    let mut queues = std::collections::HashMap::new();
    queues.insert(
        "audio".to_string(),
        QueueConfig {
            budget: 0,
            max_history: 1,
        },
    );
    let err = SchedulerConfig { queues }.validate().unwrap_err();
    assert!(err.contains("audio"));
}

#[test]
fn test_scheduler_config_from_json() {
    let json = r#"{
        "queues": {
            "ui": { "budget": 4, "max_history": 20 },
            "network": {}
        }
    }"#;

    let config = SchedulerConfig::from_json_str(json).unwrap();
    assert_eq!(config.queues["ui"].budget, 4);
    assert_eq!(config.queues["network"], QueueConfig::default());
}

#[test]
fn test_scheduler_config_from_json_rejects_garbage() {
    assert!(SchedulerConfig::from_json_str("{ not json").is_err());
    assert!(SchedulerConfig::from_json_str(r#"{"queues": {"ui": {"budget": 0}}}"#).is_err());
}

// Single test touching the process environment to avoid races between tests.
#[test]
fn test_queue_config_from_env() {
    std::env::set_var(BUDGET_ENV, "7");
    std::env::set_var(MAX_HISTORY_ENV, "3");
    let cfg = QueueConfig::from_env().unwrap();
    assert_eq!(cfg.budget, 7);
    assert_eq!(cfg.max_history, 3);

    std::env::set_var(BUDGET_ENV, "lots");
    assert!(QueueConfig::from_env().is_err());

    std::env::set_var(BUDGET_ENV, "0");
    assert!(QueueConfig::from_env().is_err());

    std::env::remove_var(BUDGET_ENV);
    std::env::remove_var(MAX_HISTORY_ENV);
}
