//! Tests for builder modules

use std::collections::HashMap;
use std::sync::Arc;

use prometheus_command_queue::builders::{build_queues, register_queues, QueueBuilder};
use prometheus_command_queue::config::{QueueConfig, SchedulerConfig};
use prometheus_command_queue::core::{
    AppResult, Command, CommandError, CommandManager, CommandQueue, CommandStatus,
    InMemoryFaultSink,
};

fn config_with(names: &[&str]) -> SchedulerConfig {
    let mut queues = HashMap::new();
    for name in names {
        queues.insert(
            (*name).to_string(),
            QueueConfig {
                budget: 3,
                max_history: 5,
            },
        );
    }
    SchedulerConfig { queues }
}

struct AlwaysErrors;

impl Command for AlwaysErrors {
    fn status(&self) -> CommandStatus {
        CommandStatus::Ready
    }

    fn execute(&mut self) -> AppResult<()> {
        anyhow::bail!("nope")
    }
}

#[test]
fn test_queue_builder_defaults() {
    let builder = QueueBuilder::new("ui", QueueConfig::default());
    assert_eq!(builder.name(), "ui");
    assert_eq!(builder.config().budget, 10);

    let queue = builder.build().unwrap();
    assert_eq!(queue.name(), "ui");
    assert_eq!(queue.budget(), 10);
}

#[test]
fn test_queue_builder_rejects_invalid_config() {
    let builder = QueueBuilder::new(
        "ui",
        QueueConfig {
            budget: 0,
            max_history: 1,
        },
    );
    assert!(matches!(builder.build(), Err(CommandError::InvalidConfig(_))));
}

#[test]
fn test_build_queues_shares_fault_sink() {
    let sink = Arc::new(InMemoryFaultSink::new(8));
    let queues = build_queues(&config_with(&["a", "b"]), Some(sink.clone())).unwrap();
    assert_eq!(queues.len(), 2);
    assert_eq!(queues["a"].budget(), 3);

    queues["a"].enqueue(AlwaysErrors);
    queues["b"].enqueue(AlwaysErrors);
    queues["a"].resolve().unwrap();
    queues["b"].resolve().unwrap();

    let sources: Vec<_> = sink.events().into_iter().map(|e| e.source).collect();
    assert_eq!(sources.len(), 2);
    assert!(sources.contains(&"a".to_string()));
    assert!(sources.contains(&"b".to_string()));
}

#[test]
fn test_register_queues_in_name_order() {
    let manager = CommandManager::new();
    let queues = register_queues(&manager, &config_with(&["zeta", "alpha", "mid"]), None).unwrap();
    assert_eq!(queues.len(), 3);
    assert_eq!(
        manager.queue_names(),
        vec!["alpha".to_string(), "mid".to_string(), "zeta".to_string()]
    );

    let again = register_queues(&manager, &config_with(&["alpha"]), None);
    assert!(matches!(again, Err(CommandError::AlreadyRegistered(_))));
}

#[test]
fn test_register_queues_is_all_or_nothing() {
    let manager = CommandManager::new();
    manager.register(Arc::new(CommandQueue::new("b"))).unwrap();

    let result = register_queues(&manager, &config_with(&["a", "b", "c"]), None);
    assert!(matches!(result, Err(CommandError::AlreadyRegistered(_))));
    assert_eq!(manager.queue_names(), vec!["b".to_string()]);

    // Nothing half-registered blocks a corrected retry.
    let queues = register_queues(&manager, &config_with(&["a", "c"]), None).unwrap();
    assert_eq!(queues.len(), 2);
    assert_eq!(
        manager.queue_names(),
        vec!["b".to_string(), "a".to_string(), "c".to_string()]
    );
}

#[test]
fn test_build_queues_rejects_empty_config() {
    let result = build_queues(&SchedulerConfig::default(), None);
    assert!(matches!(result, Err(CommandError::InvalidConfig(_))));
}
