//! Integration tests for the command manager fan-out.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use prometheus_command_queue::core::{
    CommandError, CommandManager, CommandQueue, CommandStatus, FnCommand, ResolveCommands,
    ResolveSummary,
};
use prometheus_command_queue::runtime::QueueSnapshot;

/// Queue stand-in whose resolve always fails.
struct FailingQueue {
    name: String,
    panics: bool,
    resolves: AtomicUsize,
}

impl FailingQueue {
    fn new(name: &str, panics: bool) -> Self {
        Self {
            name: name.to_string(),
            panics,
            resolves: AtomicUsize::new(0),
        }
    }
}

impl ResolveCommands for FailingQueue {
    fn name(&self) -> &str {
        &self.name
    }

    fn resolve(&self) -> Result<ResolveSummary, CommandError> {
        self.resolves.fetch_add(1, Ordering::SeqCst);
        if self.panics {
            panic!("queue `{}` corrupted", self.name);
        }
        Err(CommandError::ResolveInProgress(self.name.clone()))
    }

    fn clear(&self) -> usize {
        0
    }

    fn snapshot(&self) -> QueueSnapshot {
        QueueSnapshot {
            name: self.name.clone(),
            pending: 0,
            has_current: false,
            current_status: None,
            budget: 0,
            history_len: 0,
        }
    }
}

fn counting_command(name: &str, counter: &Arc<AtomicUsize>) -> FnCommand {
    let counter = Arc::clone(counter);
    FnCommand::new(name, move || {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    })
}

#[test]
fn test_resolve_all_advances_every_queue() {
    let manager = CommandManager::new();
    let audio = Arc::new(CommandQueue::new("audio"));
    let network = Arc::new(CommandQueue::new("network"));
    manager.register(audio.clone()).unwrap();
    manager.register(network.clone()).unwrap();

    let runs = Arc::new(AtomicUsize::new(0));
    audio.enqueue(counting_command("play", &runs));
    network.enqueue(counting_command("fetch", &runs));

    let report = manager.resolve_all();
    assert!(report.is_ok());
    assert_eq!(runs.load(Ordering::SeqCst), 2);
    assert_eq!(report.resolved.len(), 2);
    assert_eq!(report.resolved[0].queue, "audio");
    assert_eq!(report.resolved[1].queue, "network");
    assert_eq!(report.summary_for("network").unwrap().completed, 1);
    assert_eq!(report.total_iterations(), 4);
    assert!(audio.is_empty());
    assert!(network.is_empty());
}

#[test]
fn test_failing_queue_does_not_block_others() {
    let manager = CommandManager::new();
    let erroring = Arc::new(FailingQueue::new("erroring", false));
    let panicking = Arc::new(FailingQueue::new("panicking", true));
    let healthy = Arc::new(CommandQueue::new("healthy"));

    manager.register(erroring.clone()).unwrap();
    manager.register(panicking.clone()).unwrap();
    manager.register(healthy.clone()).unwrap();

    let runs = Arc::new(AtomicUsize::new(0));
    healthy.enqueue(counting_command("work", &runs));

    let report = manager.resolve_all();
    assert!(!report.is_ok());
    assert_eq!(report.failures.len(), 2);
    assert_eq!(report.failures[0].queue, "erroring");
    assert_eq!(report.failures[1].queue, "panicking");
    assert!(matches!(report.failures[1].error, CommandError::Panicked(_)));
    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert!(healthy.is_empty());

    // Faulting queues stay registered and are retried on the next tick.
    manager.resolve_all();
    assert_eq!(erroring.resolves.load(Ordering::SeqCst), 2);
    assert_eq!(panicking.resolves.load(Ordering::SeqCst), 2);
}

#[test]
fn test_clear_all_is_silent() {
    let manager = CommandManager::new();
    let a = Arc::new(CommandQueue::new("a"));
    let b = Arc::new(CommandQueue::new("b"));
    manager.register(a.clone()).unwrap();
    manager.register(b.clone()).unwrap();

    let notified = Arc::new(AtomicUsize::new(0));
    for queue in [&a, &b] {
        let n = Arc::clone(&notified);
        queue.on_failed(move |_| {
            n.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        let n = Arc::clone(&notified);
        queue.on_completed(move |_| {
            n.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
    }

    a.enqueue(FnCommand::new("a1", || Ok(())));
    a.enqueue(FnCommand::new("a2", || Ok(())));
    b.enqueue(FnCommand::new("b1", || Ok(())));

    assert_eq!(manager.clear_all(), 3);
    manager.resolve_all();
    assert_eq!(notified.load(Ordering::SeqCst), 0);
    assert!(a.is_empty() && b.is_empty());
}

#[test]
fn test_registration_from_inside_a_tick() {
    let manager = Arc::new(CommandManager::new());
    let first = Arc::new(CommandQueue::new("first"));
    manager.register(first.clone()).unwrap();

    let late = Arc::new(CommandQueue::new("late"));
    let registry = Arc::clone(&manager);
    let to_register = Arc::clone(&late);
    first.on_completed(move |_| {
        registry.register(to_register.clone())?;
        Ok(())
    });
    first.enqueue(FnCommand::new("bootstrap", || Ok(())));

    let report = manager.resolve_all();
    assert!(report.is_ok());
    // Registered during the pass, so it is resolved from the next tick on.
    assert_eq!(report.resolved.len(), 1);
    assert_eq!(manager.queue_names(), vec!["first".to_string(), "late".to_string()]);
}

#[test]
fn test_snapshot_exposes_stalled_queue() {
    let manager = CommandManager::new();
    let queue = Arc::new(CommandQueue::new("stalled"));
    manager.register(queue.clone()).unwrap();

    queue.enqueue(prometheus_command_queue::core::ContextCommand::new(
        "needs-context",
        |_: &String| Ok(()),
    ));
    queue.enqueue(FnCommand::new("behind", || Ok(())));
    manager.resolve_all();

    let snapshot = manager.snapshot();
    assert_eq!(snapshot.queues.len(), 1);
    let stalled = &snapshot.queues[0];
    assert!(stalled.has_current);
    assert_eq!(stalled.current_status, Some(CommandStatus::NotReady));
    assert!(stalled.is_blocked());
    assert_eq!(stalled.pending, 1);
    assert_eq!(snapshot.outstanding(), 2);

    let json = snapshot.to_json().unwrap();
    assert!(json.contains("\"not_ready\""));
}

#[test]
fn test_unregistered_queue_is_no_longer_resolved() {
    let manager = CommandManager::new();
    let queue = Arc::new(CommandQueue::new("transient"));
    manager.register(queue.clone()).unwrap();
    manager.unregister(&*queue).unwrap();

    queue.enqueue(FnCommand::new("ignored", || Ok(())));
    let report = manager.resolve_all();
    assert!(report.resolved.is_empty());
    assert_eq!(queue.len(), 1);

    assert!(matches!(
        manager.unregister(&*queue),
        Err(CommandError::NotRegistered(_))
    ));
}
