//! Tests for fault sinks

use prometheus_command_queue::core::{
    build_fault_event, FaultSeverity, FaultSink, InMemoryFaultSink, TracingFaultSink,
};

#[test]
fn test_in_memory_fault_sink() {
    let sink = InMemoryFaultSink::new(10);
    assert!(sink.is_empty());

    sink.record(build_fault_event(
        FaultSeverity::Error,
        "ui",
        "execution",
        "command `open` faulted",
        Some("timeout".to_string()),
    ));
    assert_eq!(sink.len(), 1);

    let events = sink.events();
    assert_eq!(events[0].source, "ui");
    assert_eq!(events[0].category, "execution");
    assert_eq!(events[0].cause.as_deref(), Some("timeout"));
}

#[test]
fn test_fault_sink_overflow() {
    let sink = InMemoryFaultSink::new(2);

    sink.record(build_fault_event(FaultSeverity::Info, "q", "c", "evt1", None));
    sink.record(build_fault_event(FaultSeverity::Info, "q", "c", "evt2", None));
    sink.record(build_fault_event(FaultSeverity::Info, "q", "c", "evt3", None));

    let events = sink.events();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].message, "evt2"); // First one popped
    assert_eq!(events[1].message, "evt3");
}

#[test]
fn test_zero_capacity_sink_keeps_nothing() {
    let sink = InMemoryFaultSink::new(0);
    sink.record(build_fault_event(FaultSeverity::Warning, "q", "c", "dropped", None));
    assert!(sink.is_empty());
}

#[test]
fn test_build_fault_event() {
    let event = build_fault_event(
        FaultSeverity::Warning,
        "network",
        "notification",
        "listener faulted",
        None,
    );

    assert_eq!(event.severity, FaultSeverity::Warning);
    assert_eq!(event.source, "network");
    assert_eq!(event.category, "notification");
    assert_eq!(event.message, "listener faulted");
    assert!(event.cause.is_none());
    assert!(event.created_at_ms > 0);
}

#[test]
fn test_tracing_sink_accepts_every_severity() {
    prometheus_command_queue::util::init_tracing();
    let sink = TracingFaultSink;
    for severity in [FaultSeverity::Info, FaultSeverity::Warning, FaultSeverity::Error] {
        sink.record(build_fault_event(severity, "q", "c", "message", None));
    }
}
