//! Fault sink implementations.
//!
//! Queues report execution and notification faults through a narrow
//! "record error/warning/info" capability. `TracingFaultSink` forwards to
//! `tracing`; `InMemoryFaultSink` keeps a bounded buffer for tests and dev.

use std::collections::VecDeque;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::util::clock::now_ms;

/// Severity of a recorded fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultSeverity {
    /// Informational.
    Info,
    /// Recovered problem worth attention.
    Warning,
    /// Failure of a unit of work.
    Error,
}

/// Fault event structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaultEvent {
    /// Severity.
    pub severity: FaultSeverity,
    /// Component reporting the fault (usually a queue name).
    pub source: String,
    /// Fault category (execution, notification, ...).
    pub category: String,
    /// Human-readable message.
    pub message: String,
    /// Underlying cause, if any.
    pub cause: Option<String>,
    /// Timestamp milliseconds.
    pub created_at_ms: u128,
}

/// Fault sink abstraction.
pub trait FaultSink: Send + Sync {
    /// Record a fault event.
    fn record(&self, event: FaultEvent);
}

/// Sink that forwards every event to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingFaultSink;

impl FaultSink for TracingFaultSink {
    fn record(&self, event: FaultEvent) {
        let cause = event.cause.as_deref().unwrap_or("-");
        match event.severity {
            FaultSeverity::Error => tracing::error!(
                source = %event.source,
                category = %event.category,
                cause,
                "{}",
                event.message
            ),
            FaultSeverity::Warning => tracing::warn!(
                source = %event.source,
                category = %event.category,
                cause,
                "{}",
                event.message
            ),
            FaultSeverity::Info => tracing::info!(
                source = %event.source,
                category = %event.category,
                cause,
                "{}",
                event.message
            ),
        }
    }
}

/// In-memory fault sink for testing and dev.
pub struct InMemoryFaultSink {
    events: Mutex<VecDeque<FaultEvent>>,
    max_events: usize,
}

impl InMemoryFaultSink {
    /// Create a new in-memory sink with a bounded buffer.
    #[must_use]
    pub fn new(max_events: usize) -> Self {
        Self {
            events: Mutex::new(VecDeque::with_capacity(max_events.min(1024))),
            max_events,
        }
    }

    /// Retrieve a snapshot of stored events.
    #[must_use]
    pub fn events(&self) -> Vec<FaultEvent> {
        self.events.lock().iter().cloned().collect()
    }

    /// Number of stored events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    /// Whether no events are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

impl FaultSink for InMemoryFaultSink {
    fn record(&self, event: FaultEvent) {
        let mut events = self.events.lock();
        if self.max_events == 0 {
            return;
        }
        if events.len() >= self.max_events {
            events.pop_front();
        }
        events.push_back(event);
    }
}

/// Helper to build a fault event from context.
pub fn build_fault_event(
    severity: FaultSeverity,
    source: impl Into<String>,
    category: impl Into<String>,
    message: impl Into<String>,
    cause: Option<String>,
) -> FaultEvent {
    FaultEvent {
        severity,
        source: source.into(),
        category: category.into(),
        message: message.into(),
        cause,
        created_at_ms: now_ms(),
    }
}
