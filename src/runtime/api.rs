//! API-facing inspection models.
//!
//! A stalled queue is an expected state, not a crash. These snapshots make it
//! visible: `has_current` stays true while `current_status` does not advance.

use serde::{Deserialize, Serialize};

use crate::core::CommandStatus;

/// Point-in-time view of one queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueSnapshot {
    /// Queue identifier.
    pub name: String,
    /// Commands waiting behind the current slot.
    pub pending: usize,
    /// Whether the current slot is occupied.
    pub has_current: bool,
    /// Status of the command in the current slot.
    pub current_status: Option<CommandStatus>,
    /// Iterations allowed per resolve.
    pub budget: usize,
    /// Outcomes kept in history.
    pub history_len: usize,
}

impl QueueSnapshot {
    /// Whether the queue holds a command that is waiting on external state.
    #[must_use]
    pub fn is_blocked(&self) -> bool {
        matches!(
            self.current_status,
            Some(CommandStatus::NotReady | CommandStatus::Executing)
        )
    }
}

/// Point-in-time view of every registered queue.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagerSnapshot {
    /// Snapshots in registration order.
    pub queues: Vec<QueueSnapshot>,
}

impl ManagerSnapshot {
    /// Total commands waiting across all queues, current slots included.
    #[must_use]
    pub fn outstanding(&self) -> usize {
        self.queues
            .iter()
            .map(|q| q.pending + usize::from(q.has_current))
            .sum()
    }

    /// Serialize to JSON for diagnostics endpoints.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
