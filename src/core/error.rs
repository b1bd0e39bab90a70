//! Error types for command queue operations.

use thiserror::Error;

/// Errors produced by queues and the command manager.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    /// A command body reported a failure from `execute`.
    #[error("command `{command}` failed: {reason}")]
    Execution {
        /// Name of the faulting command.
        command: String,
        /// Failure reason reported by the command.
        reason: String,
    },
    /// A command, callback, or queue panicked and the panic was contained.
    #[error("panic contained in {0}")]
    Panicked(String),
    /// `resolve` was called on a queue that is already resolving.
    #[error("resolve already in progress on queue `{0}`")]
    ResolveInProgress(String),
    /// Queue is already tracked by the manager.
    #[error("queue already registered: {0}")]
    AlreadyRegistered(String),
    /// Queue is not tracked by the manager.
    #[error("queue not registered: {0}")]
    NotRegistered(String),
    /// Configuration rejected during validation.
    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

/// Application-facing result using anyhow for command bodies and callbacks.
pub type AppResult<T> = Result<T, anyhow::Error>;

/// Render a contained panic payload as text.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
