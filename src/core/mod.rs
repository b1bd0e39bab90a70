//! Core command abstractions, the queue resolution algorithm, and the registry.

pub mod command;
pub mod error;
pub mod fault;
pub mod manager;
pub mod queue;

pub use command::{
    Command, CommandCallback, CommandCallbacks, CommandEvent, CommandEventKind, CommandId,
    CommandStatus, ContextCommand, ContextualCommand, FnCommand, StatusHandle,
};
pub use error::{AppResult, CommandError};
pub use fault::{
    build_fault_event, FaultEvent, FaultSeverity, FaultSink, InMemoryFaultSink, TracingFaultSink,
};
pub use manager::{CommandManager, QueueFailure, QueueResolution, ResolveAllReport, ResolveCommands};
pub use queue::{
    CommandQueue, HistoryEntry, Listener, ListenerId, ResolutionCompletedListener,
    ResolutionStartedListener, ResolveSummary, DEFAULT_BUDGET, DEFAULT_MAX_HISTORY,
};
