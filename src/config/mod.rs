//! Configuration models for queues and the scheduler.

pub mod queue;

pub use queue::{QueueConfig, SchedulerConfig, BUDGET_ENV, MAX_HISTORY_ENV};
