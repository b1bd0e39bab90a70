//! # Prometheus Command Queue
//!
//! A cooperative, single-pass command scheduler driven by external ticks.
//!
//! Commands are deferred units of work with an observable lifecycle status.
//! A [`CommandQueue`](core::CommandQueue) holds them in FIFO order and, each
//! time the host calls `resolve` (once per frame, per loop iteration, ...),
//! advances the head of the queue for a bounded number of iterations. There
//! are no scheduler threads: all queue work happens inside the caller's tick,
//! and any concurrency lives inside a command's own implementation.
//!
//! ## Key Features
//!
//! - **Fixed lifecycle**: `NotReady -> Ready -> Executing -> Completed | Failed`,
//!   owned by the command and only read by the queue
//! - **Budgeted resolution**: at most `budget` iterations per resolve call
//! - **Head-of-line blocking**: a command that is not actionable holds the queue
//! - **Failure isolation**: faulting commands are failed and discarded; faulting
//!   listeners are reported and ignored
//! - **Registry fan-out**: [`CommandManager`](core::CommandManager) resolves and
//!   clears every registered queue, isolating per-queue failures
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use prometheus_command_queue::core::{CommandManager, CommandQueue, FnCommand};
//!
//! let manager = CommandManager::new();
//! let queue = Arc::new(CommandQueue::new("ui").with_budget(10));
//! manager.register(queue.clone()).unwrap();
//!
//! queue.on_completed(|event| {
//!     println!("{} done", event.command_name);
//!     Ok(())
//! });
//! queue.enqueue(FnCommand::new("show-dialog", || Ok(())));
//!
//! // Host tick.
//! let report = manager.resolve_all();
//! assert!(report.is_ok());
//! assert!(queue.is_empty());
//! ```
//!
//! For longer running work, see `runtime::SpawnedCommand` (feature
//! `tokio-runtime`), which runs a future on tokio and reports `Executing` until
//! it settles.

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Core command abstractions, queue resolution, and the registry.
pub mod core;
/// Configuration models for queues and the scheduler.
pub mod config;
/// Builders to construct queues from configuration.
pub mod builders;
/// Runtime adapters and API surface.
pub mod runtime;
/// Shared utilities.
pub mod util;
