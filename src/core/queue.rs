//! Command queue and the per-tick resolution algorithm.
//!
//! A [`CommandQueue`] holds an ordered list of pending commands plus a single
//! current slot. Each [`CommandQueue::resolve`] call advances the head of the
//! queue for at most `budget` iterations:
//!
//! - `Ready` fires the started channel and executes the command.
//! - `Completed` / `Failed` fire the matching channel and release the command.
//! - `NotReady` / `Executing` end the pass; the command keeps the slot and
//!   everything behind it waits (head-of-line blocking).
//!
//! Faults raised by a command (`execute` returning `Err`, or a panic in
//! `status`/`execute`) fail that command and end the pass. Faults raised by
//! listeners or callbacks are reported and otherwise ignored.
//!
//! Every pass is bracketed by the resolution-started and resolution-completed
//! channels, the latter receiving the pass [`ResolveSummary`].

use std::collections::VecDeque;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::error::panic_message;
use crate::core::{
    build_fault_event, AppResult, Command, CommandCallbacks, CommandError, CommandEvent,
    CommandEventKind, CommandId, CommandStatus, FaultSeverity, FaultSink, ResolveCommands,
};
use crate::runtime::api::QueueSnapshot;
use crate::util::clock::now_ms;

/// Default number of resolution iterations per resolve call.
pub const DEFAULT_BUDGET: usize = 10;
/// Default number of outcomes kept in history.
pub const DEFAULT_MAX_HISTORY: usize = 100;

/// Queue-level notification listener.
pub type Listener = Arc<dyn Fn(&CommandEvent) -> AppResult<()> + Send + Sync>;

/// Listener fired when a resolve pass begins. Receives the queue name.
pub type ResolutionStartedListener = Arc<dyn Fn(&str) -> AppResult<()> + Send + Sync>;

/// Listener fired when a resolve pass ends. Receives the queue name and the
/// pass summary.
pub type ResolutionCompletedListener =
    Arc<dyn Fn(&str, &ResolveSummary) -> AppResult<()> + Send + Sync>;

/// Handle returned when a listener is registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Outcome of one resolve call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolveSummary {
    /// Resolution iterations consumed.
    pub iterations: usize,
    /// Started notifications fired.
    pub started: usize,
    /// Completed notifications fired.
    pub completed: usize,
    /// Failed notifications fired, faults included.
    pub failed: usize,
    /// The pass stopped on a command that is not actionable yet.
    pub blocked: bool,
    /// The pass stopped because the budget ran out.
    pub budget_exhausted: bool,
}

impl ResolveSummary {
    /// Total notifications fired during the pass.
    #[must_use]
    pub const fn notifications(&self) -> usize {
        self.started + self.completed + self.failed
    }
}

/// A finished command kept in the bounded history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Identifier assigned at enqueue.
    pub command_id: CommandId,
    /// Command name.
    pub command_name: String,
    /// `Completed` or `Failed`.
    pub outcome: CommandEventKind,
    /// Failure reason, if any.
    pub reason: Option<String>,
    /// Timestamp milliseconds.
    pub finished_at_ms: u128,
}

struct QueuedCommand {
    id: CommandId,
    name: String,
    command: Box<dyn Command>,
    callbacks: CommandCallbacks,
    /// Cleared by `execute`, set again once the command leaves `Ready`.
    armed: bool,
}

#[derive(Default)]
struct Listeners {
    next_id: u64,
    started: Vec<(ListenerId, Listener)>,
    completed: Vec<(ListenerId, Listener)>,
    failed: Vec<(ListenerId, Listener)>,
    resolution_started: Vec<(ListenerId, ResolutionStartedListener)>,
    resolution_completed: Vec<(ListenerId, ResolutionCompletedListener)>,
}

impl Listeners {
    fn channel_mut(&mut self, kind: CommandEventKind) -> &mut Vec<(ListenerId, Listener)> {
        match kind {
            CommandEventKind::Started => &mut self.started,
            CommandEventKind::Completed => &mut self.completed,
            CommandEventKind::Failed => &mut self.failed,
        }
    }

    fn snapshot(&self, kind: CommandEventKind) -> Vec<Listener> {
        let channel = match kind {
            CommandEventKind::Started => &self.started,
            CommandEventKind::Completed => &self.completed,
            CommandEventKind::Failed => &self.failed,
        };
        channel.iter().map(|(_, l)| Arc::clone(l)).collect()
    }

    fn next_id(&mut self) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        id
    }

    fn remove(&mut self, id: ListenerId) -> bool {
        fn drop_id<T>(channel: &mut Vec<(ListenerId, T)>, id: ListenerId) -> bool {
            let before = channel.len();
            channel.retain(|(existing, _)| *existing != id);
            channel.len() != before
        }
        drop_id(&mut self.started, id)
            || drop_id(&mut self.completed, id)
            || drop_id(&mut self.failed, id)
            || drop_id(&mut self.resolution_started, id)
            || drop_id(&mut self.resolution_completed, id)
    }
}

/// What to do with the current command after one iteration.
enum Advance {
    /// Keep it in the current slot.
    Retain { proceed: bool },
    /// Drop it; its final notification has fired.
    Release { proceed: bool },
}

/// Resets the resolving flag even if a pass unwinds.
struct ResolveGuard<'a>(&'a AtomicBool);

impl Drop for ResolveGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Cooperative FIFO command queue driven by external ticks.
///
/// All methods take `&self`; the queue is usually shared as
/// `Arc<CommandQueue>` between the code that enqueues and the tick driver.
/// It is `Send + Sync`, but the algorithm assumes one logical tick driver.
pub struct CommandQueue {
    name: String,
    budget: AtomicUsize,
    max_history: usize,
    pending: Mutex<VecDeque<QueuedCommand>>,
    current: Mutex<Option<QueuedCommand>>,
    history: Mutex<VecDeque<HistoryEntry>>,
    listeners: Mutex<Listeners>,
    resolving: AtomicBool,
    /// Bumped by `clear` so an in-flight command can be dropped silently.
    generation: AtomicU64,
    fault_sink: Option<Arc<dyn FaultSink>>,
}

impl CommandQueue {
    /// Create an empty queue with the default budget and history length.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            budget: AtomicUsize::new(DEFAULT_BUDGET),
            max_history: DEFAULT_MAX_HISTORY,
            pending: Mutex::new(VecDeque::new()),
            current: Mutex::new(None),
            history: Mutex::new(VecDeque::new()),
            listeners: Mutex::new(Listeners::default()),
            resolving: AtomicBool::new(false),
            generation: AtomicU64::new(0),
            fault_sink: None,
        }
    }

    /// Set the per-resolve iteration budget.
    #[must_use]
    pub fn with_budget(self, budget: usize) -> Self {
        self.budget.store(budget, Ordering::Release);
        self
    }

    /// Set how many finished commands the history keeps.
    #[must_use]
    pub fn with_max_history(mut self, max_history: usize) -> Self {
        self.max_history = max_history;
        self
    }

    /// Attach a fault sink.
    #[must_use]
    pub fn with_fault_sink(mut self, sink: Arc<dyn FaultSink>) -> Self {
        self.fault_sink = Some(sink);
        self
    }

    /// Queue name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Iterations allowed per resolve call.
    #[must_use]
    pub fn budget(&self) -> usize {
        self.budget.load(Ordering::Acquire)
    }

    /// Change the budget; takes effect on the next resolve call.
    /// A budget of 0 pauses the queue.
    pub fn set_budget(&self, budget: usize) {
        self.budget.store(budget, Ordering::Release);
    }

    /// Number of pending commands, not counting the current slot.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    /// Whether nothing is pending and the current slot is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.lock().is_empty() && self.current.lock().is_none()
    }

    /// Whether the current slot is occupied.
    ///
    /// While a resolve is running, the command being advanced is held by the
    /// pass itself, so listeners observe an empty slot.
    #[must_use]
    pub fn has_current(&self) -> bool {
        self.current.lock().is_some()
    }

    /// Status of the command in the current slot.
    ///
    /// `None` when the slot is empty or the command's `status` panicked; the
    /// panic is reported as a warning.
    #[must_use]
    pub fn current_status(&self) -> Option<CommandStatus> {
        let read = {
            let current = self.current.lock();
            let entry = current.as_ref()?;
            let read = catch_unwind(AssertUnwindSafe(|| entry.command.status()))
                .map_err(|payload| (entry.name.clone(), panic_message(payload.as_ref())));
            read
        };
        match read {
            Ok(status) => Some(status),
            Err((command, cause)) => {
                self.report(
                    FaultSeverity::Warning,
                    "inspection",
                    format!("status of `{command}` panicked during inspection"),
                    Some(cause),
                );
                None
            }
        }
    }

    /// Most recent finished commands, oldest first.
    #[must_use]
    pub fn history(&self) -> Vec<HistoryEntry> {
        self.history.lock().iter().cloned().collect()
    }

    /// Point-in-time view for diagnostics.
    #[must_use]
    pub fn snapshot(&self) -> QueueSnapshot {
        QueueSnapshot {
            name: self.name.clone(),
            pending: self.len(),
            has_current: self.has_current(),
            current_status: self.current_status(),
            budget: self.budget(),
            history_len: self.history.lock().len(),
        }
    }

    /// Append a command to the tail of the queue.
    pub fn enqueue<C: Command + 'static>(&self, command: C) -> CommandId {
        self.enqueue_with_callbacks(command, CommandCallbacks::default())
    }

    /// Append a command together with its per-command callbacks.
    pub fn enqueue_with_callbacks<C: Command + 'static>(
        &self,
        command: C,
        callbacks: CommandCallbacks,
    ) -> CommandId {
        let id = Uuid::new_v4();
        let name = command.name().to_string();
        tracing::debug!(queue = %self.name, command = %name, %id, "command enqueued");
        self.pending.lock().push_back(QueuedCommand {
            id,
            name,
            command: Box::new(command),
            callbacks,
            armed: true,
        });
        id
    }

    /// Append several commands, preserving iteration order.
    pub fn enqueue_many<I>(&self, commands: I) -> Vec<CommandId>
    where
        I: IntoIterator,
        I::Item: Command + 'static,
    {
        commands.into_iter().map(|c| self.enqueue(c)).collect()
    }

    /// Register a listener on the started channel.
    pub fn on_started<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&CommandEvent) -> AppResult<()> + Send + Sync + 'static,
    {
        self.add_listener(CommandEventKind::Started, Arc::new(listener))
    }

    /// Register a listener on the completed channel.
    pub fn on_completed<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&CommandEvent) -> AppResult<()> + Send + Sync + 'static,
    {
        self.add_listener(CommandEventKind::Completed, Arc::new(listener))
    }

    /// Register a listener on the failed channel.
    pub fn on_failed<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&CommandEvent) -> AppResult<()> + Send + Sync + 'static,
    {
        self.add_listener(CommandEventKind::Failed, Arc::new(listener))
    }

    /// Register a listener fired at the start of every resolve pass.
    pub fn on_resolution_started<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&str) -> AppResult<()> + Send + Sync + 'static,
    {
        let mut listeners = self.listeners.lock();
        let id = listeners.next_id();
        listeners.resolution_started.push((id, Arc::new(listener)));
        id
    }

    /// Register a listener fired at the end of every resolve pass with its
    /// summary.
    pub fn on_resolution_completed<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&str, &ResolveSummary) -> AppResult<()> + Send + Sync + 'static,
    {
        let mut listeners = self.listeners.lock();
        let id = listeners.next_id();
        listeners.resolution_completed.push((id, Arc::new(listener)));
        id
    }

    /// Remove a listener from whichever channel holds it.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.listeners.lock().remove(id)
    }

    fn add_listener(&self, kind: CommandEventKind, listener: Listener) -> ListenerId {
        let mut listeners = self.listeners.lock();
        let id = listeners.next_id();
        listeners.channel_mut(kind).push((id, listener));
        id
    }

    /// Discard every pending command and the current slot without notifying.
    ///
    /// This is a hard reset, not a cancellation: no completed or failed
    /// notification is emitted for discarded work. Returns how many commands
    /// were discarded. Called from a callback during `resolve`, it also drops
    /// the command being advanced and ends that pass.
    pub fn clear(&self) -> usize {
        self.generation.fetch_add(1, Ordering::AcqRel);
        let pending = std::mem::take(&mut *self.pending.lock());
        let current = self.current.lock().take();
        let discarded = pending.len() + usize::from(current.is_some());
        drop(pending);
        drop(current);
        tracing::debug!(queue = %self.name, discarded, "queue cleared");
        discarded
    }

    /// Run one bounded resolution pass.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError::ResolveInProgress`] when called while this queue
    /// is already resolving (for example from one of its own callbacks).
    pub fn resolve(&self) -> Result<ResolveSummary, CommandError> {
        if self.resolving.swap(true, Ordering::AcqRel) {
            tracing::warn!(queue = %self.name, "re-entrant resolve rejected");
            return Err(CommandError::ResolveInProgress(self.name.clone()));
        }
        let _guard = ResolveGuard(&self.resolving);
        self.notify_resolution_started();

        let budget = self.budget();
        let mut summary = ResolveSummary::default();
        let mut should_continue = true;

        while should_continue && summary.iterations < budget {
            let generation = self.generation.load(Ordering::Acquire);
            let Some(mut entry) = self.take_current() else {
                break;
            };
            summary.iterations += 1;

            let (retain, proceed) = match self.advance(&mut entry, &mut summary) {
                Advance::Retain { proceed } => (true, proceed),
                Advance::Release { proceed } => (false, proceed),
            };

            let cleared = self.generation.load(Ordering::Acquire) != generation;
            if retain && !cleared {
                *self.current.lock() = Some(entry);
            } else {
                drop(entry);
            }
            should_continue = proceed && !cleared;
        }

        summary.budget_exhausted =
            should_continue && summary.iterations >= budget && !self.is_empty();
        if summary.iterations > 0 {
            tracing::debug!(
                queue = %self.name,
                iterations = summary.iterations,
                started = summary.started,
                completed = summary.completed,
                failed = summary.failed,
                blocked = summary.blocked,
                "resolve pass finished"
            );
        }
        self.notify_resolution_completed(&summary);
        Ok(summary)
    }

    fn take_current(&self) -> Option<QueuedCommand> {
        let current = self.current.lock().take();
        current.or_else(|| self.pending.lock().pop_front())
    }

    fn advance(&self, entry: &mut QueuedCommand, summary: &mut ResolveSummary) -> Advance {
        let status = match catch_unwind(AssertUnwindSafe(|| entry.command.status())) {
            Ok(status) => status,
            Err(payload) => {
                let error = CommandError::Panicked(format!(
                    "status of `{}`: {}",
                    entry.name,
                    panic_message(payload.as_ref())
                ));
                self.fail_faulted(entry, &error, summary);
                return Advance::Release { proceed: false };
            }
        };

        match status {
            CommandStatus::Ready if entry.armed => {
                entry.armed = false;
                summary.started += 1;
                tracing::debug!(queue = %self.name, command = %entry.name, "command started");
                let generation = self.generation.load(Ordering::Acquire);
                self.notify(entry, CommandEventKind::Started, None);
                if self.generation.load(Ordering::Acquire) != generation {
                    tracing::debug!(queue = %self.name, command = %entry.name, "cleared before execute");
                    return Advance::Release { proceed: false };
                }

                match catch_unwind(AssertUnwindSafe(|| entry.command.execute())) {
                    Ok(Ok(())) => Advance::Retain { proceed: true },
                    Ok(Err(err)) => {
                        let error = CommandError::Execution {
                            command: entry.name.clone(),
                            reason: format!("{err:#}"),
                        };
                        self.fail_faulted(entry, &error, summary);
                        Advance::Release { proceed: false }
                    }
                    Err(payload) => {
                        let error = CommandError::Panicked(format!(
                            "execute of `{}`: {}",
                            entry.name,
                            panic_message(payload.as_ref())
                        ));
                        self.fail_faulted(entry, &error, summary);
                        Advance::Release { proceed: false }
                    }
                }
            }
            // Executed already and has not left Ready yet.
            CommandStatus::Ready => {
                summary.blocked = true;
                Advance::Retain { proceed: false }
            }
            CommandStatus::NotReady | CommandStatus::Executing => {
                entry.armed = true;
                summary.blocked = true;
                Advance::Retain { proceed: false }
            }
            CommandStatus::Completed => {
                summary.completed += 1;
                tracing::debug!(queue = %self.name, command = %entry.name, "command completed");
                self.notify(entry, CommandEventKind::Completed, None);
                self.push_history(entry, CommandEventKind::Completed, None);
                Advance::Release { proceed: true }
            }
            CommandStatus::Failed => {
                summary.failed += 1;
                let lookup = catch_unwind(AssertUnwindSafe(|| entry.command.failure_reason()));
                let reason = match lookup {
                    Ok(reason) => reason,
                    Err(payload) => {
                        self.report(
                            FaultSeverity::Warning,
                            "execution",
                            format!("failure reason of `{}` panicked", entry.name),
                            Some(panic_message(payload.as_ref())),
                        );
                        None
                    }
                };
                tracing::debug!(queue = %self.name, command = %entry.name, ?reason, "command failed");
                self.notify(entry, CommandEventKind::Failed, reason.clone());
                self.push_history(entry, CommandEventKind::Failed, reason);
                Advance::Release { proceed: true }
            }
        }
    }

    fn fail_faulted(
        &self,
        entry: &mut QueuedCommand,
        error: &CommandError,
        summary: &mut ResolveSummary,
    ) {
        summary.failed += 1;
        self.report(
            FaultSeverity::Error,
            "execution",
            format!("command `{}` faulted", entry.name),
            Some(error.to_string()),
        );
        let reason = Some(error.to_string());
        self.notify(entry, CommandEventKind::Failed, reason.clone());
        self.push_history(entry, CommandEventKind::Failed, reason);
    }

    /// Fire queue listeners, then the command's own callback.
    fn notify(&self, entry: &mut QueuedCommand, kind: CommandEventKind, reason: Option<String>) {
        let event = CommandEvent {
            queue: self.name.clone(),
            command_id: entry.id,
            command_name: entry.name.clone(),
            kind,
            reason,
        };

        let describe = |origin: &str| {
            format!("{origin} for {:?} of `{}` faulted", event.kind, event.command_name)
        };
        let listeners = self.listeners.lock().snapshot(kind);
        for listener in listeners {
            self.guard_callback(|| describe("queue listener"), || listener(&event));
        }
        if let Some(callback) = entry.callbacks.slot_mut(kind) {
            self.guard_callback(|| describe("command callback"), || callback(&event));
        }
    }

    fn notify_resolution_started(&self) {
        let listeners: Vec<_> = {
            let listeners = self.listeners.lock();
            listeners.resolution_started.iter().map(|(_, l)| Arc::clone(l)).collect()
        };
        for listener in listeners {
            self.guard_callback(
                || "resolution-started listener faulted".to_string(),
                || listener(&self.name),
            );
        }
    }

    fn notify_resolution_completed(&self, summary: &ResolveSummary) {
        let listeners: Vec<_> = {
            let listeners = self.listeners.lock();
            listeners.resolution_completed.iter().map(|(_, l)| Arc::clone(l)).collect()
        };
        for listener in listeners {
            self.guard_callback(
                || "resolution-completed listener faulted".to_string(),
                || listener(&self.name, summary),
            );
        }
    }

    fn guard_callback<D, F>(&self, describe: D, callback: F)
    where
        D: FnOnce() -> String,
        F: FnOnce() -> AppResult<()>,
    {
        let cause = match catch_unwind(AssertUnwindSafe(callback)) {
            Ok(Ok(())) => return,
            Ok(Err(err)) => format!("{err:#}"),
            Err(payload) => format!("panicked: {}", panic_message(payload.as_ref())),
        };
        self.report(FaultSeverity::Warning, "notification", describe(), Some(cause));
    }

    fn push_history(&self, entry: &QueuedCommand, outcome: CommandEventKind, reason: Option<String>) {
        if self.max_history == 0 {
            return;
        }
        let mut history = self.history.lock();
        while history.len() >= self.max_history {
            history.pop_front();
        }
        history.push_back(HistoryEntry {
            command_id: entry.id,
            command_name: entry.name.clone(),
            outcome,
            reason,
            finished_at_ms: now_ms(),
        });
    }

    fn report(&self, severity: FaultSeverity, category: &str, message: String, cause: Option<String>) {
        let shown = cause.as_deref().unwrap_or("-");
        match severity {
            FaultSeverity::Error => {
                tracing::error!(queue = %self.name, category, cause = shown, "{message}");
            }
            FaultSeverity::Warning => {
                tracing::warn!(queue = %self.name, category, cause = shown, "{message}");
            }
            FaultSeverity::Info => {
                tracing::info!(queue = %self.name, category, cause = shown, "{message}");
            }
        }
        if let Some(sink) = &self.fault_sink {
            sink.record(build_fault_event(severity, &self.name, category, message, cause));
        }
    }
}

impl ResolveCommands for CommandQueue {
    fn name(&self) -> &str {
        Self::name(self)
    }

    fn resolve(&self) -> Result<ResolveSummary, CommandError> {
        Self::resolve(self)
    }

    fn clear(&self) -> usize {
        Self::clear(self)
    }

    fn snapshot(&self) -> QueueSnapshot {
        Self::snapshot(self)
    }
}

impl fmt::Debug for CommandQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandQueue")
            .field("name", &self.name)
            .field("budget", &self.budget())
            .field("max_history", &self.max_history)
            .field("pending", &self.len())
            .field("has_current", &self.has_current())
            .finish_non_exhaustive()
    }
}
