//! Command contract, lifecycle status, and closure-backed command helpers.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::AppResult;

/// Identifier assigned by a queue when a command is enqueued.
pub type CommandId = Uuid;

/// Lifecycle status of a command as observed by its queue.
///
/// The queue reacts to `Ready`, `Completed` and `Failed`. `NotReady` and
/// `Executing` pause the queue without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandStatus {
    /// Waiting on external state before it can run.
    NotReady,
    /// Eligible to be executed by the queue.
    Ready,
    /// Work has been kicked off and has not finished yet.
    Executing,
    /// Work finished successfully.
    Completed,
    /// Work finished with a failure.
    Failed,
}

impl CommandStatus {
    /// Whether the status is a final outcome.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        match self {
            Self::Completed | Self::Failed => true,
            Self::NotReady | Self::Ready | Self::Executing => false,
        }
    }

    const fn to_u8(self) -> u8 {
        match self {
            Self::NotReady => 0,
            Self::Ready => 1,
            Self::Executing => 2,
            Self::Completed => 3,
            Self::Failed => 4,
        }
    }

    const fn from_u8(raw: u8) -> Self {
        match raw {
            1 => Self::Ready,
            2 => Self::Executing,
            3 => Self::Completed,
            4 => Self::Failed,
            _ => Self::NotReady,
        }
    }
}

impl fmt::Display for CommandStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::NotReady => "not_ready",
            Self::Ready => "ready",
            Self::Executing => "executing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// A unit of deferred work driven by a [`CommandQueue`](crate::core::CommandQueue).
///
/// The command owns its status. The queue only reads it through [`Command::status`]
/// and calls [`Command::execute`] once per observed entry into `Ready`. After
/// `execute` the command must eventually report `Completed` or `Failed`, possibly
/// many ticks later; a command that never does blocks its queue.
///
/// # Example
///
/// ```rust
/// use prometheus_command_queue::core::{AppResult, Command, CommandStatus};
///
/// struct Ping {
///     status: CommandStatus,
/// }
///
/// impl Command for Ping {
///     fn status(&self) -> CommandStatus {
///         self.status
///     }
///
///     fn execute(&mut self) -> AppResult<()> {
///         self.status = CommandStatus::Completed;
///         Ok(())
///     }
/// }
/// ```
pub trait Command: Send {
    /// Current lifecycle status.
    fn status(&self) -> CommandStatus;

    /// Begin the command's work.
    ///
    /// May finish the work synchronously or only kick it off. Returning an
    /// error is treated as an execution fault: the command is failed and
    /// discarded by its queue.
    ///
    /// # Errors
    ///
    /// Any error raised while starting the work.
    fn execute(&mut self) -> AppResult<()>;

    /// Human-readable name used in events and logs.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Reason attached to the failed notification when status is `Failed`.
    fn failure_reason(&self) -> Option<String> {
        None
    }
}

impl<C: Command + ?Sized> Command for Box<C> {
    fn status(&self) -> CommandStatus {
        (**self).status()
    }

    fn execute(&mut self) -> AppResult<()> {
        (**self).execute()
    }

    fn name(&self) -> &str {
        (**self).name()
    }

    fn failure_reason(&self) -> Option<String> {
        (**self).failure_reason()
    }
}

/// A command that needs externally supplied data before it can run.
///
/// The context is set before enqueue.
pub trait ContextualCommand: Command {
    /// Data the command body consumes.
    type Context;

    /// Supply the context.
    fn set_context(&mut self, context: Self::Context);

    /// Context supplied so far, if any.
    fn context(&self) -> Option<&Self::Context>;

    /// Builder-style [`ContextualCommand::set_context`].
    #[must_use]
    fn with_context(mut self, context: Self::Context) -> Self
    where
        Self: Sized,
    {
        self.set_context(context);
        self
    }
}

/// Shared, thread-safe status cell.
///
/// Commands whose work finishes elsewhere (another thread, an async task)
/// hand a clone to that work and report status from it.
#[derive(Debug, Clone)]
pub struct StatusHandle {
    inner: Arc<AtomicU8>,
}

impl StatusHandle {
    /// Create a handle holding `initial`.
    #[must_use]
    pub fn new(initial: CommandStatus) -> Self {
        Self {
            inner: Arc::new(AtomicU8::new(initial.to_u8())),
        }
    }

    /// Read the current status.
    #[must_use]
    pub fn get(&self) -> CommandStatus {
        CommandStatus::from_u8(self.inner.load(Ordering::Acquire))
    }

    /// Overwrite the status.
    pub fn set(&self, status: CommandStatus) {
        self.inner.store(status.to_u8(), Ordering::Release);
    }
}

impl Default for StatusHandle {
    fn default() -> Self {
        Self::new(CommandStatus::NotReady)
    }
}

type Body = Box<dyn FnMut() -> AppResult<()> + Send>;
type ContextBody<C> = Box<dyn FnMut(&C) -> AppResult<()> + Send>;

/// Closure-backed command that runs synchronously inside `execute`.
///
/// Starts `Ready`; lands on `Completed` when the closure returns `Ok` and on
/// `Failed` (keeping the error text) when it returns `Err`.
pub struct FnCommand {
    name: String,
    status: CommandStatus,
    body: Body,
    failure: Option<String>,
}

impl FnCommand {
    /// Create a ready command from a closure.
    pub fn new<F>(name: impl Into<String>, body: F) -> Self
    where
        F: FnMut() -> AppResult<()> + Send + 'static,
    {
        Self {
            name: name.into(),
            status: CommandStatus::Ready,
            body: Box::new(body),
            failure: None,
        }
    }
}

impl Command for FnCommand {
    fn status(&self) -> CommandStatus {
        self.status
    }

    fn execute(&mut self) -> AppResult<()> {
        self.status = CommandStatus::Executing;
        match (self.body)() {
            Ok(()) => self.status = CommandStatus::Completed,
            Err(err) => {
                self.failure = Some(format!("{err:#}"));
                self.status = CommandStatus::Failed;
            }
        }
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn failure_reason(&self) -> Option<String> {
        self.failure.clone()
    }
}

impl fmt::Debug for FnCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnCommand")
            .field("name", &self.name)
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

/// Closure-backed contextual command.
///
/// Reports `NotReady` until a context is supplied, then behaves like
/// [`FnCommand`] with the context passed to the closure.
pub struct ContextCommand<C> {
    name: String,
    status: CommandStatus,
    context: Option<C>,
    body: ContextBody<C>,
    failure: Option<String>,
}

impl<C: Send + 'static> ContextCommand<C> {
    /// Create a command waiting for its context.
    pub fn new<F>(name: impl Into<String>, body: F) -> Self
    where
        F: FnMut(&C) -> AppResult<()> + Send + 'static,
    {
        Self {
            name: name.into(),
            status: CommandStatus::NotReady,
            context: None,
            body: Box::new(body),
            failure: None,
        }
    }
}

impl<C: Send + 'static> Command for ContextCommand<C> {
    fn status(&self) -> CommandStatus {
        self.status
    }

    fn execute(&mut self) -> AppResult<()> {
        let Some(context) = self.context.as_ref() else {
            anyhow::bail!("context for `{}` was never supplied", self.name);
        };
        self.status = CommandStatus::Executing;
        match (self.body)(context) {
            Ok(()) => self.status = CommandStatus::Completed,
            Err(err) => {
                self.failure = Some(format!("{err:#}"));
                self.status = CommandStatus::Failed;
            }
        }
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn failure_reason(&self) -> Option<String> {
        self.failure.clone()
    }
}

impl<C: Send + 'static> ContextualCommand for ContextCommand<C> {
    type Context = C;

    fn set_context(&mut self, context: C) {
        self.context = Some(context);
        if self.status == CommandStatus::NotReady {
            self.status = CommandStatus::Ready;
        }
    }

    fn context(&self) -> Option<&C> {
        self.context.as_ref()
    }
}

impl<C> fmt::Debug for ContextCommand<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextCommand")
            .field("name", &self.name)
            .field("status", &self.status)
            .field("has_context", &self.context.is_some())
            .finish_non_exhaustive()
    }
}

/// Which notification channel an event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandEventKind {
    /// The queue is about to execute the command.
    Started,
    /// The command reached `Completed`.
    Completed,
    /// The command reached `Failed` or faulted.
    Failed,
}

/// Notification payload delivered to queue listeners and command callbacks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandEvent {
    /// Name of the queue firing the event.
    pub queue: String,
    /// Identifier assigned at enqueue.
    pub command_id: CommandId,
    /// Command name.
    pub command_name: String,
    /// Channel.
    pub kind: CommandEventKind,
    /// Failure reason, if any.
    pub reason: Option<String>,
}

/// Per-command notification callback.
pub type CommandCallback = Box<dyn FnMut(&CommandEvent) -> AppResult<()> + Send>;

/// The three optional per-command callback slots.
///
/// Attached at enqueue and invoked by the owning queue right after the
/// queue-level listeners of the same channel.
#[derive(Default)]
pub struct CommandCallbacks {
    on_started: Option<CommandCallback>,
    on_completed: Option<CommandCallback>,
    on_failed: Option<CommandCallback>,
}

impl CommandCallbacks {
    /// Empty callback set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the started callback.
    #[must_use]
    pub fn on_started<F>(mut self, callback: F) -> Self
    where
        F: FnMut(&CommandEvent) -> AppResult<()> + Send + 'static,
    {
        self.on_started = Some(Box::new(callback));
        self
    }

    /// Set the completed callback.
    #[must_use]
    pub fn on_completed<F>(mut self, callback: F) -> Self
    where
        F: FnMut(&CommandEvent) -> AppResult<()> + Send + 'static,
    {
        self.on_completed = Some(Box::new(callback));
        self
    }

    /// Set the failed callback.
    #[must_use]
    pub fn on_failed<F>(mut self, callback: F) -> Self
    where
        F: FnMut(&CommandEvent) -> AppResult<()> + Send + 'static,
    {
        self.on_failed = Some(Box::new(callback));
        self
    }

    pub(crate) fn slot_mut(&mut self, kind: CommandEventKind) -> Option<&mut CommandCallback> {
        match kind {
            CommandEventKind::Started => self.on_started.as_mut(),
            CommandEventKind::Completed => self.on_completed.as_mut(),
            CommandEventKind::Failed => self.on_failed.as_mut(),
        }
    }
}

impl fmt::Debug for CommandCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandCallbacks")
            .field("on_started", &self.on_started.is_some())
            .field("on_completed", &self.on_completed.is_some())
            .field("on_failed", &self.on_failed.is_some())
            .finish()
    }
}
