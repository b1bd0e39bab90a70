//! Registry that fans `resolve` and `clear` out to every active queue.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;
use serde::Serialize;

use crate::core::error::panic_message;
use crate::core::{CommandError, ResolveSummary};
use crate::runtime::api::{ManagerSnapshot, QueueSnapshot};

/// Anything the manager can drive once per tick.
///
/// [`CommandQueue`](crate::core::CommandQueue) is the stock implementation.
pub trait ResolveCommands: Send + Sync {
    /// Name used for registration and reporting.
    fn name(&self) -> &str;

    /// Run one bounded resolution pass.
    ///
    /// # Errors
    ///
    /// Implementation-specific; the manager reports and isolates it.
    fn resolve(&self) -> Result<ResolveSummary, CommandError>;

    /// Silently discard all queued work, returning how much was dropped.
    fn clear(&self) -> usize;

    /// Point-in-time view for diagnostics.
    fn snapshot(&self) -> QueueSnapshot;
}

/// Per-queue result of a successful resolve.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueueResolution {
    /// Queue name.
    pub queue: String,
    /// What the pass did.
    pub summary: ResolveSummary,
}

/// Per-queue failure isolated during `resolve_all`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueFailure {
    /// Queue name.
    pub queue: String,
    /// What went wrong.
    pub error: CommandError,
}

/// Aggregate outcome of [`CommandManager::resolve_all`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolveAllReport {
    /// Queues resolved successfully, in registration order.
    pub resolved: Vec<QueueResolution>,
    /// Queues whose resolve returned an error or panicked.
    pub failures: Vec<QueueFailure>,
}

impl ResolveAllReport {
    /// Whether every queue resolved without error.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.failures.is_empty()
    }

    /// Iterations consumed across all queues.
    #[must_use]
    pub fn total_iterations(&self) -> usize {
        self.resolved.iter().map(|r| r.summary.iterations).sum()
    }

    /// Summary for a given queue, if it resolved.
    #[must_use]
    pub fn summary_for(&self, queue: &str) -> Option<&ResolveSummary> {
        self.resolved
            .iter()
            .find(|r| r.queue == queue)
            .map(|r| &r.summary)
    }
}

/// Registry of active queues.
///
/// Registration is explicit. A queue is identified by pointer identity and
/// by name; registering the same queue twice, or two queues under one name,
/// returns [`CommandError::AlreadyRegistered`]. Unregistering an unknown queue
/// returns [`CommandError::NotRegistered`]. Neither error changes the registry.
///
/// The queue list is copied before each fan-out, so callbacks running inside
/// `resolve_all` may register, unregister, or enqueue freely.
#[derive(Default)]
pub struct CommandManager {
    queues: RwLock<Vec<Arc<dyn ResolveCommands>>>,
}

impl CommandManager {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide registry, created on first use.
    pub fn global() -> &'static Self {
        static GLOBAL: OnceLock<CommandManager> = OnceLock::new();
        GLOBAL.get_or_init(Self::new)
    }

    /// Start tracking a queue.
    ///
    /// # Errors
    ///
    /// [`CommandError::AlreadyRegistered`] if the queue, or another queue with
    /// the same name, is already tracked.
    pub fn register(&self, queue: Arc<dyn ResolveCommands>) -> Result<(), CommandError> {
        let mut queues = self.queues.write();
        if queues
            .iter()
            .any(|existing| Arc::ptr_eq(existing, &queue) || existing.name() == queue.name())
        {
            tracing::warn!(queue = %queue.name(), "duplicate queue registration rejected");
            return Err(CommandError::AlreadyRegistered(queue.name().to_string()));
        }
        tracing::info!(queue = %queue.name(), "queue registered");
        queues.push(queue);
        Ok(())
    }

    /// Stop tracking a queue, matched by identity.
    ///
    /// # Errors
    ///
    /// [`CommandError::NotRegistered`] if the queue is not tracked.
    pub fn unregister(&self, queue: &dyn ResolveCommands) -> Result<(), CommandError> {
        let target = std::ptr::from_ref(queue);
        let mut queues = self.queues.write();
        let Some(index) = queues
            .iter()
            .position(|existing| std::ptr::addr_eq(Arc::as_ptr(existing), target))
        else {
            return Err(CommandError::NotRegistered(queue.name().to_string()));
        };
        queues.remove(index);
        tracing::info!(queue = %queue.name(), "queue unregistered");
        Ok(())
    }

    /// Stop tracking the queue registered under `name`, returning it.
    ///
    /// # Errors
    ///
    /// [`CommandError::NotRegistered`] if no queue has that name.
    pub fn unregister_by_name(&self, name: &str) -> Result<Arc<dyn ResolveCommands>, CommandError> {
        let mut queues = self.queues.write();
        let Some(index) = queues.iter().position(|q| q.name() == name) else {
            return Err(CommandError::NotRegistered(name.to_string()));
        };
        tracing::info!(queue = %name, "queue unregistered");
        Ok(queues.remove(index))
    }

    /// Queue registered under `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn ResolveCommands>> {
        self.queues.read().iter().find(|q| q.name() == name).cloned()
    }

    /// Names of registered queues, in registration order.
    #[must_use]
    pub fn queue_names(&self) -> Vec<String> {
        self.queues.read().iter().map(|q| q.name().to_string()).collect()
    }

    /// Number of registered queues.
    #[must_use]
    pub fn len(&self) -> usize {
        self.queues.read().len()
    }

    /// Whether no queue is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queues.read().is_empty()
    }

    /// Resolve every registered queue once, in registration order.
    ///
    /// A failing or panicking queue does not stop the others; its error is
    /// collected into the report and logged after the pass.
    pub fn resolve_all(&self) -> ResolveAllReport {
        let queues = self.queues.read().clone();
        let mut report = ResolveAllReport::default();

        for queue in &queues {
            let name = queue.name().to_string();
            match catch_unwind(AssertUnwindSafe(|| queue.resolve())) {
                Ok(Ok(summary)) => report.resolved.push(QueueResolution {
                    queue: name,
                    summary,
                }),
                Ok(Err(error)) => report.failures.push(QueueFailure { queue: name, error }),
                Err(payload) => {
                    let error = CommandError::Panicked(format!(
                        "resolve of queue `{name}`: {}",
                        panic_message(payload.as_ref())
                    ));
                    report.failures.push(QueueFailure { queue: name, error });
                }
            }
        }

        for failure in &report.failures {
            tracing::error!(queue = %failure.queue, error = %failure.error, "queue resolve failed");
        }
        report
    }

    /// Clear every registered queue, returning the total discarded.
    pub fn clear_all(&self) -> usize {
        let queues = self.queues.read().clone();
        let discarded: usize = queues.iter().map(|q| q.clear()).sum();
        tracing::debug!(queues = queues.len(), discarded, "all queues cleared");
        discarded
    }

    /// Snapshot of every registered queue.
    #[must_use]
    pub fn snapshot(&self) -> ManagerSnapshot {
        let queues = self.queues.read().clone();
        ManagerSnapshot {
            queues: queues.iter().map(|q| q.snapshot()).collect(),
        }
    }
}

impl std::fmt::Debug for CommandManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandManager")
            .field("queues", &self.queue_names())
            .finish()
    }
}
