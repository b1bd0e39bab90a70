//! Tokio-backed command whose work runs off the tick thread.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::core::{AppResult, Command, CommandStatus, StatusHandle};

type BoxedWork = Pin<Box<dyn Future<Output = AppResult<()>> + Send + 'static>>;

/// Command that spawns a future on a tokio runtime when executed.
///
/// Reports `Ready` until executed, `Executing` while the future runs, then
/// `Completed` or `Failed`. The queue never waits on the future; it re-reads
/// the status on later ticks.
pub struct SpawnedCommand {
    name: String,
    handle: tokio::runtime::Handle,
    work: Option<BoxedWork>,
    status: StatusHandle,
    failure: Arc<Mutex<Option<String>>>,
}

impl SpawnedCommand {
    /// Create a command that will spawn `work` on `handle`.
    pub fn new<F>(name: impl Into<String>, handle: tokio::runtime::Handle, work: F) -> Self
    where
        F: Future<Output = AppResult<()>> + Send + 'static,
    {
        Self {
            name: name.into(),
            handle,
            work: Some(Box::pin(work)),
            status: StatusHandle::new(CommandStatus::Ready),
            failure: Arc::new(Mutex::new(None)),
        }
    }

    /// Create a command bound to the runtime of the calling context.
    ///
    /// # Errors
    ///
    /// Returns an error when called outside a tokio runtime.
    pub fn on_current<F>(name: impl Into<String>, work: F) -> AppResult<Self>
    where
        F: Future<Output = AppResult<()>> + Send + 'static,
    {
        let handle = tokio::runtime::Handle::try_current()?;
        Ok(Self::new(name, handle, work))
    }
}

impl Command for SpawnedCommand {
    fn status(&self) -> CommandStatus {
        self.status.get()
    }

    fn execute(&mut self) -> AppResult<()> {
        let Some(work) = self.work.take() else {
            anyhow::bail!("`{}` was already spawned", self.name);
        };
        self.status.set(CommandStatus::Executing);

        let status = self.status.clone();
        let failure = Arc::clone(&self.failure);
        let name = self.name.clone();
        let join = self.handle.spawn(work);
        self.handle.spawn(async move {
            let outcome = match join.await {
                Ok(result) => result,
                Err(join_err) => Err(anyhow::anyhow!("task aborted: {join_err}")),
            };
            match outcome {
                Ok(()) => status.set(CommandStatus::Completed),
                Err(err) => {
                    tracing::debug!(command = %name, error = %err, "spawned work failed");
                    *failure.lock() = Some(format!("{err:#}"));
                    status.set(CommandStatus::Failed);
                }
            }
        });
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn failure_reason(&self) -> Option<String> {
        self.failure.lock().clone()
    }
}

impl fmt::Debug for SpawnedCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpawnedCommand")
            .field("name", &self.name)
            .field("status", &self.status.get())
            .finish_non_exhaustive()
    }
}
