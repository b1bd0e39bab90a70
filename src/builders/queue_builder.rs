//! Builders to construct command queues from configuration.

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::{QueueConfig, SchedulerConfig};
use crate::core::{CommandError, CommandManager, CommandQueue, FaultSink};

/// Builder for a single named queue.
#[derive(Clone)]
pub struct QueueBuilder {
    name: String,
    config: QueueConfig,
    fault_sink: Option<Arc<dyn FaultSink>>,
}

impl QueueBuilder {
    /// Start from a name and configuration.
    pub fn new(name: impl Into<String>, config: QueueConfig) -> Self {
        Self {
            name: name.into(),
            config,
            fault_sink: None,
        }
    }

    /// Queue name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Configuration the queue will be built with.
    #[must_use]
    pub const fn config(&self) -> &QueueConfig {
        &self.config
    }

    /// Route queue faults to `sink`.
    #[must_use]
    pub fn with_fault_sink(mut self, sink: Arc<dyn FaultSink>) -> Self {
        self.fault_sink = Some(sink);
        self
    }

    /// Validate the configuration and build the queue.
    ///
    /// # Errors
    ///
    /// [`CommandError::InvalidConfig`] if validation fails.
    pub fn build(self) -> Result<CommandQueue, CommandError> {
        self.config
            .validate()
            .map_err(|e| CommandError::InvalidConfig(format!("queue `{}`: {e}", self.name)))?;

        let queue = CommandQueue::new(self.name)
            .with_budget(self.config.budget)
            .with_max_history(self.config.max_history);
        Ok(match self.fault_sink {
            Some(sink) => queue.with_fault_sink(sink),
            None => queue,
        })
    }
}

/// Build every queue described by `cfg`.
///
/// # Errors
///
/// [`CommandError::InvalidConfig`] if the configuration does not validate.
pub fn build_queues(
    cfg: &SchedulerConfig,
    fault_sink: Option<Arc<dyn FaultSink>>,
) -> Result<HashMap<String, Arc<CommandQueue>>, CommandError> {
    cfg.validate().map_err(CommandError::InvalidConfig)?;

    let mut queues = HashMap::new();
    for (name, queue_cfg) in &cfg.queues {
        let mut builder = QueueBuilder::new(name.clone(), queue_cfg.clone());
        if let Some(sink) = &fault_sink {
            builder = builder.with_fault_sink(Arc::clone(sink));
        }
        queues.insert(name.clone(), Arc::new(builder.build()?));
    }
    Ok(queues)
}

/// Build every queue described by `cfg` and register it with `manager`.
///
/// Queues are registered in name order so fan-out order is deterministic.
/// Registration is all-or-nothing: on error, queues added by this call are
/// unregistered again and `manager` is left as it was.
///
/// # Errors
///
/// Configuration errors, or [`CommandError::AlreadyRegistered`] when a queue
/// name is already tracked by `manager`.
pub fn register_queues(
    manager: &CommandManager,
    cfg: &SchedulerConfig,
    fault_sink: Option<Arc<dyn FaultSink>>,
) -> Result<Vec<Arc<CommandQueue>>, CommandError> {
    let mut queues: Vec<_> = build_queues(cfg, fault_sink)?.into_values().collect();
    queues.sort_by(|a, b| a.name().cmp(b.name()));

    for (index, queue) in queues.iter().enumerate() {
        if let Err(err) = manager.register(queue.clone()) {
            for added in &queues[..index] {
                if let Err(rollback) = manager.unregister(&**added) {
                    tracing::warn!(queue = %added.name(), error = %rollback, "rollback unregister failed");
                }
            }
            tracing::warn!(error = %err, "queue registration rolled back");
            return Err(err);
        }
    }
    Ok(queues)
}
