//! Queue and scheduler configuration structures.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::core::{DEFAULT_BUDGET, DEFAULT_MAX_HISTORY};

/// Environment variable overriding [`QueueConfig::budget`].
pub const BUDGET_ENV: &str = "COMMAND_QUEUE_BUDGET";
/// Environment variable overriding [`QueueConfig::max_history`].
pub const MAX_HISTORY_ENV: &str = "COMMAND_QUEUE_MAX_HISTORY";

const fn default_budget() -> usize {
    DEFAULT_BUDGET
}

const fn default_max_history() -> usize {
    DEFAULT_MAX_HISTORY
}

/// Queue configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Resolution iterations allowed per resolve call.
    #[serde(default = "default_budget")]
    pub budget: usize,
    /// Finished commands kept in history.
    #[serde(default = "default_max_history")]
    pub max_history: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            budget: DEFAULT_BUDGET,
            max_history: DEFAULT_MAX_HISTORY,
        }
    }
}

/// Root scheduler configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Map of queue name to configuration.
    pub queues: HashMap<String, QueueConfig>,
}

impl QueueConfig {
    /// Validate queue configuration values.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid value.
    pub fn validate(&self) -> Result<(), String> {
        if self.budget == 0 {
            return Err("budget must be greater than 0".into());
        }
        Ok(())
    }

    /// Build from the environment, loading a `.env` file first if present.
    ///
    /// Unset variables keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is not a number or the result is invalid.
    pub fn from_env() -> Result<Self, String> {
        let _ = dotenvy::dotenv();
        let mut cfg = Self::default();
        if let Some(budget) = read_usize(BUDGET_ENV)? {
            cfg.budget = budget;
        }
        if let Some(max_history) = read_usize(MAX_HISTORY_ENV)? {
            cfg.max_history = max_history;
        }
        cfg.validate()?;
        Ok(cfg)
    }
}

fn read_usize(key: &str) -> Result<Option<usize>, String> {
    match dotenvy::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| format!("{key}={raw:?} is not a valid count: {e}")),
        Err(_) => Ok(None),
    }
}

impl SchedulerConfig {
    /// Validate all queues and ensure at least one queue exists.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid queue.
    pub fn validate(&self) -> Result<(), String> {
        if self.queues.is_empty() {
            return Err("at least one queue must be defined".into());
        }
        for (name, queue) in &self.queues {
            queue
                .validate()
                .map_err(|e| format!("queue `{name}` invalid: {e}"))?;
        }
        Ok(())
    }

    /// Parse scheduler configuration from a JSON string and validate.
    ///
    /// # Errors
    ///
    /// Returns an error on malformed JSON or invalid values.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }
}
