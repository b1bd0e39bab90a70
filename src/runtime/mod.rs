//! Runtime adapters and API surface.

pub mod api;
#[cfg(feature = "tokio-runtime")]
pub mod tokio_command;

pub use api::{ManagerSnapshot, QueueSnapshot};
#[cfg(feature = "tokio-runtime")]
pub use tokio_command::SpawnedCommand;
