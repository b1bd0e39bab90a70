/// Wall-clock helpers.
pub mod clock;
/// Tracing subscriber setup.
pub mod telemetry;

pub use clock::*;
pub use telemetry::*;
