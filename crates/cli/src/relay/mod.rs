//! Relay run orchestration.

mod observer;
mod orchestrator;
mod stats;

pub use observer::LoggingObserver;
pub use orchestrator::{Relay, RelayConfig};
pub use stats::RunStats;
