//! # Pipeline
//!
//! Scan-cycle orchestration.
//!
//! Responsibilities:
//! - Idle / Armed session state machine
//! - One cycle: parse, drop malformed sightings, dispatch to sinks, fan out
//!   to observers
//! - Sequential command entry point for callers on other tasks
//!
//! ## Usage Example
//!
//! ```ignore
//! use pipeline::SightingPipeline;
//!
//! let pipeline = SightingPipeline::from_blueprint(&blueprint).await?;
//! let handle = pipeline.spawn();
//! handle.start_session().await?;
//! while let Ok(cycle) = scanner_rx.recv().await {
//!     handle.on_cycle(cycle).await?;
//! }
//! handle.shutdown().await?;
//! ```

mod error;
mod handle;
mod pipeline;

pub use contracts::{CycleReport, ScanCycle};
pub use error::{PipelineError, Result};
pub use handle::{COMMAND_CHANNEL_CAPACITY, PipelineCommand, PipelineHandle};
pub use pipeline::{PipelineState, PipelineStats, SightingPipeline};
