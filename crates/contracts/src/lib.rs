//! # Contracts
//!
//! Frozen interface contracts shared by every relay crate.
//! Business crates only depend on this crate, never on each other in reverse.
//!
//! ## Time Model
//! - Capture time (`DateTime<Utc>`) of a sighting is the clock for dedup
//! - The same instant is carried as an RFC 3339 string for the wire

mod blueprint;
mod error;
mod observer;
mod policy;
mod record;
mod report;
mod sighting;
mod sink;
mod sink_id;

pub use blueprint::*;
pub use error::*;
pub use observer::BeaconObserver;
pub use policy::*;
pub use record::*;
pub use report::CycleReport;
pub use sighting::*;
pub use sink::*;
pub use sink_id::SinkId;
