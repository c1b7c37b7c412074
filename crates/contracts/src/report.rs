//! CycleReport - what one scan cycle did

use serde::{Deserialize, Serialize};

/// Counters for one processed scan cycle
///
/// Produced only for cycles that arrive while a session is armed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleReport {
    /// Sequence number within the pipeline's lifetime, from 1
    pub cycle_id: u64,

    /// Region reported by the scanner
    pub region: String,

    /// Raw sightings in the batch
    pub received: usize,

    /// Sightings that became records
    pub parsed: usize,

    /// Sightings dropped as malformed
    pub rejected: usize,

    /// Sinks the records were offered to (0 when nothing parsed)
    pub dispatched_sinks: usize,

    /// Records queued for transmission, summed over sinks
    pub enqueued: usize,

    /// Records held back by a gate, summed over sinks
    pub suppressed: usize,

    /// Observers that received the batch
    pub notified_observers: usize,
}

impl CycleReport {
    /// True when no record survived parsing
    pub fn is_empty(&self) -> bool {
        self.parsed == 0
    }
}
