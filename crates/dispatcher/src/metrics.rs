//! Per-sink and per-observer counters for reporting

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use crate::gate::GateDecision;

/// Metrics for a single sink
#[derive(Debug, Default)]
pub struct SinkMetrics {
    /// Current queue length
    queue_len: AtomicUsize,
    /// Records the gate let through
    accepted_count: AtomicU64,
    /// Records suppressed by recency
    throttled_count: AtomicU64,
    /// Records suppressed by policy mode
    rejected_count: AtomicU64,
    /// Successful transmissions
    transmit_count: AtomicU64,
    /// Failed transmissions
    failure_count: AtomicU64,
    /// Records dropped due to full queue
    dropped_count: AtomicU64,
}

impl SinkMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue_len(&self) -> usize {
        self.queue_len.load(Ordering::Relaxed)
    }

    pub fn set_queue_len(&self, len: usize) {
        self.queue_len.store(len, Ordering::Relaxed);
    }

    /// Count one gate outcome
    pub fn record_decision(&self, decision: GateDecision) {
        let counter = match decision {
            GateDecision::Send => &self.accepted_count,
            GateDecision::Throttled => &self.throttled_count,
            GateDecision::PolicyRejected => &self.rejected_count,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn transmit_count(&self) -> u64 {
        self.transmit_count.load(Ordering::Relaxed)
    }

    pub fn inc_transmit_count(&self) {
        self.transmit_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn failure_count(&self) -> u64 {
        self.failure_count.load(Ordering::Relaxed)
    }

    pub fn inc_failure_count(&self) {
        self.failure_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn dropped_count(&self) -> u64 {
        self.dropped_count.load(Ordering::Relaxed)
    }

    pub fn inc_dropped_count(&self) {
        self.dropped_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            queue_len: self.queue_len(),
            accepted_count: self.accepted_count.load(Ordering::Relaxed),
            throttled_count: self.throttled_count.load(Ordering::Relaxed),
            rejected_count: self.rejected_count.load(Ordering::Relaxed),
            transmit_count: self.transmit_count(),
            failure_count: self.failure_count(),
            dropped_count: self.dropped_count(),
        }
    }
}

/// Snapshot of sink metrics (for reporting)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub queue_len: usize,
    pub accepted_count: u64,
    pub throttled_count: u64,
    pub rejected_count: u64,
    pub transmit_count: u64,
    pub failure_count: u64,
    pub dropped_count: u64,
}

impl MetricsSnapshot {
    /// Records the gate held back for any reason
    pub fn suppressed_count(&self) -> u64 {
        self.throttled_count + self.rejected_count
    }
}

/// Metrics for a single observer
#[derive(Debug, Default)]
pub struct ObserverMetrics {
    notified: AtomicU64,
    failed: AtomicU64,
    dropped: AtomicU64,
}

impl ObserverMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_notified(&self) {
        self.notified.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ObserverSnapshot {
        ObserverSnapshot {
            notified: self.notified.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of observer metrics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ObserverSnapshot {
    /// Callbacks that completed without error
    pub notified: u64,
    /// Callbacks that returned an error or panicked
    pub failed: u64,
    /// Events dropped because the observer queue was full
    pub dropped: u64,
}
