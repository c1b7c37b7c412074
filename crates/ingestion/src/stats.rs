//! Ingestion counters

use std::sync::atomic::{AtomicU64, Ordering};

use crate::parser::ParsedBatch;

/// Ingestion metrics
///
/// Shared between the scanner side and whoever reports on the run.
#[derive(Debug, Default)]
pub struct IngestionMetrics {
    /// Scan cycles seen
    pub cycles: AtomicU64,

    /// Raw sightings received
    pub sightings_received: AtomicU64,

    /// Sightings that became records
    pub records_parsed: AtomicU64,

    /// Sightings dropped by the parser
    pub parse_errors: AtomicU64,
}

impl IngestionMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one parsed cycle
    pub fn record_batch(&self, batch: &ParsedBatch) {
        self.cycles.fetch_add(1, Ordering::Relaxed);
        self.sightings_received
            .fetch_add(batch.received() as u64, Ordering::Relaxed);
        self.records_parsed
            .fetch_add(batch.records.len() as u64, Ordering::Relaxed);
        self.parse_errors
            .fetch_add(batch.rejected.len() as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            cycles: self.cycles.load(Ordering::Relaxed),
            sightings_received: self.sightings_received.load(Ordering::Relaxed),
            records_parsed: self.records_parsed.load(Ordering::Relaxed),
            parse_errors: self.parse_errors.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`IngestionMetrics`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub cycles: u64,
    pub sightings_received: u64,
    pub records_parsed: u64,
    pub parse_errors: u64,
}

impl MetricsSnapshot {
    /// Share of sightings rejected, 0.0 when nothing was received
    pub fn rejection_rate(&self) -> f64 {
        if self.sightings_received == 0 {
            0.0
        } else {
            self.parse_errors as f64 / self.sightings_received as f64
        }
    }
}
