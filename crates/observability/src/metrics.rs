//! Relay metrics
//!
//! Prometheus-facing recorders plus an in-memory aggregator for the run
//! summary printed by the CLI.

use std::collections::BTreeMap;

use contracts::{CycleReport, DeliveryReport};
use metrics::{counter, gauge, histogram};

/// Record one processed scan cycle
///
/// # Example
///
/// ```ignore
/// if let Some(report) = pipeline.on_cycle(&cycle) {
///     record_cycle_metrics(&report);
/// }
/// ```
pub fn record_cycle_metrics(report: &CycleReport) {
    counter!("beacon_relay_cycles_total").increment(1);
    gauge!("beacon_relay_last_cycle_id").set(report.cycle_id as f64);

    counter!("beacon_relay_sightings_received_total").increment(report.received as u64);
    counter!("beacon_relay_records_parsed_total").increment(report.parsed as u64);
    histogram!("beacon_relay_cycle_sightings").record(report.received as f64);

    if report.is_empty() {
        counter!("beacon_relay_empty_cycles_total").increment(1);
    }
    if report.suppressed > 0 {
        counter!("beacon_relay_records_suppressed_total").increment(report.suppressed as u64);
    }
    gauge!("beacon_relay_observers_notified").set(report.notified_observers as f64);
}

/// Record the session flag (1 = armed)
pub fn record_session_state(armed: bool) {
    gauge!("beacon_relay_session_armed").set(if armed { 1.0 } else { 0.0 });
}

/// Record one transmission outcome from a sink's result channel
pub fn record_delivery_report(report: &DeliveryReport) {
    let status = if report.is_success() { "success" } else { "failure" };
    counter!(
        "beacon_relay_transmissions_total",
        "sink" => report.sink.to_string(),
        "status" => status
    )
    .increment(1);
}

/// Relay metrics aggregator
///
/// Aggregates in memory for the end-of-run summary.
#[derive(Debug, Clone, Default)]
pub struct RelayMetricsAggregator {
    pub total_cycles: u64,
    pub empty_cycles: u64,
    pub total_received: u64,
    pub total_parsed: u64,
    pub total_rejected: u64,
    pub total_enqueued: u64,
    pub total_suppressed: u64,

    /// Records parsed per cycle
    pub parsed_stats: RunningStats,

    /// Transmission outcomes per sink: (success, failure)
    pub transmissions: BTreeMap<String, (u64, u64)>,
}

impl RelayMetricsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, report: &CycleReport) {
        self.total_cycles += 1;
        if report.is_empty() {
            self.empty_cycles += 1;
        }
        self.total_received += report.received as u64;
        self.total_parsed += report.parsed as u64;
        self.total_rejected += report.rejected as u64;
        self.total_enqueued += report.enqueued as u64;
        self.total_suppressed += report.suppressed as u64;
        self.parsed_stats.push(report.parsed as f64);
    }

    pub fn record_delivery(&mut self, report: &DeliveryReport) {
        let entry = self
            .transmissions
            .entry(report.sink.to_string())
            .or_default();
        if report.is_success() {
            entry.0 += 1;
        } else {
            entry.1 += 1;
        }
    }

    /// Add another aggregator's per-sink transmission counts to this one
    pub fn merge_deliveries(&mut self, other: &Self) {
        for (sink, (ok, failed)) in &other.transmissions {
            let entry = self.transmissions.entry(sink.clone()).or_default();
            entry.0 += ok;
            entry.1 += failed;
        }
    }

    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            total_cycles: self.total_cycles,
            empty_cycles: self.empty_cycles,
            total_received: self.total_received,
            total_parsed: self.total_parsed,
            total_rejected: self.total_rejected,
            total_enqueued: self.total_enqueued,
            total_suppressed: self.total_suppressed,
            rejection_rate: if self.total_received > 0 {
                self.total_rejected as f64 / self.total_received as f64 * 100.0
            } else {
                0.0
            },
            parsed_per_cycle: StatsSummary::from(&self.parsed_stats),
            transmissions: self.transmissions.clone(),
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Summary of a relay run
#[derive(Debug, Clone, Default)]
pub struct MetricsSummary {
    pub total_cycles: u64,
    pub empty_cycles: u64,
    pub total_received: u64,
    pub total_parsed: u64,
    pub total_rejected: u64,
    pub total_enqueued: u64,
    pub total_suppressed: u64,
    pub rejection_rate: f64,
    pub parsed_per_cycle: StatsSummary,
    pub transmissions: BTreeMap<String, (u64, u64)>,
}

impl std::fmt::Display for MetricsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Relay Metrics Summary ===")?;
        writeln!(
            f,
            "Cycles: {} ({} without records)",
            self.total_cycles, self.empty_cycles
        )?;
        writeln!(
            f,
            "Sightings: {} received, {} parsed, {} rejected ({:.2}%)",
            self.total_received, self.total_parsed, self.total_rejected, self.rejection_rate
        )?;
        writeln!(
            f,
            "Records: {} queued to sinks, {} suppressed by gates",
            self.total_enqueued, self.total_suppressed
        )?;
        writeln!(f, "Parsed per cycle: {}", self.parsed_per_cycle)?;

        if !self.transmissions.is_empty() {
            writeln!(f, "Transmissions (ok/failed):")?;
            for (sink, (ok, failed)) in &self.transmissions {
                writeln!(f, "  {sink}: {ok}/{failed}")?;
            }
        }

        Ok(())
    }
}

/// Descriptive statistics
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.1}, max={:.1}, mean={:.2}, std={:.2} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// Online statistics (Welford)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            self.m2 += delta * (value - self.mean);
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 { 0.0 } else { self.mean }
    }

    /// Sample variance
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use contracts::{Ack, IdentityKey, SinkId, TransportError};

    fn report(parsed: usize, rejected: usize) -> CycleReport {
        CycleReport {
            cycle_id: 1,
            region: "AllBeaconsRegion".into(),
            received: parsed + rejected,
            parsed,
            rejected,
            dispatched_sinks: 1,
            enqueued: parsed,
            suppressed: 0,
            notified_observers: 1,
        }
    }

    #[test]
    fn test_running_stats() {
        let mut stats = RunningStats::default();
        for v in [1.0, 2.0, 3.0, 4.0, 5.0] {
            stats.push(v);
        }

        assert_eq!(stats.count(), 5);
        assert!((stats.mean() - 3.0).abs() < 1e-10);
        assert!((stats.variance() - 2.5).abs() < 1e-10);
    }

    #[test]
    fn test_aggregator_update() {
        let mut aggregator = RelayMetricsAggregator::new();
        aggregator.update(&report(3, 1));
        aggregator.update(&report(0, 2));

        let summary = aggregator.summary();
        assert_eq!(summary.total_cycles, 2);
        assert_eq!(summary.empty_cycles, 1);
        assert_eq!(summary.total_received, 6);
        assert_eq!(summary.total_rejected, 3);
        assert!((summary.rejection_rate - 50.0).abs() < 1e-10);
    }

    #[test]
    fn test_record_delivery() {
        let mut aggregator = RelayMetricsAggregator::new();
        let ok = DeliveryReport {
            sink: SinkId::from("collector"),
            identity_key: IdentityKey::from(7),
            captured_at: Utc::now(),
            outcome: Ok(Ack::bytes(10)),
        };
        let failed = DeliveryReport {
            outcome: Err(TransportError::send("collector", "reset")),
            ..ok.clone()
        };

        aggregator.record_delivery(&ok);
        aggregator.record_delivery(&failed);
        aggregator.record_delivery(&ok);

        assert_eq!(aggregator.transmissions.get("collector"), Some(&(2, 1)));
        let output = aggregator.summary().to_string();
        assert!(output.contains("collector: 2/1"));
    }

    #[test]
    fn test_merge_deliveries() {
        let mut total = RelayMetricsAggregator::new();
        total.transmissions.insert("udp".into(), (1, 0));

        let mut udp = RelayMetricsAggregator::new();
        udp.transmissions.insert("udp".into(), (3, 2));
        let mut file = RelayMetricsAggregator::new();
        file.transmissions.insert("file".into(), (5, 0));

        total.merge_deliveries(&udp);
        total.merge_deliveries(&file);

        assert_eq!(total.transmissions.get("udp"), Some(&(4, 2)));
        assert_eq!(total.transmissions.get("file"), Some(&(5, 0)));
    }

    #[test]
    fn test_summary_display() {
        let mut aggregator = RelayMetricsAggregator::new();
        aggregator.update(&report(4, 0));
        let output = format!("{}", aggregator.summary());
        assert!(output.contains("Cycles: 1 (0 without records)"));
        assert!(output.contains("0.00%"));
    }
}
