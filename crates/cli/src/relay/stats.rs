//! Run statistics printed when the relay stops.

use std::time::Duration;

use observability::RelayMetricsAggregator;

/// Per-sink counters captured just before shutdown
#[derive(Debug, Clone, Default)]
pub struct SinkLine {
    pub name: String,
    pub accepted: u64,
    pub suppressed: u64,
    pub transmitted: u64,
    pub failed: u64,
    pub dropped: u64,
}

/// Statistics from a relay run
#[derive(Debug, Clone, Default)]
pub struct RunStats {
    /// Wall time from start to drained shutdown
    pub duration: Duration,

    /// Cycles pulled from the scanner
    pub cycles_processed: u64,

    /// Whether the run ended on a signal rather than the cycle limit
    pub interrupted: bool,

    pub sinks: Vec<SinkLine>,

    pub metrics: RelayMetricsAggregator,
}

impl RunStats {
    pub fn cycles_per_sec(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.cycles_processed as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    pub fn print_summary(&self) {
        println!("\n=== Relay Run ===\n");
        println!("Duration: {:.2}s", self.duration.as_secs_f64());
        println!(
            "Cycles: {} ({:.2}/s){}",
            self.cycles_processed,
            self.cycles_per_sec(),
            if self.interrupted { ", interrupted" } else { "" }
        );

        if !self.sinks.is_empty() {
            println!("\nSinks:");
            for sink in &self.sinks {
                println!(
                    "  - {}: {} accepted, {} suppressed, {} sent, {} failed, {} dropped",
                    sink.name,
                    sink.accepted,
                    sink.suppressed,
                    sink.transmitted,
                    sink.failed,
                    sink.dropped
                );
            }
        }

        println!("\n{}", self.metrics.summary());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycles_per_sec() {
        let stats = RunStats {
            duration: Duration::from_secs(2),
            cycles_processed: 5,
            ..Default::default()
        };
        assert!((stats.cycles_per_sec() - 2.5).abs() < f64::EPSILON);
        assert_eq!(RunStats::default().cycles_per_sec(), 0.0);
    }
}
