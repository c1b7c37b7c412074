//! Relay orchestrator - wires scanner, pipeline and report collection.

use std::future::Future;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use contracts::{DeliveryReport, RelayBlueprint};
use ingestion::{MockBeaconScanner, MockScannerConfig};
use observability::{RelayMetricsAggregator, record_delivery_report};
use pipeline::{PipelineHandle, SightingPipeline};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{LoggingObserver, RunStats, stats::SinkLine};
use crate::error::CliError;

/// How long shutdown waits for report collectors
const COLLECTOR_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Relay run configuration
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub blueprint: RelayBlueprint,

    /// Stop after this many cycles (None = until interrupted)
    pub max_cycles: Option<u64>,

    /// Beacons per mock cycle
    pub beacons: u16,

    pub malformed_rate: f64,

    /// Scanner -> pipeline buffer
    pub buffer_size: usize,

    /// Metrics server port (None = disabled)
    pub metrics_port: Option<u16>,
}

/// Main relay orchestrator
pub struct Relay {
    config: RelayConfig,
}

impl Relay {
    pub fn new(config: RelayConfig) -> Self {
        Self { config }
    }

    /// Run until `shutdown` resolves or the cycle limit is reached
    ///
    /// Either way the session is stopped and every sink is drained before
    /// the statistics are returned.
    pub async fn run_until(self, shutdown: impl Future<Output = ()>) -> Result<RunStats> {
        let start_time = Instant::now();
        let blueprint = &self.config.blueprint;

        if let Some(port) = self.config.metrics_port {
            observability::init_metrics_only(port)?;
            info!("Metrics endpoint available on port {}", port);
        }

        let mut pipeline = SightingPipeline::from_blueprint(blueprint)
            .await
            .context("Failed to create sinks")?;
        pipeline.register_observer(LoggingObserver::new());

        if blueprint.sinks.is_empty() {
            warn!("No sinks configured - records only reach observers");
        }

        let handle = pipeline.spawn();
        let collectors = self.spawn_collectors(&handle).await?;

        handle.start_session().await?;

        let scanner = MockBeaconScanner::new(MockScannerConfig {
            region: blueprint.scanner.region.clone(),
            scan_period: Duration::from_millis(blueprint.scanner.scan_period_ms),
            beacon_count: self.config.beacons,
            malformed_rate: self.config.malformed_rate,
            max_cycles: self.config.max_cycles,
            ..Default::default()
        });
        let cycles = scanner.start(self.config.buffer_size);

        info!(
            region = %blueprint.scanner.region,
            scan_period_ms = blueprint.scanner.scan_period_ms,
            max_cycles = ?self.config.max_cycles,
            "Relay running (mock scanner)"
        );

        let mut stats = RunStats::default();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    warn!("Received shutdown signal, stopping relay...");
                    stats.interrupted = true;
                    break;
                }
                cycle = cycles.recv() => {
                    let Ok(cycle) = cycle else {
                        info!(cycles = stats.cycles_processed, "Scanner finished");
                        break;
                    };
                    stats.cycles_processed += 1;

                    match handle.process_cycle(cycle).await? {
                        Some(report) => {
                            debug!(
                                cycle_id = report.cycle_id,
                                parsed = report.parsed,
                                rejected = report.rejected,
                                enqueued = report.enqueued,
                                suppressed = report.suppressed,
                                "Cycle processed"
                            );
                            stats.metrics.update(&report);
                        }
                        None => debug!("Cycle arrived outside a session"),
                    }
                }
            }
        }

        info!("Shutting down relay...");
        scanner.stop();
        handle.stop_session().await?;

        let snapshot = handle.stats().await?;
        stats.sinks = snapshot
            .sinks
            .iter()
            .map(|(id, m)| SinkLine {
                name: id.to_string(),
                accepted: m.accepted_count,
                suppressed: m.suppressed_count(),
                transmitted: m.transmit_count,
                failed: m.failure_count,
                dropped: m.dropped_count,
            })
            .collect();

        handle.shutdown().await?;

        for collector in collectors {
            match tokio::time::timeout(COLLECTOR_DRAIN_TIMEOUT, collector).await {
                Ok(Ok(deliveries)) => stats.metrics.merge_deliveries(&deliveries),
                Ok(Err(e)) => warn!(error = %e, "Report collector failed"),
                Err(_) => warn!("Report collector did not finish in time"),
            }
        }

        stats.duration = start_time.elapsed();
        info!(
            duration_secs = stats.duration.as_secs_f64(),
            cycles = stats.cycles_processed,
            "Relay shutdown complete"
        );

        Ok(stats)
    }

    /// One task per sink tallying its result channel until the sink closes
    async fn spawn_collectors(
        &self,
        handle: &PipelineHandle,
    ) -> Result<Vec<JoinHandle<RelayMetricsAggregator>>> {
        let mut collectors = Vec::with_capacity(self.config.blueprint.sinks.len());

        for sink in &self.config.blueprint.sinks {
            let rx = handle.subscribe(sink.name.as_str()).await?.ok_or_else(|| {
                CliError::relay_execution(format!("sink '{}' was not registered", sink.name))
            })?;
            collectors.push(tokio::spawn(collect_reports(sink.name.clone(), rx)));
        }

        Ok(collectors)
    }
}

/// Count one sink's delivery outcomes until its result channel closes
///
/// Reports are folded in place, so memory stays flat however long the run.
async fn collect_reports(
    name: String,
    mut rx: broadcast::Receiver<DeliveryReport>,
) -> RelayMetricsAggregator {
    let mut deliveries = RelayMetricsAggregator::new();
    loop {
        match rx.recv().await {
            Ok(report) => {
                record_delivery_report(&report);
                if let Err(e) = &report.outcome {
                    warn!(sink = %name, error = %e, "Transmission failed");
                }
                deliveries.record_delivery(&report);
            }
            Err(RecvError::Lagged(missed)) => {
                warn!(sink = %name, missed, "Report collector lagged");
            }
            Err(RecvError::Closed) => break,
        }
    }
    deliveries
}
