//! # Observability
//!
//! Tracing and Prometheus metrics for the relay.
//!
//! ## Features
//!
//! - Tracing initialisation (JSON / pretty / compact)
//! - Prometheus exporter
//! - Cycle and delivery metrics, run summary aggregation
//!
//! ## Usage Example
//!
//! ```ignore
//! observability::init()?;
//!
//! if let Some(report) = pipeline.on_cycle(&cycle) {
//!     observability::record_cycle_metrics(&report);
//! }
//! ```

pub mod metrics;

use anyhow::{Context, Result};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

pub use crate::metrics::{
    MetricsSummary, RelayMetricsAggregator, RunningStats, StatsSummary, record_cycle_metrics,
    record_delivery_report, record_session_state,
};

/// Initialise tracing and the Prometheus exporter with defaults
///
/// JSON logs filtered by `RUST_LOG`, metrics on 0.0.0.0:9000.
pub fn init() -> Result<()> {
    init_with_config(ObservabilityConfig::default())
}

/// Observability configuration
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    pub log_format: LogFormat,
    /// Prometheus port (None = disabled)
    pub metrics_port: Option<u16>,
    /// Used when `RUST_LOG` is unset
    pub default_log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_format: LogFormat::Json,
            metrics_port: Some(9000),
            default_log_level: "info".to_string(),
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default)]
pub enum LogFormat {
    /// Structured JSON
    #[default]
    Json,
    /// Multi-line, human readable
    Pretty,
    /// Single line
    Compact,
}

/// Initialise with an explicit configuration
pub fn init_with_config(config: ObservabilityConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.default_log_level));

    let fmt_layer = match config.log_format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_target(true)
            .with_thread_names(true)
            .with_line_number(true)
            .boxed(),
        LogFormat::Pretty => fmt::layer().pretty().boxed(),
        LogFormat::Compact => fmt::layer().compact().boxed(),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .context("Failed to initialize tracing subscriber")?;

    if let Some(port) = config.metrics_port {
        install_exporter(port)?;
    }

    tracing::info!(
        log_format = ?config.log_format,
        metrics_port = ?config.metrics_port,
        "Observability initialized"
    );

    Ok(())
}

/// Install only the Prometheus exporter
///
/// For when a tracing subscriber is already set up elsewhere.
pub fn init_metrics_only(port: u16) -> Result<()> {
    install_exporter(port)?;
    tracing::info!(port, "Prometheus metrics endpoint initialized");
    Ok(())
}

/// Sightings per cycle rarely exceed a few dozen beacons
const CYCLE_SIGHTING_BUCKETS: &[f64] = &[0.0, 1.0, 2.0, 5.0, 10.0, 20.0, 50.0, 100.0];

fn install_exporter(port: u16) -> Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], port))
        .set_buckets_for_metric(
            Matcher::Full("beacon_relay_cycle_sightings".to_string()),
            CYCLE_SIGHTING_BUCKETS,
        )
        .context("Invalid histogram buckets")?
        .install()
        .context("Failed to install Prometheus recorder")
}
