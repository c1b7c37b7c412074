//! `run` command implementation.

use anyhow::{Context, Result};
use contracts::RelayBlueprint;
use tracing::{info, warn};

use crate::cli::RunArgs;
use crate::error::ensure_config_exists;
use crate::relay::{Relay, RelayConfig};

/// Execute the `run` command
pub async fn run_relay(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");

    ensure_config_exists(&args.config)?;

    let mut blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    if let Some(period) = args.scan_period_ms {
        info!(scan_period_ms = period, "Overriding scan period from CLI");
        blueprint.scanner.scan_period_ms = period;
        config_loader::ConfigLoader::validate(&blueprint)
            .context("Invalid scan period override")?;
    }

    info!(
        region = %blueprint.scanner.region,
        scan_period_ms = blueprint.scanner.scan_period_ms,
        sinks = blueprint.sinks.len(),
        "Configuration loaded"
    );

    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        print_config_summary(&blueprint);
        return Ok(());
    }

    let relay = Relay::new(RelayConfig {
        blueprint,
        max_cycles: (args.cycles > 0).then_some(args.cycles),
        beacons: args.beacons,
        malformed_rate: args.malformed_rate,
        buffer_size: args.buffer_size.max(1),
        metrics_port: (args.metrics_port > 0).then_some(args.metrics_port),
    });

    info!("Starting relay...");
    let stats = relay
        .run_until(shutdown_signal())
        .await
        .context("Relay execution failed")?;

    stats.print_summary();
    info!("Beacon relay finished");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Print configuration summary for dry-run mode
fn print_config_summary(blueprint: &RelayBlueprint) {
    println!("\n=== Configuration Summary ===\n");
    println!("Scanner:");
    println!("  Region: {}", blueprint.scanner.region);
    println!("  Scan period: {} ms", blueprint.scanner.scan_period_ms);
    println!(
        "\nHistory: {} entries max, retention x{}",
        blueprint.history.max_entries, blueprint.history.retention_factor
    );

    if !blueprint.sinks.is_empty() {
        println!("\nSinks ({}):", blueprint.sinks.len());
        for sink in &blueprint.sinks {
            println!(
                "  - {} ({}) mode={} interval={}ms",
                sink.name,
                sink.sink_type,
                sink.policy.mode.as_str(),
                sink.policy.min_resend_interval_ms
            );
        }
    }

    println!();
}
