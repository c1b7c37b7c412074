//! `info` command implementation.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use contracts::RelayBlueprint;
use serde::Serialize;
use tracing::info;

use crate::cli::InfoArgs;
use crate::error::ensure_config_exists;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    version: String,
    scanner: ScannerInfo,
    history: HistoryInfo,
    sink_count: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    sinks: Vec<SinkInfo>,
}

#[derive(Serialize)]
struct ScannerInfo {
    region: String,
    scan_period_ms: u64,
}

#[derive(Serialize)]
struct HistoryInfo {
    max_entries: usize,
    retention_factor: u32,
}

#[derive(Serialize)]
struct SinkInfo {
    name: String,
    sink_type: String,
    queue_capacity: usize,
    mode: String,
    min_resend_interval_ms: u64,
    min_confirmations: u32,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    params: BTreeMap<String, String>,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    ensure_config_exists(&args.config)?;

    let blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    if args.json {
        let info = build_config_info(&blueprint, args.sinks);
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&blueprint, args.sinks);
    }

    Ok(())
}

fn build_config_info(blueprint: &RelayBlueprint, with_sinks: bool) -> ConfigInfo {
    let sinks = if with_sinks {
        blueprint
            .sinks
            .iter()
            .map(|s| SinkInfo {
                name: s.name.clone(),
                sink_type: s.sink_type.to_string(),
                queue_capacity: s.queue_capacity,
                mode: s.policy.mode.to_string(),
                min_resend_interval_ms: s.policy.min_resend_interval_ms,
                min_confirmations: s.policy.min_confirmations,
                params: s.params.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            })
            .collect()
    } else {
        Vec::new()
    };

    ConfigInfo {
        version: format!("{:?}", blueprint.version),
        scanner: ScannerInfo {
            region: blueprint.scanner.region.clone(),
            scan_period_ms: blueprint.scanner.scan_period_ms,
        },
        history: HistoryInfo {
            max_entries: blueprint.history.max_entries,
            retention_factor: blueprint.history.retention_factor,
        },
        sink_count: blueprint.sinks.len(),
        sinks,
    }
}

fn print_config_info(blueprint: &RelayBlueprint, with_sinks: bool) {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║                 Beacon Relay Configuration                   ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    println!("📡 Scanner");
    println!("   ├─ Version: {:?}", blueprint.version);
    println!("   ├─ Region: {}", blueprint.scanner.region);
    println!("   └─ Scan period: {} ms", blueprint.scanner.scan_period_ms);

    println!("\n🗂  Delivery History");
    println!("   ├─ Max entries per sink: {}", blueprint.history.max_entries);
    println!(
        "   └─ Retention: {} x resend interval",
        blueprint.history.retention_factor
    );

    println!("\n📤 Sinks ({})", blueprint.sinks.len());
    for (i, sink) in blueprint.sinks.iter().enumerate() {
        let is_last = i == blueprint.sinks.len() - 1;
        let prefix = if is_last { "└─" } else { "├─" };
        let child_prefix = if is_last { "   " } else { "│  " };

        println!("   {} {} ({})", prefix, sink.name, sink.sink_type);

        if with_sinks {
            println!(
                "   {}  ├─ mode={} interval={}ms confirmations={}",
                child_prefix,
                sink.policy.mode,
                sink.policy.min_resend_interval_ms,
                sink.policy.min_confirmations
            );
            let mut params: Vec<_> = sink.params.iter().collect();
            params.sort();
            let rendered: Vec<String> = params.iter().map(|(k, v)| format!("{k}={v}")).collect();
            println!(
                "   {}  └─ queue={} {}",
                child_prefix,
                sink.queue_capacity,
                rendered.join(" ")
            );
        }
    }

    println!();
}
