//! `validate` command implementation.

use std::path::Path;

use anyhow::{Context, Result};
use contracts::{RelayBlueprint, SendMode};
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;
use crate::error::{CliError, ensure_config_exists};

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    version: String,
    region: String,
    scan_period_ms: u64,
    sink_count: usize,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(&args.config);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    match result.error {
        None => Ok(()),
        Some(message) => Err(CliError::config_validation(message).into()),
    }
}

fn validate_config(path: &Path) -> ValidationResult {
    let config_path = path.display().to_string();

    let loaded = ensure_config_exists(path)
        .map_err(|e| e.to_string())
        .and_then(|()| {
            config_loader::ConfigLoader::load_from_path(path).map_err(|e| e.to_string())
        });

    match loaded {
        Ok(blueprint) => {
            let warnings = collect_warnings(&blueprint);
            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: (!warnings.is_empty()).then_some(warnings),
                summary: Some(ConfigSummary {
                    version: format!("{:?}", blueprint.version),
                    region: blueprint.scanner.region.clone(),
                    scan_period_ms: blueprint.scanner.scan_period_ms,
                    sink_count: blueprint.sinks.len(),
                }),
            }
        }
        Err(error) => ValidationResult {
            valid: false,
            config_path,
            error: Some(error),
            warnings: None,
            summary: None,
        },
    }
}

/// Non-fatal issues worth pointing out
fn collect_warnings(blueprint: &RelayBlueprint) -> Vec<String> {
    let mut warnings = Vec::new();

    if blueprint.sinks.is_empty() {
        warnings.push("No sinks configured - records only reach observers".to_string());
    }

    for sink in &blueprint.sinks {
        if sink.policy.mode == SendMode::Never {
            warnings.push(format!("Sink '{}' has mode 'never' and will receive nothing", sink.name));
        }
        if sink.policy.min_resend_interval_ms > 0
            && sink.policy.min_resend_interval_ms < blueprint.scanner.scan_period_ms
        {
            warnings.push(format!(
                "Sink '{}' resend interval ({} ms) is shorter than the scan period ({} ms)",
                sink.name, sink.policy.min_resend_interval_ms, blueprint.scanner.scan_period_ms
            ));
        }
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!("  Region: {}", summary.region);
            println!("  Scan period: {} ms", summary.scan_period_ms);
            println!("  Sinks: {}", summary.sink_count);
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}
