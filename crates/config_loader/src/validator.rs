//! Config validation
//!
//! Rules:
//! - sink names unique and non-empty
//! - queue_capacity > 0
//! - every sink policy valid (interval bound, min_confirmations >= 1)
//! - type specific params present (network: addr, http: url)
//! - scan_period_ms > 0
//! - history bounds valid

use std::collections::HashSet;

use contracts::{ContractError, RelayBlueprint};

/// Validate a RelayBlueprint
///
/// Returns the first error found.
pub fn validate(blueprint: &RelayBlueprint) -> Result<(), ContractError> {
    validate_scanner(blueprint)?;
    blueprint.history.validate()?;
    validate_sink_names(blueprint)?;
    validate_sinks(blueprint)?;
    Ok(())
}

fn validate_scanner(blueprint: &RelayBlueprint) -> Result<(), ContractError> {
    if blueprint.scanner.scan_period_ms == 0 {
        return Err(ContractError::config_validation(
            "scanner.scan_period_ms",
            "scan_period_ms must be > 0",
        ));
    }
    Ok(())
}

fn validate_sink_names(blueprint: &RelayBlueprint) -> Result<(), ContractError> {
    let mut seen = HashSet::new();
    for (idx, sink) in blueprint.sinks.iter().enumerate() {
        if sink.name.trim().is_empty() {
            return Err(ContractError::config_validation(
                format!("sinks[{idx}].name"),
                "sink name cannot be empty",
            ));
        }
        if !seen.insert(sink.name.as_str()) {
            return Err(ContractError::config_validation(
                format!("sinks[name={}]", sink.name),
                "duplicate sink name",
            ));
        }
    }
    Ok(())
}

fn validate_sinks(blueprint: &RelayBlueprint) -> Result<(), ContractError> {
    for sink in &blueprint.sinks {
        if sink.queue_capacity == 0 {
            return Err(ContractError::config_validation(
                format!("sinks[{}].queue_capacity", sink.name),
                "queue_capacity must be > 0",
            ));
        }

        sink.policy.validate().map_err(|e| match e {
            ContractError::ConfigValidation { field, message } => {
                ContractError::config_validation(format!("sinks[{}].{field}", sink.name), message)
            }
            other => other,
        })?;

        for param in sink.sink_type.required_params() {
            if !sink.params.contains_key(*param) {
                return Err(ContractError::config_validation(
                    format!("sinks[{}].params.{param}", sink.name),
                    format!("{} sink requires '{param}'", sink.sink_type),
                ));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{DeliveryPolicy, SendMode, SinkConfig, SinkType};

    fn minimal_blueprint() -> RelayBlueprint {
        RelayBlueprint {
            sinks: vec![
                SinkConfig::new("log", SinkType::Log, DeliveryPolicy::default()),
                SinkConfig::new(
                    "collector",
                    SinkType::Http,
                    DeliveryPolicy::new(SendMode::LocationRequired, 30_000),
                )
                .with_param("url", "http://127.0.0.1:8080/api/beacon"),
            ],
            ..Default::default()
        }
    }

    #[test]
    fn test_valid_config() {
        let bp = minimal_blueprint();
        assert!(validate(&bp).is_ok());
    }

    #[test]
    fn test_duplicate_sink_name() {
        let mut bp = minimal_blueprint();
        bp.sinks.push(bp.sinks[0].clone());
        let err = validate(&bp).unwrap_err().to_string();
        assert!(err.contains("duplicate sink name"), "got: {err}");
    }

    #[test]
    fn test_empty_sink_name() {
        let mut bp = minimal_blueprint();
        bp.sinks[0].name = "  ".into();
        let err = validate(&bp).unwrap_err().to_string();
        assert!(err.contains("cannot be empty"), "got: {err}");
    }

    #[test]
    fn test_zero_queue_capacity() {
        let mut bp = minimal_blueprint();
        bp.sinks[0].queue_capacity = 0;
        let err = validate(&bp).unwrap_err().to_string();
        assert!(err.contains("queue_capacity"), "got: {err}");
    }

    #[test]
    fn test_invalid_policy_names_sink() {
        let mut bp = minimal_blueprint();
        bp.sinks[1].policy.min_confirmations = 0;
        let err = validate(&bp).unwrap_err().to_string();
        assert!(err.contains("sinks[collector].policy.min_confirmations"), "got: {err}");
    }

    #[test]
    fn test_http_sink_requires_url() {
        let mut bp = minimal_blueprint();
        bp.sinks[1].params.clear();
        let err = validate(&bp).unwrap_err().to_string();
        assert!(err.contains("requires 'url'"), "got: {err}");
    }

    #[test]
    fn test_zero_scan_period() {
        let mut bp = minimal_blueprint();
        bp.scanner.scan_period_ms = 0;
        let err = validate(&bp).unwrap_err().to_string();
        assert!(err.contains("scan_period_ms"), "got: {err}");
    }

    #[test]
    fn test_invalid_history() {
        let mut bp = minimal_blueprint();
        bp.history.retention_factor = 0;
        assert!(validate(&bp).is_err());
    }
}
