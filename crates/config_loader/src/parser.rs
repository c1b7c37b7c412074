//! Config parsing
//!
//! TOML (preferred) and JSON.

use contracts::{ContractError, RelayBlueprint};

/// Config file format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// TOML (preferred)
    Toml,
    /// JSON
    Json,
}

impl ConfigFormat {
    /// Infer format from a file extension
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "toml" => Some(Self::Toml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Parse TOML config
pub fn parse_toml(content: &str) -> Result<RelayBlueprint, ContractError> {
    toml::from_str(content).map_err(|e| ContractError::ConfigParse {
        message: format!("TOML parse error: {e}"),
        source: Some(Box::new(e)),
    })
}

/// Parse JSON config
pub fn parse_json(content: &str) -> Result<RelayBlueprint, ContractError> {
    serde_json::from_str(content).map_err(|e| ContractError::ConfigParse {
        message: format!("JSON parse error: {e}"),
        source: Some(Box::new(e)),
    })
}

/// Parse config in the given format
pub fn parse(content: &str, format: ConfigFormat) -> Result<RelayBlueprint, ContractError> {
    match format {
        ConfigFormat::Toml => parse_toml(content),
        ConfigFormat::Json => parse_json(content),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{SendMode, SinkType};

    #[test]
    fn test_parse_toml_minimal() {
        let content = r#"
[scanner]
scan_period_ms = 2000

[[sinks]]
name = "collector"
sink_type = "http"
[sinks.policy]
mode = "location_required"
min_resend_interval_ms = 30000
[sinks.params]
url = "https://collector.example/api/beacon"
"#;
        let result = parse_toml(content);
        assert!(result.is_ok(), "Failed: {:?}", result.err());
        let bp = result.unwrap();
        assert_eq!(bp.scanner.scan_period_ms, 2000);
        assert_eq!(bp.sinks.len(), 1);
        assert_eq!(bp.sinks[0].sink_type, SinkType::Http);
        assert_eq!(bp.sinks[0].policy.mode, SendMode::LocationRequired);
        assert_eq!(bp.sinks[0].policy.min_resend_interval_ms, 30_000);
        assert_eq!(bp.sinks[0].policy.min_confirmations, 1);
    }

    #[test]
    fn test_parse_json_minimal() {
        let content = r#"{
            "history": { "max_entries": 500 },
            "sinks": [
                { "name": "log", "sink_type": "log", "policy": { "mode": "always" } }
            ]
        }"#;
        let result = parse_json(content);
        assert!(result.is_ok(), "Failed: {:?}", result.err());
        let bp = result.unwrap();
        assert_eq!(bp.history.max_entries, 500);
        assert_eq!(bp.history.retention_factor, 4);
    }

    #[test]
    fn test_unknown_mode_is_parse_error() {
        let content = r#"
[[sinks]]
name = "collector"
sink_type = "log"
[sinks.policy]
mode = "on_tuesdays"
"#;
        let err = parse_toml(content).unwrap_err();
        assert!(matches!(err, ContractError::ConfigParse { .. }));
    }

    #[test]
    fn test_parse_toml_syntax_error() {
        let err = parse_toml("invalid toml [[[").unwrap_err();
        assert!(matches!(err, ContractError::ConfigParse { .. }));
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(
            ConfigFormat::from_extension("toml"),
            Some(ConfigFormat::Toml)
        );
        assert_eq!(
            ConfigFormat::from_extension("JSON"),
            Some(ConfigFormat::Json)
        );
        assert_eq!(ConfigFormat::from_extension("yaml"), None);
    }
}
