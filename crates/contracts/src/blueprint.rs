//! RelayBlueprint - Config Loader output
//!
//! Scanner cadence, history bounds and the sink routing table.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::{DeliveryPolicy, HistoryConfig};

/// Config version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// Complete relay configuration
///
/// Passed explicitly into the pipeline; there is no process-wide copy.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RelayBlueprint {
    #[serde(default)]
    pub version: ConfigVersion,

    /// Scanner cadence
    #[serde(default)]
    pub scanner: ScannerConfig,

    /// Delivery history bounds, applied to every sink
    #[serde(default)]
    pub history: HistoryConfig,

    /// Output routing
    #[serde(default)]
    pub sinks: Vec<SinkConfig>,
}

/// Scanner settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannerConfig {
    /// Scan period in milliseconds
    #[serde(default = "default_scan_period_ms")]
    pub scan_period_ms: u64,

    /// Region identifier reported with every cycle
    #[serde(default = "default_region")]
    pub region: String,
}

fn default_scan_period_ms() -> u64 {
    1100
}

fn default_region() -> String {
    "AllBeaconsRegion".to_string()
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            scan_period_ms: default_scan_period_ms(),
            region: default_region(),
        }
    }
}

/// Sink output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkConfig {
    /// Unique sink name
    pub name: String,

    /// Sink type
    pub sink_type: SinkType,

    /// Worker queue capacity
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Delivery policy
    #[serde(default)]
    pub policy: DeliveryPolicy,

    /// Type specific parameters
    #[serde(default)]
    pub params: HashMap<String, String>,
}

fn default_queue_capacity() -> usize {
    100
}

impl SinkConfig {
    pub fn new(name: impl Into<String>, sink_type: SinkType, policy: DeliveryPolicy) -> Self {
        Self {
            name: name.into(),
            sink_type,
            queue_capacity: default_queue_capacity(),
            policy,
            params: HashMap::new(),
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }
}

/// Sink type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkType {
    /// Log output
    Log,
    /// JSON lines file
    File,
    /// UDP datagrams
    Network,
    /// REST endpoint (POST per record)
    Http,
}

impl SinkType {
    /// Parameters this sink type cannot start without
    pub fn required_params(&self) -> &'static [&'static str] {
        match self {
            Self::Log | Self::File => &[],
            Self::Network => &["addr"],
            Self::Http => &["url"],
        }
    }
}

impl fmt::Display for SinkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Log => "log",
            Self::File => "file",
            Self::Network => "network",
            Self::Http => "http",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SendMode;

    #[test]
    fn test_blueprint_defaults_from_empty_json() {
        let bp: RelayBlueprint = serde_json::from_str("{}").unwrap();
        assert_eq!(bp.scanner.scan_period_ms, 1100);
        assert_eq!(bp.scanner.region, "AllBeaconsRegion");
        assert_eq!(bp.history, HistoryConfig::default());
        assert!(bp.sinks.is_empty());
    }

    #[test]
    fn test_sink_config_builder() {
        let sink = SinkConfig::new(
            "udp",
            SinkType::Network,
            DeliveryPolicy::new(SendMode::Never, 0),
        )
        .with_param("addr", "127.0.0.1:9999");

        assert_eq!(sink.queue_capacity, 100);
        assert_eq!(sink.params.get("addr").map(String::as_str), Some("127.0.0.1:9999"));
        assert_eq!(sink.sink_type.required_params(), &["addr"]);
    }

    #[test]
    fn test_unknown_sink_type_rejected() {
        let result: Result<SinkConfig, _> =
            serde_json::from_str(r#"{"name": "x", "sink_type": "carrier_pigeon"}"#);
        assert!(result.is_err());
    }
}
