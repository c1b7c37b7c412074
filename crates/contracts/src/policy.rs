//! Delivery policy - per sink, read-only after registration

use chrono::TimeDelta;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::ContractError;

/// Upper bound for `min_resend_interval_ms` (7 days)
pub const MAX_RESEND_INTERVAL_MS: u64 = 7 * 24 * 60 * 60 * 1000;

/// Which records a sink accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SendMode {
    /// Send every record
    #[default]
    Always,
    /// Send only records carrying a location
    LocationRequired,
    /// Never send
    Never,
}

impl SendMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Always => "always",
            Self::LocationRequired => "location_required",
            Self::Never => "never",
        }
    }
}

impl fmt::Display for SendMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SendMode {
    type Err = ContractError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "always" => Ok(Self::Always),
            "location_required" => Ok(Self::LocationRequired),
            "never" => Ok(Self::Never),
            other => Err(ContractError::config_validation(
                "policy.mode",
                format!("unknown send mode '{other}'"),
            )),
        }
    }
}

/// Delivery policy of a single sink
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryPolicy {
    /// Send mode
    #[serde(default)]
    pub mode: SendMode,

    /// Minimum time between two sends of the same beacon
    #[serde(default = "default_min_resend_interval_ms")]
    pub min_resend_interval_ms: u64,

    /// Minimum confirmations for inbound region queries
    #[serde(default = "default_min_confirmations")]
    pub min_confirmations: u32,
}

fn default_min_resend_interval_ms() -> u64 {
    10_000
}

fn default_min_confirmations() -> u32 {
    1
}

impl Default for DeliveryPolicy {
    fn default() -> Self {
        Self {
            mode: SendMode::default(),
            min_resend_interval_ms: default_min_resend_interval_ms(),
            min_confirmations: default_min_confirmations(),
        }
    }
}

impl DeliveryPolicy {
    pub fn new(mode: SendMode, min_resend_interval_ms: u64) -> Self {
        Self {
            mode,
            min_resend_interval_ms,
            ..Default::default()
        }
    }

    pub fn min_resend_interval(&self) -> TimeDelta {
        TimeDelta::milliseconds(self.min_resend_interval_ms.min(MAX_RESEND_INTERVAL_MS) as i64)
    }

    /// Reject policies that cannot be honoured
    pub fn validate(&self) -> Result<(), ContractError> {
        if self.min_resend_interval_ms > MAX_RESEND_INTERVAL_MS {
            return Err(ContractError::config_validation(
                "policy.min_resend_interval_ms",
                format!(
                    "min_resend_interval_ms must be <= {MAX_RESEND_INTERVAL_MS}, got {}",
                    self.min_resend_interval_ms
                ),
            ));
        }
        if self.min_confirmations == 0 {
            return Err(ContractError::config_validation(
                "policy.min_confirmations",
                "min_confirmations must be >= 1",
            ));
        }
        Ok(())
    }
}

/// Upper bound for `HistoryConfig::retention_factor`
pub const MAX_RETENTION_FACTOR: u32 = 1000;

/// Bounds for the per-sink delivery history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Entry count that triggers a sweep
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,

    /// Entries older than `retention_factor * min_resend_interval` are stale
    #[serde(default = "default_retention_factor")]
    pub retention_factor: u32,
}

fn default_max_entries() -> usize {
    10_000
}

fn default_retention_factor() -> u32 {
    4
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_entries: default_max_entries(),
            retention_factor: default_retention_factor(),
        }
    }
}

impl HistoryConfig {
    pub fn validate(&self) -> Result<(), ContractError> {
        if self.max_entries == 0 {
            return Err(ContractError::config_validation(
                "history.max_entries",
                "max_entries must be > 0",
            ));
        }
        if !(1..=MAX_RETENTION_FACTOR).contains(&self.retention_factor) {
            return Err(ContractError::config_validation(
                "history.retention_factor",
                format!("retention_factor must be within 1..={MAX_RETENTION_FACTOR}"),
            ));
        }
        Ok(())
    }
}
