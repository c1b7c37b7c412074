//! RawSighting - scanner output
//!
//! One detection of a physical beacon, as handed over by the scanning
//! collaborator once per cycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Raw beacon sighting
///
/// Nothing here is trusted; `ingestion` decides whether it becomes a record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSighting {
    /// Beacon identifiers (proximity UUID / namespace, major, minor)
    #[serde(default)]
    pub identifiers: Vec<String>,

    /// Received signal strength (dBm)
    pub rssi: f64,

    /// Estimated distance (metres)
    pub distance: f64,

    /// Device location at capture time
    #[serde(default)]
    pub location: Option<GeoLocation>,

    /// Advertiser MAC address, if the scanner exposes it
    #[serde(default)]
    pub bluetooth_address: Option<String>,

    /// Calibrated transmit power (dBm at 1m)
    #[serde(default)]
    pub tx_power: Option<i32>,

    /// Capture time
    pub captured_at: DateTime<Utc>,
}

/// Device position (WGS84 degrees)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoLocation {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoLocation {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Finite and within ±90 / ±180
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// One scan cycle worth of sightings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScanCycle {
    /// Region / context the scanner ranged in. Only used for logging.
    pub region: String,

    /// Sightings in detection order
    pub sightings: Vec<RawSighting>,
}

impl ScanCycle {
    pub fn new(region: impl Into<String>, sightings: Vec<RawSighting>) -> Self {
        Self {
            region: region.into(),
            sightings,
        }
    }
}
