//! CanonicalRecord - Ingestion output
//!
//! A normalized sighting plus the identity key used for dedup across cycles.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use crate::GeoLocation;

/// Normalized identifier triplet
///
/// Components are trimmed and lower-cased before this is built.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BeaconIdentifiers {
    pub id1: String,
    pub id2: String,
    pub id3: String,
}

impl BeaconIdentifiers {
    pub fn new(id1: impl Into<String>, id2: impl Into<String>, id3: impl Into<String>) -> Self {
        Self {
            id1: id1.into(),
            id2: id2.into(),
            id3: id3.into(),
        }
    }

    /// Identity key over the triplet, fixed field order
    pub fn identity_key(&self) -> IdentityKey {
        IdentityKey::from_identifiers(self)
    }
}

impl fmt::Display for BeaconIdentifiers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.id1, self.id2, self.id3)
    }
}

/// Stable beacon identity
///
/// First 8 bytes of a BLAKE3 digest over `id1|id2|id3`. Depends on nothing
/// but the identifier triplet, so it is reproducible across cycles and
/// process restarts.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IdentityKey(u64);

impl IdentityKey {
    pub fn from_identifiers(ids: &BeaconIdentifiers) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(ids.id1.as_bytes());
        hasher.update(b"|");
        hasher.update(ids.id2.as_bytes());
        hasher.update(b"|");
        hasher.update(ids.id3.as_bytes());
        let digest = hasher.finalize();

        let mut prefix = [0u8; 8];
        prefix.copy_from_slice(&digest.as_bytes()[..8]);
        Self(u64::from_be_bytes(prefix))
    }

    #[inline]
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl From<u64> for IdentityKey {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl fmt::Debug for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IdentityKey({:016x})", self.0)
    }
}

// Hex string on the wire; a bare u64 loses precision in JSON consumers
impl Serialize for IdentityKey {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for IdentityKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        u64::from_str_radix(&s, 16)
            .map(Self)
            .map_err(serde::de::Error::custom)
    }
}

/// Canonical beacon record
///
/// Immutable once built. Sinks get their own clone, observers share a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    /// Dedup key, derived from `identifiers` only
    pub identity_key: IdentityKey,

    /// Normalized identifier triplet
    pub identifiers: BeaconIdentifiers,

    /// Signal strength (dBm)
    pub rssi: i16,

    /// Estimated distance (metres)
    pub distance: f64,

    /// Device location, if a valid fix was available
    pub location: Option<GeoLocation>,

    /// Advertiser MAC address
    // always written: bincode frames are positional
    #[serde(default)]
    pub bluetooth_address: Option<String>,

    /// Calibrated transmit power
    #[serde(default)]
    pub tx_power: Option<i32>,

    /// Capture time
    pub captured_at: DateTime<Utc>,

    /// Capture time as RFC 3339 with milliseconds
    pub timestamp: String,
}

impl CanonicalRecord {
    pub fn has_location(&self) -> bool {
        self.location.is_some()
    }
}
