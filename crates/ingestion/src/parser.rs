//! BeaconRecordParser - RawSighting -> CanonicalRecord

use chrono::SecondsFormat;
use contracts::{BeaconIdentifiers, CanonicalRecord, RawSighting};
use metrics::counter;
use tracing::{debug, instrument};

use crate::error::{ParseError, Result};

/// Representable signal strength range (dBm)
const RSSI_RANGE: std::ops::RangeInclusive<f64> = -128.0..=127.0;

/// Longest accepted identifier component
const MAX_IDENTIFIER_LEN: usize = 64;

/// Converts raw sightings into canonical records
///
/// Stateless: `parse` is a pure function of its input.
#[derive(Debug, Clone, Copy, Default)]
pub struct BeaconRecordParser;

/// Survivors and rejects of one batch
#[derive(Debug, Clone, Default)]
pub struct ParsedBatch {
    /// Records in input order
    pub records: Vec<CanonicalRecord>,

    /// (input index, reason) of every dropped sighting
    pub rejected: Vec<(usize, ParseError)>,
}

impl ParsedBatch {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of sightings that went in
    pub fn received(&self) -> usize {
        self.records.len() + self.rejected.len()
    }
}

impl BeaconRecordParser {
    pub fn new() -> Self {
        Self
    }

    /// Parse one sighting
    ///
    /// # Errors
    /// Fails when the identifier triplet is absent or malformed, or when
    /// signal strength / distance are out of range. Invalid coordinates only
    /// drop the location.
    pub fn parse(&self, sighting: &RawSighting) -> Result<CanonicalRecord> {
        let identifiers = normalize_identifiers(&sighting.identifiers)?;

        if !sighting.rssi.is_finite() || !RSSI_RANGE.contains(&sighting.rssi) {
            return Err(ParseError::InvalidSignalStrength {
                value: sighting.rssi,
            });
        }
        if !sighting.distance.is_finite() || sighting.distance < 0.0 {
            return Err(ParseError::InvalidDistance {
                value: sighting.distance,
            });
        }

        let bluetooth_address = sighting
            .bluetooth_address
            .as_deref()
            .map(str::trim)
            .filter(|addr| !addr.is_empty())
            .map(str::to_ascii_uppercase);

        Ok(CanonicalRecord {
            identity_key: identifiers.identity_key(),
            identifiers,
            rssi: sighting.rssi.round() as i16,
            distance: sighting.distance,
            location: sighting.location.filter(|loc| loc.is_valid()),
            bluetooth_address,
            tx_power: sighting.tx_power,
            captured_at: sighting.captured_at,
            timestamp: sighting
                .captured_at
                .to_rfc3339_opts(SecondsFormat::Millis, true),
        })
    }

    /// Parse a whole batch, keeping every well-formed sighting
    #[instrument(name = "parser_parse_batch", skip(self, sightings), fields(sightings = sightings.len()))]
    pub fn parse_batch(&self, sightings: &[RawSighting]) -> ParsedBatch {
        let mut batch = ParsedBatch {
            records: Vec::with_capacity(sightings.len()),
            rejected: Vec::new(),
        };

        for (index, sighting) in sightings.iter().enumerate() {
            match self.parse(sighting) {
                Ok(record) => batch.records.push(record),
                Err(e) => {
                    counter!("beacon_relay_sightings_rejected_total", "reason" => e.reason())
                        .increment(1);
                    debug!(index, error = %e, "dropping malformed sighting");
                    batch.rejected.push((index, e));
                }
            }
        }

        batch
    }
}

fn normalize_identifiers(raw: &[String]) -> Result<BeaconIdentifiers> {
    let [id1, id2, id3] = raw else {
        return Err(if raw.is_empty() {
            ParseError::MissingIdentifiers
        } else {
            ParseError::IdentifierCount { found: raw.len() }
        });
    };

    Ok(BeaconIdentifiers {
        id1: normalize_component(0, id1)?,
        id2: normalize_component(1, id2)?,
        id3: normalize_component(2, id3)?,
    })
}

fn normalize_component(index: usize, value: &str) -> Result<String> {
    let trimmed = value.trim();
    let well_formed = !trimmed.is_empty()
        && trimmed.len() <= MAX_IDENTIFIER_LEN
        && trimmed
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == ':');

    if !well_formed {
        return Err(ParseError::MalformedIdentifier {
            index,
            value: value.to_string(),
        });
    }
    Ok(trimmed.to_ascii_lowercase())
}
