//! Ingestion error types

use thiserror::Error;

/// A raw sighting that cannot become a canonical record
///
/// Recovered locally: the sighting is dropped and the batch continues.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    /// No identifiers at all
    #[error("sighting carries no identifiers")]
    MissingIdentifiers,

    /// Not a triplet
    #[error("expected 3 identifiers, found {found}")]
    IdentifierCount {
        /// Number of identifiers present
        found: usize,
    },

    /// Empty or containing characters outside `[a-z0-9:-]`
    #[error("identifier {index} is malformed: {value:?}")]
    MalformedIdentifier {
        /// Position in the triplet
        index: usize,
        /// Offending raw value
        value: String,
    },

    /// Non-finite or outside the i8 dBm range
    #[error("signal strength out of range: {value}")]
    InvalidSignalStrength {
        /// Raw value
        value: f64,
    },

    /// Non-finite or negative
    #[error("distance out of range: {value}")]
    InvalidDistance {
        /// Raw value
        value: f64,
    },
}

impl ParseError {
    /// Short label for metrics
    pub fn reason(&self) -> &'static str {
        match self {
            Self::MissingIdentifiers => "missing_identifiers",
            Self::IdentifierCount { .. } => "identifier_count",
            Self::MalformedIdentifier { .. } => "malformed_identifier",
            Self::InvalidSignalStrength { .. } => "invalid_rssi",
            Self::InvalidDistance { .. } => "invalid_distance",
        }
    }
}

/// Ingestion Result type alias
pub type Result<T> = std::result::Result<T, ParseError>;
