//! # Ingestion
//!
//! Sighting ingestion module.
//!
//! Responsibilities:
//! - Parse raw sightings into `CanonicalRecord`
//! - Drop malformed sightings without aborting the batch
//! - Count what came in and what was rejected
//! - Provide a mock scanner for running without radio hardware
//!
//! ## Usage Example
//!
//! ```ignore
//! use ingestion::{BeaconRecordParser, MockBeaconScanner, MockScannerConfig};
//!
//! let scanner = MockBeaconScanner::new(MockScannerConfig::default());
//! let rx = scanner.start(8);
//! let parser = BeaconRecordParser::new();
//! while let Ok(cycle) = rx.recv().await {
//!     let batch = parser.parse_batch(&cycle.sightings);
//!     // hand batch.records downstream
//! }
//! ```

mod error;
mod mock;
mod parser;
mod stats;

pub use contracts::{CanonicalRecord, RawSighting, ScanCycle};
pub use error::{ParseError, Result};
pub use mock::{MOCK_PROXIMITY_UUID, MockBeaconScanner, MockScannerConfig};
pub use parser::{BeaconRecordParser, ParsedBatch};
pub use stats::{IngestionMetrics, MetricsSnapshot};
