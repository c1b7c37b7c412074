//! Observer that mirrors every parsed batch into the log

use contracts::{BeaconObserver, CanonicalRecord, ObserverError};
use tracing::{debug, info};

/// Logs session boundaries and a line per batch
#[derive(Debug, Default)]
pub struct LoggingObserver {
    batches: u64,
    records: u64,
}

impl LoggingObserver {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BeaconObserver for LoggingObserver {
    fn name(&self) -> &str {
        "log_observer"
    }

    fn on_start(&mut self) -> Result<(), ObserverError> {
        self.batches = 0;
        self.records = 0;
        info!("observer: scanning session started");
        Ok(())
    }

    fn on_update(&mut self, records: &[CanonicalRecord]) -> Result<(), ObserverError> {
        self.batches += 1;
        self.records += records.len() as u64;

        let located = records.iter().filter(|r| r.has_location()).count();
        info!(
            batch = self.batches,
            records = records.len(),
            located,
            "observer: beacons in range"
        );
        for record in records {
            debug!(
                identity_key = %record.identity_key,
                major = %record.identifiers.id2,
                minor = %record.identifiers.id3,
                rssi = record.rssi,
                distance = format!("{:.2}", record.distance),
                "observer: sighting"
            );
        }
        Ok(())
    }

    fn on_stop(&mut self) -> Result<(), ObserverError> {
        info!(
            batches = self.batches,
            records = self.records,
            "observer: scanning session stopped"
        );
        Ok(())
    }
}
