//! LogSink - logs record summary via tracing

use contracts::{Ack, CanonicalRecord, RecordSink, TransportError};
use tracing::{info, instrument};

/// Sink that logs record summaries for debugging
pub struct LogSink {
    name: String,
}

impl LogSink {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    fn log_record_summary(&self, record: &CanonicalRecord) {
        info!(
            sink = %self.name,
            identity_key = %record.identity_key,
            beacon = %record.identifiers,
            rssi = record.rssi,
            distance = record.distance,
            has_location = record.has_location(),
            timestamp = %record.timestamp,
            "Beacon record"
        );
    }
}

impl RecordSink for LogSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "log_sink_transmit",
        skip(self, record),
        fields(sink = %self.name, identity_key = %record.identity_key)
    )]
    async fn transmit(&mut self, record: &CanonicalRecord) -> Result<Ack, TransportError> {
        self.log_record_summary(record);
        Ok(Ack::default())
    }

    #[instrument(name = "log_sink_flush", skip(self))]
    async fn flush(&mut self) -> Result<(), TransportError> {
        Ok(())
    }

    #[instrument(name = "log_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), TransportError> {
        info!(sink = %self.name, "LogSink closed");
        Ok(())
    }
}
