//! RecordSink trait - Dispatcher output interface
//!
//! One canonical record maps to exactly one `transmit` call. Wire format is
//! up to the implementation.

use chrono::{DateTime, Utc};

use crate::{CanonicalRecord, IdentityKey, SinkId, TransportError};

/// Acknowledgement of a single transmission
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ack {
    /// Bytes handed to the transport
    pub bytes: usize,
    /// Transport status code, if the transport has one
    pub status: Option<u16>,
}

impl Ack {
    pub fn bytes(bytes: usize) -> Self {
        Self {
            bytes,
            status: None,
        }
    }
}

/// Outcome of one transmission, published on the sink's result channel
#[derive(Debug, Clone)]
pub struct DeliveryReport {
    pub sink: SinkId,
    pub identity_key: IdentityKey,
    pub captured_at: DateTime<Utc>,
    pub outcome: Result<Ack, TransportError>,
}

impl DeliveryReport {
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Remote record sink
///
/// Implementations own their transport timeouts; the dispatcher never waits
/// on a transmission.
#[trait_variant::make(RecordSink: Send)]
pub trait LocalRecordSink {
    /// Sink name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Transmit one record
    ///
    /// # Errors
    /// Returns a transport error carrying the sink name
    async fn transmit(&mut self, record: &CanonicalRecord) -> Result<Ack, TransportError>;

    /// Flush buffer (if any)
    async fn flush(&mut self) -> Result<(), TransportError>;

    /// Close sink
    async fn close(&mut self) -> Result<(), TransportError>;
}
