//! # Dispatcher
//!
//! Record delivery module.
//!
//! Responsibilities:
//! - Gate every record per sink (dedup window + send mode)
//! - Fan records out to sinks without back-pressure between them
//! - Isolate slow or failing sinks behind their own queue and worker
//! - Fan parsed batches and lifecycle events out to local observers

pub mod dispatcher;
pub mod error;
pub mod fanout;
pub mod gate;
pub mod handle;
pub mod metrics;
pub mod sinks;

#[cfg(test)]
mod testing;

pub use contracts::{DeliveryReport, RecordSink};
pub use self::dispatcher::{DispatchSummary, SinkDispatcher, create_sink_handle};
pub use self::error::DispatcherError;
pub use self::fanout::{OBSERVER_QUEUE_CAPACITY, ObserverEvent, ObserverFanout};
pub use self::gate::{DeliveryGate, DeliveryHistory, GateDecision};
pub use self::handle::{REPORT_CHANNEL_CAPACITY, SinkHandle};
pub use self::metrics::{MetricsSnapshot, ObserverSnapshot, SinkMetrics};
pub use self::sinks::{FileSink, HttpSink, LogSink, NetworkFormat, NetworkSink};
