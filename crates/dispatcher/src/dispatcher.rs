//! SinkDispatcher - per-sink gates in front of isolated sink workers

use chrono::{DateTime, Utc};
use contracts::{
    CanonicalRecord, DeliveryPolicy, DeliveryReport, HistoryConfig, RecordSink, SinkConfig,
    SinkId, SinkType,
};
use metrics::counter;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument};

use crate::error::DispatcherError;
use crate::gate::{DeliveryGate, GateDecision};
use crate::handle::SinkHandle;
use crate::metrics::MetricsSnapshot;
use crate::sinks::{FileSink, HttpSink, LogSink, NetworkSink};

/// Outcome of handing one batch to every sink
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    /// Sinks the batch was offered to
    pub sinks: usize,
    /// Records queued for transmission, summed over sinks
    pub enqueued: usize,
    /// Records held back by a gate, summed over sinks
    pub suppressed: usize,
    /// Records the gate let through but the full queue dropped
    pub dropped: usize,
}

struct SinkEntry {
    gate: DeliveryGate,
    handle: SinkHandle,
}

/// Ordered registry of sinks
///
/// Owned by a single task; `&mut self` on every mutation and on `deliver`
/// keeps registry changes and gate updates out of any dispatch in progress.
pub struct SinkDispatcher {
    sinks: Vec<SinkEntry>,
    history: HistoryConfig,
}

impl Default for SinkDispatcher {
    fn default() -> Self {
        Self::new(HistoryConfig::default())
    }
}

impl SinkDispatcher {
    pub fn new(history: HistoryConfig) -> Self {
        Self {
            sinks: Vec::new(),
            history,
        }
    }

    /// Register a sink under its own name
    ///
    /// # Errors
    /// Invalid policy or a name that is already registered. Nothing is
    /// spawned when this fails.
    pub fn register<S: RecordSink + 'static>(
        &mut self,
        sink: S,
        policy: DeliveryPolicy,
        queue_capacity: usize,
    ) -> Result<SinkId, DispatcherError> {
        self.check_registration(sink.name(), &policy)?;
        Ok(self.insert(SinkHandle::spawn(sink, queue_capacity), policy))
    }

    /// Register a sink whose worker is already running
    ///
    /// On error the handle is dropped, which closes the sink.
    pub fn register_handle(
        &mut self,
        handle: SinkHandle,
        policy: DeliveryPolicy,
    ) -> Result<SinkId, DispatcherError> {
        self.check_registration(handle.name(), &policy)?;
        Ok(self.insert(handle, policy))
    }

    /// Build the sink described by `config` and register it
    #[instrument(
        name = "dispatcher_register_config",
        skip(self, config),
        fields(sink = %config.name, sink_type = %config.sink_type)
    )]
    pub async fn register_config(&mut self, config: &SinkConfig) -> Result<SinkId, DispatcherError> {
        self.check_registration(&config.name, &config.policy)?;
        let handle = create_sink_handle(config).await?;
        Ok(self.insert(handle, config.policy.clone()))
    }

    /// Remove a sink
    ///
    /// The worker keeps transmitting what is already queued; the returned
    /// task completes once it has drained and closed the sink.
    pub fn deregister(&mut self, name: &str) -> Result<JoinHandle<()>, DispatcherError> {
        let idx = self
            .sinks
            .iter()
            .position(|e| e.handle.name() == name)
            .ok_or_else(|| DispatcherError::UnknownSink {
                name: name.to_string(),
            })?;

        let entry = self.sinks.remove(idx);
        info!(sink = %name, remaining = self.sinks.len(), "sink deregistered");
        Ok(tokio::spawn(entry.handle.shutdown()))
    }

    /// Run every record through every sink's gate and queue what passes
    ///
    /// Never waits on a transmission. "Now" for each record is its own
    /// capture time.
    #[instrument(name = "dispatcher_deliver", skip_all, fields(records = records.len(), sinks = self.sinks.len()))]
    pub fn deliver(&mut self, records: &[CanonicalRecord]) -> DispatchSummary {
        let mut summary = DispatchSummary {
            sinks: self.sinks.len(),
            ..Default::default()
        };

        for entry in &mut self.sinks {
            for record in records {
                let decision = entry.gate.evaluate(record, record.captured_at);
                entry.handle.metrics().record_decision(decision);

                if decision != GateDecision::Send {
                    summary.suppressed += 1;
                    continue;
                }
                if entry.handle.try_send(record.clone()) {
                    summary.enqueued += 1;
                    counter!("beacon_relay_records_dispatched_total", "sink" => entry.handle.name().to_string())
                        .increment(1);
                } else {
                    summary.dropped += 1;
                }
            }
        }

        debug!(
            enqueued = summary.enqueued,
            suppressed = summary.suppressed,
            dropped = summary.dropped,
            "batch dispatched"
        );
        summary
    }

    /// Evaluate one record against one sink's gate at an explicit instant
    pub fn should_send(
        &mut self,
        name: &str,
        record: &CanonicalRecord,
        now: DateTime<Utc>,
    ) -> Result<bool, DispatcherError> {
        let entry = self.entry_mut(name)?;
        Ok(entry.gate.should_send(record, now))
    }

    /// Result channel of one sink
    pub fn subscribe(&self, name: &str) -> Option<broadcast::Receiver<DeliveryReport>> {
        self.sinks
            .iter()
            .find(|e| e.handle.name() == name)
            .map(|e| e.handle.subscribe())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.sinks.iter().any(|e| e.handle.name() == name)
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    /// Registered sinks in registration order
    pub fn sink_ids(&self) -> Vec<SinkId> {
        self.sinks.iter().map(|e| e.handle.id().clone()).collect()
    }

    /// Entries currently held in one sink's history
    pub fn history_len(&self, name: &str) -> Option<usize> {
        self.sinks
            .iter()
            .find(|e| e.handle.name() == name)
            .map(|e| e.gate.history().len())
    }

    /// Get metrics for all sinks
    pub fn metrics(&self) -> Vec<(SinkId, MetricsSnapshot)> {
        self.sinks
            .iter()
            .map(|e| (e.handle.id().clone(), e.handle.metrics().snapshot()))
            .collect()
    }

    /// Drain and close every sink
    #[instrument(name = "dispatcher_shutdown", skip(self), fields(sinks = self.sinks.len()))]
    pub async fn shutdown(self) {
        for entry in self.sinks {
            entry.handle.shutdown().await;
        }
        info!("Dispatcher shutdown complete");
    }

    fn check_registration(&self, name: &str, policy: &DeliveryPolicy) -> Result<(), DispatcherError> {
        if name.trim().is_empty() {
            return Err(DispatcherError::sink_creation(name, "sink name cannot be empty"));
        }
        policy
            .validate()
            .map_err(|source| DispatcherError::InvalidPolicy {
                name: name.to_string(),
                source,
            })?;
        if self.contains(name) {
            return Err(DispatcherError::DuplicateSink {
                name: name.to_string(),
            });
        }
        Ok(())
    }

    fn insert(&mut self, handle: SinkHandle, policy: DeliveryPolicy) -> SinkId {
        let id = handle.id().clone();
        info!(sink = %id, mode = %policy.mode, interval_ms = policy.min_resend_interval_ms, "sink registered");
        self.sinks.push(SinkEntry {
            gate: DeliveryGate::new(id.clone(), policy, &self.history),
            handle,
        });
        id
    }

    fn entry_mut(&mut self, name: &str) -> Result<&mut SinkEntry, DispatcherError> {
        self.sinks
            .iter_mut()
            .find(|e| e.handle.name() == name)
            .ok_or_else(|| DispatcherError::UnknownSink {
                name: name.to_string(),
            })
    }
}

/// Create a SinkHandle from configuration
#[instrument(
    name = "dispatcher_create_sink_handle",
    skip(config),
    fields(sink = %config.name, sink_type = ?config.sink_type)
)]
pub async fn create_sink_handle(config: &SinkConfig) -> Result<SinkHandle, DispatcherError> {
    match config.sink_type {
        SinkType::Log => {
            let sink = LogSink::new(&config.name);
            Ok(SinkHandle::spawn(sink, config.queue_capacity))
        }
        SinkType::File => {
            let sink = FileSink::from_params(&config.name, &config.params)
                .map_err(|e| DispatcherError::sink_creation(&config.name, e.to_string()))?;
            Ok(SinkHandle::spawn(sink, config.queue_capacity))
        }
        SinkType::Network => {
            let sink = NetworkSink::from_params(&config.name, &config.params)
                .await
                .map_err(|e| DispatcherError::sink_creation(&config.name, e.to_string()))?;
            Ok(SinkHandle::spawn(sink, config.queue_capacity))
        }
        SinkType::Http => {
            let sink = HttpSink::from_params(&config.name, &config.params)
                .map_err(|e| DispatcherError::sink_creation(&config.name, e.to_string()))?;
            Ok(SinkHandle::spawn(sink, config.queue_capacity))
        }
    }
}
