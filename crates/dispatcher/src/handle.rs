//! SinkHandle - one sink behind an isolated queue and worker task

use std::sync::Arc;

use contracts::{CanonicalRecord, DeliveryReport, RecordSink, SinkId};
use metrics::counter;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, instrument, warn};

use crate::metrics::SinkMetrics;

/// Capacity of each sink's result channel
pub const REPORT_CHANNEL_CAPACITY: usize = 256;

/// Handle to a running sink worker
pub struct SinkHandle {
    id: SinkId,
    /// Channel to send records to worker
    tx: mpsc::Sender<CanonicalRecord>,
    /// Transmission outcomes
    reports: broadcast::Sender<DeliveryReport>,
    metrics: Arc<SinkMetrics>,
    worker_handle: JoinHandle<()>,
}

impl SinkHandle {
    /// Create a new SinkHandle and spawn the worker task
    pub fn spawn<S: RecordSink + 'static>(sink: S, queue_capacity: usize) -> Self {
        let id = SinkId::from(sink.name());
        let (tx, rx) = mpsc::channel(queue_capacity.max(1));
        let (reports, _) = broadcast::channel(REPORT_CHANNEL_CAPACITY);
        let metrics = Arc::new(SinkMetrics::new());

        let worker = SinkWorker {
            id: id.clone(),
            reports: reports.clone(),
            metrics: Arc::clone(&metrics),
        };
        let worker_handle = tokio::spawn(worker.run(sink, rx));

        Self {
            id,
            tx,
            reports,
            metrics,
            worker_handle,
        }
    }

    pub fn id(&self) -> &SinkId {
        &self.id
    }

    pub fn name(&self) -> &str {
        self.id.as_str()
    }

    pub fn metrics(&self) -> &Arc<SinkMetrics> {
        &self.metrics
    }

    /// Subscribe to this sink's transmission outcomes
    ///
    /// Only outcomes produced after subscribing are seen.
    pub fn subscribe(&self) -> broadcast::Receiver<DeliveryReport> {
        self.reports.subscribe()
    }

    /// Hand a record to the worker (non-blocking)
    ///
    /// Returns true if queued, false if the queue is full (record dropped)
    pub fn try_send(&self, record: CanonicalRecord) -> bool {
        match self.tx.try_send(record) {
            Ok(()) => {
                self.metrics
                    .set_queue_len(self.tx.max_capacity() - self.tx.capacity());
                true
            }
            Err(mpsc::error::TrySendError::Full(r)) => {
                self.metrics.inc_dropped_count();
                counter!("beacon_relay_records_dropped_total", "sink" => self.id.to_string())
                    .increment(1);
                warn!(
                    sink = %self.id,
                    identity_key = %r.identity_key,
                    "Queue full, record dropped"
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                error!(sink = %self.id, "Sink worker closed unexpectedly");
                false
            }
        }
    }

    /// Shutdown the sink worker gracefully
    ///
    /// Records already queued are still transmitted.
    #[instrument(name = "sink_handle_shutdown", skip(self), fields(sink = %self.id))]
    pub async fn shutdown(self) {
        drop(self.tx);
        if let Err(e) = self.worker_handle.await {
            error!(sink = %self.id, error = ?e, "Worker task panicked");
        }
        debug!(sink = %self.id, "SinkHandle shutdown complete");
    }
}

struct SinkWorker {
    id: SinkId,
    reports: broadcast::Sender<DeliveryReport>,
    metrics: Arc<SinkMetrics>,
}

impl SinkWorker {
    #[instrument(name = "sink_worker_loop", skip_all, fields(sink = %self.id))]
    async fn run<S: RecordSink>(self, mut sink: S, mut rx: mpsc::Receiver<CanonicalRecord>) {
        debug!("Sink worker started");

        while let Some(record) = rx.recv().await {
            self.metrics.set_queue_len(rx.len());

            let outcome = sink.transmit(&record).await;
            match &outcome {
                Ok(ack) => {
                    self.metrics.inc_transmit_count();
                    debug!(identity_key = %record.identity_key, bytes = ack.bytes, "Transmitted");
                }
                Err(e) => {
                    // history is not touched: the gate already decided
                    self.metrics.inc_failure_count();
                    counter!("beacon_relay_transmit_failures_total", "sink" => self.id.to_string())
                        .increment(1);
                    error!(identity_key = %record.identity_key, error = %e, "Transmit failed");
                }
            }

            // no subscribers is fine
            let _ = self.reports.send(DeliveryReport {
                sink: self.id.clone(),
                identity_key: record.identity_key,
                captured_at: record.captured_at,
                outcome,
            });
        }

        if let Err(e) = sink.flush().await {
            error!(error = %e, "Flush failed on shutdown");
        }
        if let Err(e) = sink.close().await {
            error!(error = %e, "Close failed on shutdown");
        }

        debug!("Sink worker stopped");
    }
}
