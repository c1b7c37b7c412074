//! ObserverFanout - lifecycle events and parsed batches to local observers
//!
//! Each observer gets its own worker task and bounded queue. A callback that
//! errors or panics is logged and swallowed inside that worker, so neither
//! the other observers nor the sink dispatch of the same cycle are affected.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::Duration;

use contracts::{BeaconObserver, CanonicalRecord, ObserverError};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, instrument, warn};

use crate::metrics::{ObserverMetrics, ObserverSnapshot};

/// Default queue capacity per observer
pub const OBSERVER_QUEUE_CAPACITY: usize = 64;

/// Upper bound for enqueueing a start/stop event on a full queue
const LIFECYCLE_SEND_TIMEOUT: Duration = Duration::from_secs(1);

/// What an observer worker is asked to do
#[derive(Debug, Clone)]
pub enum ObserverEvent {
    Start,
    Update(Arc<[CanonicalRecord]>),
    Stop,
}

impl ObserverEvent {
    fn kind(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Update(_) => "update",
            Self::Stop => "stop",
        }
    }
}

struct ObserverHandle {
    name: String,
    tx: mpsc::Sender<ObserverEvent>,
    metrics: Arc<ObserverMetrics>,
    worker: JoinHandle<()>,
}

/// Registry of local observers, notified in registration order
#[derive(Default)]
pub struct ObserverFanout {
    observers: Vec<ObserverHandle>,
}

impl ObserverFanout {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register with the default queue capacity
    pub fn register<O: BeaconObserver>(&mut self, observer: O) {
        self.register_with_capacity(observer, OBSERVER_QUEUE_CAPACITY);
    }

    pub fn register_with_capacity<O: BeaconObserver>(&mut self, observer: O, queue_capacity: usize) {
        let name = observer.name().to_string();
        let (tx, rx) = mpsc::channel(queue_capacity.max(1));
        let metrics = Arc::new(ObserverMetrics::new());
        let worker = tokio::spawn(observer_worker(observer, rx, Arc::clone(&metrics)));

        debug!(observer = %name, "observer registered");
        self.observers.push(ObserverHandle {
            name,
            tx,
            metrics,
            worker,
        });
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        self.observers.iter().map(|o| o.name.clone()).collect()
    }

    pub fn metrics(&self) -> Vec<(String, ObserverSnapshot)> {
        self.observers
            .iter()
            .map(|o| (o.name.clone(), o.metrics.snapshot()))
            .collect()
    }

    /// Session started; returns how many observers got the event
    pub async fn notify_start(&self) -> usize {
        self.broadcast_lifecycle(ObserverEvent::Start).await
    }

    /// Session stopped; returns how many observers got the event
    pub async fn notify_stop(&self) -> usize {
        self.broadcast_lifecycle(ObserverEvent::Stop).await
    }

    /// Hand one batch to every observer without waiting on any of them
    ///
    /// The batch is shared, not copied per observer. Returns how many
    /// observers had room in their queue.
    #[instrument(name = "fanout_notify_update", skip_all, fields(records = records.len()))]
    pub fn notify_update(&self, records: &[CanonicalRecord]) -> usize {
        if self.observers.is_empty() {
            return 0;
        }

        let batch: Arc<[CanonicalRecord]> = Arc::from(records);
        let mut delivered = 0;
        for observer in &self.observers {
            match observer.tx.try_send(ObserverEvent::Update(Arc::clone(&batch))) {
                Ok(()) => delivered += 1,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    observer.metrics.inc_dropped();
                    warn!(observer = %observer.name, "observer queue full, update dropped");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    error!(observer = %observer.name, "observer worker closed unexpectedly");
                }
            }
        }
        delivered
    }

    async fn broadcast_lifecycle(&self, event: ObserverEvent) -> usize {
        let mut delivered = 0;
        for observer in &self.observers {
            match tokio::time::timeout(LIFECYCLE_SEND_TIMEOUT, observer.tx.send(event.clone())).await
            {
                Ok(Ok(())) => delivered += 1,
                Ok(Err(_)) => {
                    error!(observer = %observer.name, event = event.kind(), "observer worker closed unexpectedly");
                }
                Err(_) => {
                    observer.metrics.inc_dropped();
                    warn!(observer = %observer.name, event = event.kind(), "observer queue stuck, event dropped");
                }
            }
        }
        delivered
    }

    /// Close every queue and wait for the workers to drain
    #[instrument(name = "fanout_shutdown", skip(self), fields(observers = self.observers.len()))]
    pub async fn shutdown(self) {
        for observer in self.observers {
            drop(observer.tx);
            if let Err(e) = observer.worker.await {
                error!(observer = %observer.name, error = ?e, "observer worker panicked");
            }
        }
    }
}

async fn observer_worker<O: BeaconObserver>(
    mut observer: O,
    mut rx: mpsc::Receiver<ObserverEvent>,
    metrics: Arc<ObserverMetrics>,
) {
    while let Some(event) = rx.recv().await {
        match invoke(&mut observer, &event) {
            Ok(()) => metrics.inc_notified(),
            Err(e) => {
                metrics.inc_failed();
                warn!(observer = %observer.name(), event = event.kind(), error = %e, "observer callback failed");
            }
        }
    }
    debug!(observer = %observer.name(), "observer worker stopped");
}

fn invoke<O: BeaconObserver>(observer: &mut O, event: &ObserverEvent) -> Result<(), ObserverError> {
    let result = catch_unwind(AssertUnwindSafe(|| match event {
        ObserverEvent::Start => observer.on_start(),
        ObserverEvent::Update(records) => observer.on_update(records),
        ObserverEvent::Stop => observer.on_stop(),
    }));

    result.unwrap_or_else(|panic| {
        let message = panic
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| panic.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        Err(ObserverError::Panicked {
            observer: observer.name().to_string(),
            message,
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{RecordingObserver, record};

    #[tokio::test]
    async fn test_lifecycle_and_update_order() {
        let observer = RecordingObserver::new("a");
        let events = Arc::clone(&observer.events);

        let mut fanout = ObserverFanout::new();
        fanout.register(observer);

        assert_eq!(fanout.notify_start().await, 1);
        assert_eq!(fanout.notify_update(&[record(1, true), record(2, false)]), 1);
        assert_eq!(fanout.notify_stop().await, 1);
        fanout.shutdown().await;

        assert_eq!(
            *events.lock().unwrap(),
            vec!["start", "update:2", "stop"]
        );
    }

    #[tokio::test]
    async fn test_failing_observer_does_not_block_others() {
        let failing = RecordingObserver::new("failing").failing();
        let panicking = RecordingObserver::new("panicking").panicking();
        let healthy = RecordingObserver::new("healthy");
        let healthy_events = Arc::clone(&healthy.events);

        let mut fanout = ObserverFanout::new();
        fanout.register(failing);
        fanout.register(panicking);
        fanout.register(healthy);

        for i in 0..3 {
            assert_eq!(fanout.notify_update(&[record(i, true)]), 3);
        }

        fanout.shutdown().await;
        assert_eq!(healthy_events.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_failures_counted() {
        let mut fanout = ObserverFanout::new();
        fanout.register(RecordingObserver::new("panicking").panicking());
        fanout.notify_update(&[record(1, true)]);
        fanout.notify_update(&[record(2, true)]);

        // the worker survives its own panics
        tokio::time::sleep(Duration::from_millis(50)).await;
        let (_, snapshot) = fanout.metrics().remove(0);
        assert_eq!(snapshot.failed, 2);
        assert_eq!(snapshot.notified, 0);
        fanout.shutdown().await;
    }

    #[tokio::test]
    async fn test_empty_fanout() {
        let fanout = ObserverFanout::new();
        assert_eq!(fanout.notify_update(&[record(1, true)]), 0);
        assert_eq!(fanout.notify_start().await, 0);
    }
}
