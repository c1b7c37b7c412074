//! SightingPipeline - Idle / Armed state machine around one scan cycle
//!
//! ```text
//!   Idle --start_session--> Armed --stop_session--> Idle
//! ```
//!
//! While armed a cycle runs: parse all, drop failures, and if anything
//! survived, dispatch to sinks first and then fan out to observers. Cycles
//! that arrive while idle are ignored.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use contracts::{
    BeaconObserver, CycleReport, DeliveryPolicy, DeliveryReport, HistoryConfig, RecordSink,
    RelayBlueprint, ScanCycle, SinkConfig, SinkId,
};
use dispatcher::{ObserverFanout, ObserverSnapshot, SinkDispatcher, SinkHandle};
use ingestion::{BeaconRecordParser, IngestionMetrics, MetricsSnapshot};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument};

use crate::error::Result;

/// Session state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    /// No scanning session
    Idle,
    /// Session started, cycles are processed
    Armed,
}

impl PipelineState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Armed => "armed",
        }
    }
}

/// Point-in-time view of the whole pipeline
#[derive(Debug, Clone)]
pub struct PipelineStats {
    pub state: PipelineState,
    pub cycles: u64,
    pub ingestion: MetricsSnapshot,
    pub sinks: Vec<(SinkId, dispatcher::MetricsSnapshot)>,
    pub observers: Vec<(String, ObserverSnapshot)>,
}

/// Beacon sighting pipeline
///
/// Everything that mutates takes `&mut self`, so cycles never overlap and
/// sink / observer registration only happens between cycles.
pub struct SightingPipeline {
    state: PipelineState,
    armed: Arc<AtomicBool>,
    parser: BeaconRecordParser,
    dispatcher: SinkDispatcher,
    fanout: ObserverFanout,
    ingestion: Arc<IngestionMetrics>,
    cycles: u64,
}

impl Default for SightingPipeline {
    fn default() -> Self {
        Self::new(HistoryConfig::default())
    }
}

impl SightingPipeline {
    pub fn new(history: HistoryConfig) -> Self {
        Self {
            state: PipelineState::Idle,
            armed: Arc::new(AtomicBool::new(false)),
            parser: BeaconRecordParser::new(),
            dispatcher: SinkDispatcher::new(history),
            fanout: ObserverFanout::new(),
            ingestion: Arc::new(IngestionMetrics::new()),
            cycles: 0,
        }
    }

    /// Build a pipeline with every sink of `blueprint` registered
    ///
    /// # Errors
    /// The first sink that cannot be built or registered; sinks registered
    /// before it are shut down again.
    #[instrument(name = "pipeline_from_blueprint", skip(blueprint), fields(sinks = blueprint.sinks.len()))]
    pub async fn from_blueprint(blueprint: &RelayBlueprint) -> Result<Self> {
        let mut pipeline = Self::new(blueprint.history);
        for sink in &blueprint.sinks {
            if let Err(e) = pipeline.register_sink_config(sink).await {
                pipeline.shutdown().await;
                return Err(e);
            }
        }
        Ok(pipeline)
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn is_armed(&self) -> bool {
        self.state == PipelineState::Armed
    }

    /// Flag mirrored from the state, readable from other tasks
    pub fn armed_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.armed)
    }

    /// Idle -> Armed; the start event is queued to every observer before
    /// this returns
    ///
    /// `on_start` itself runs on each observer's worker, ahead of any update
    /// from this session.
    /// Returns false if a session was already running.
    #[instrument(name = "pipeline_start_session", skip(self))]
    pub async fn start_session(&mut self) -> bool {
        if self.is_armed() {
            debug!("session already armed");
            return false;
        }
        self.set_state(PipelineState::Armed);
        let notified = self.fanout.notify_start().await;
        info!(observers = notified, sinks = self.dispatcher.len(), "scanning session started");
        true
    }

    /// Armed -> Idle; the stop event is queued to every observer, behind
    /// the updates already sent
    ///
    /// Returns false if no session was running.
    #[instrument(name = "pipeline_stop_session", skip(self))]
    pub async fn stop_session(&mut self) -> bool {
        if !self.is_armed() {
            debug!("session already idle");
            return false;
        }
        self.set_state(PipelineState::Idle);
        let notified = self.fanout.notify_stop().await;
        info!(observers = notified, cycles = self.cycles, "scanning session stopped");
        true
    }

    /// Process one scan cycle
    ///
    /// `None` when idle. Never waits on a sink or an observer.
    #[instrument(
        name = "pipeline_on_cycle",
        skip(self, cycle),
        fields(region = %cycle.region, sightings = cycle.sightings.len())
    )]
    pub fn on_cycle(&mut self, cycle: &ScanCycle) -> Option<CycleReport> {
        if !self.is_armed() {
            debug!("cycle while idle ignored");
            return None;
        }

        self.cycles += 1;
        let batch = self.parser.parse_batch(&cycle.sightings);
        self.ingestion.record_batch(&batch);

        let mut report = CycleReport {
            cycle_id: self.cycles,
            region: cycle.region.clone(),
            received: batch.received(),
            parsed: batch.records.len(),
            rejected: batch.rejected.len(),
            ..Default::default()
        };

        if !batch.is_empty() {
            let summary = self.dispatcher.deliver(&batch.records);
            report.dispatched_sinks = summary.sinks;
            report.enqueued = summary.enqueued;
            report.suppressed = summary.suppressed;
            report.notified_observers = self.fanout.notify_update(&batch.records);
        }

        observability::record_cycle_metrics(&report);
        debug!(
            cycle_id = report.cycle_id,
            parsed = report.parsed,
            rejected = report.rejected,
            enqueued = report.enqueued,
            "cycle processed"
        );
        Some(report)
    }

    pub fn register_sink<S: RecordSink + 'static>(
        &mut self,
        sink: S,
        policy: DeliveryPolicy,
        queue_capacity: usize,
    ) -> Result<SinkId> {
        Ok(self.dispatcher.register(sink, policy, queue_capacity)?)
    }

    pub fn register_sink_handle(&mut self, handle: SinkHandle, policy: DeliveryPolicy) -> Result<SinkId> {
        Ok(self.dispatcher.register_handle(handle, policy)?)
    }

    pub async fn register_sink_config(&mut self, config: &SinkConfig) -> Result<SinkId> {
        Ok(self.dispatcher.register_config(config).await?)
    }

    /// Remove a sink; the returned task finishes once it has drained
    pub fn deregister_sink(&mut self, name: &str) -> Result<JoinHandle<()>> {
        Ok(self.dispatcher.deregister(name)?)
    }

    pub fn register_observer<O: BeaconObserver>(&mut self, observer: O) {
        self.fanout.register(observer);
    }

    /// Result channel of one sink
    pub fn subscribe(&self, sink: &str) -> Option<broadcast::Receiver<DeliveryReport>> {
        self.dispatcher.subscribe(sink)
    }

    pub fn sink_ids(&self) -> Vec<SinkId> {
        self.dispatcher.sink_ids()
    }

    pub fn stats(&self) -> PipelineStats {
        PipelineStats {
            state: self.state,
            cycles: self.cycles,
            ingestion: self.ingestion.snapshot(),
            sinks: self.dispatcher.metrics(),
            observers: self.fanout.metrics(),
        }
    }

    /// Stop the session if armed, then drain every sink and observer
    #[instrument(name = "pipeline_shutdown", skip(self))]
    pub async fn shutdown(mut self) {
        self.stop_session().await;
        self.dispatcher.shutdown().await;
        self.fanout.shutdown().await;
        info!(cycles = self.cycles, "pipeline shut down");
    }

    fn set_state(&mut self, state: PipelineState) {
        self.state = state;
        self.armed
            .store(state == PipelineState::Armed, Ordering::SeqCst);
        observability::record_session_state(state == PipelineState::Armed);
    }
}
