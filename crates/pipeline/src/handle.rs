//! PipelineHandle - message entry point into a spawned pipeline
//!
//! The pipeline runs on one task and handles one command at a time, so
//! cycles are sequential and registry changes never interleave with a
//! dispatch. Handles are cheap to clone and can be used from any task.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use contracts::{
    BeaconObserver, CycleReport, DeliveryPolicy, DeliveryReport, RecordSink, ScanCycle,
    SinkConfig, SinkId,
};
use dispatcher::{DispatcherError, SinkHandle};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, instrument, warn};

use crate::error::{PipelineError, Result};
use crate::pipeline::{PipelineStats, SightingPipeline};

/// Capacity of the command queue
pub const COMMAND_CHANNEL_CAPACITY: usize = 64;

type Reply<T> = oneshot::Sender<T>;

/// Commands understood by a spawned pipeline
pub enum PipelineCommand {
    StartSession(Reply<bool>),
    StopSession(Reply<bool>),
    Cycle {
        cycle: ScanCycle,
        reply: Option<Reply<Option<CycleReport>>>,
    },
    RegisterSink {
        handle: SinkHandle,
        policy: DeliveryPolicy,
        reply: Reply<Result<SinkId>>,
    },
    RegisterSinkConfig {
        config: SinkConfig,
        reply: Reply<Result<SinkId>>,
    },
    DeregisterSink {
        name: String,
        reply: Reply<Result<JoinHandle<()>>>,
    },
    RegisterObserver(Box<dyn BeaconObserver>),
    Subscribe {
        sink: String,
        reply: Reply<Option<broadcast::Receiver<DeliveryReport>>>,
    },
    Stats(Reply<PipelineStats>),
    Shutdown(Reply<()>),
}

/// Cloneable handle to a spawned [`SightingPipeline`]
#[derive(Clone)]
pub struct PipelineHandle {
    tx: mpsc::Sender<PipelineCommand>,
    armed: Arc<AtomicBool>,
}

impl SightingPipeline {
    /// Move the pipeline onto its own task
    ///
    /// The task ends on [`PipelineHandle::shutdown`] or when every handle
    /// is dropped; either way sinks and observers are drained.
    pub fn spawn(self) -> PipelineHandle {
        let (tx, rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let armed = self.armed_flag();
        tokio::spawn(run(self, rx));
        PipelineHandle { tx, armed }
    }
}

#[instrument(name = "pipeline_loop", skip_all)]
async fn run(mut pipeline: SightingPipeline, mut rx: mpsc::Receiver<PipelineCommand>) {
    debug!("pipeline task started");

    while let Some(command) = rx.recv().await {
        match command {
            PipelineCommand::StartSession(reply) => {
                let _ = reply.send(pipeline.start_session().await);
            }
            PipelineCommand::StopSession(reply) => {
                let _ = reply.send(pipeline.stop_session().await);
            }
            PipelineCommand::Cycle { cycle, reply } => {
                let report = pipeline.on_cycle(&cycle);
                if let Some(reply) = reply {
                    let _ = reply.send(report);
                }
            }
            PipelineCommand::RegisterSink {
                handle,
                policy,
                reply,
            } => {
                let _ = reply.send(pipeline.register_sink_handle(handle, policy));
            }
            PipelineCommand::RegisterSinkConfig { config, reply } => {
                let _ = reply.send(pipeline.register_sink_config(&config).await);
            }
            PipelineCommand::DeregisterSink { name, reply } => {
                let _ = reply.send(pipeline.deregister_sink(&name));
            }
            PipelineCommand::RegisterObserver(observer) => {
                pipeline.register_observer(observer);
            }
            PipelineCommand::Subscribe { sink, reply } => {
                let _ = reply.send(pipeline.subscribe(&sink));
            }
            PipelineCommand::Stats(reply) => {
                let _ = reply.send(pipeline.stats());
            }
            PipelineCommand::Shutdown(reply) => {
                pipeline.shutdown().await;
                let _ = reply.send(());
                return;
            }
        }
    }

    debug!("all handles dropped");
    pipeline.shutdown().await;
}

impl PipelineHandle {
    /// Reads the shared flag, no round trip
    pub fn is_armed(&self) -> bool {
        self.armed.load(Ordering::SeqCst)
    }

    pub async fn start_session(&self) -> Result<bool> {
        self.request(PipelineCommand::StartSession).await
    }

    pub async fn stop_session(&self) -> Result<bool> {
        self.request(PipelineCommand::StopSession).await
    }

    /// Submit a cycle and wait until it has been processed
    pub async fn process_cycle(&self, cycle: ScanCycle) -> Result<Option<CycleReport>> {
        self.request(|reply| PipelineCommand::Cycle {
            cycle,
            reply: Some(reply),
        })
        .await
    }

    /// Submit a cycle without waiting for it
    pub async fn on_cycle(&self, cycle: ScanCycle) -> Result<()> {
        self.send(PipelineCommand::Cycle { cycle, reply: None }).await
    }

    /// Spawn `sink`'s worker here and register it with the pipeline
    pub async fn register_sink<S: RecordSink + 'static>(
        &self,
        sink: S,
        policy: DeliveryPolicy,
        queue_capacity: usize,
    ) -> Result<SinkId> {
        // validate before a worker exists
        policy
            .validate()
            .map_err(|source| DispatcherError::InvalidPolicy {
                name: sink.name().to_string(),
                source,
            })?;
        let handle = SinkHandle::spawn(sink, queue_capacity);
        self.request(|reply| PipelineCommand::RegisterSink {
            handle,
            policy,
            reply,
        })
        .await?
    }

    pub async fn register_sink_config(&self, config: SinkConfig) -> Result<SinkId> {
        self.request(|reply| PipelineCommand::RegisterSinkConfig { config, reply })
            .await?
    }

    /// Remove a sink; the returned task finishes once it has drained
    pub async fn deregister_sink(&self, name: impl Into<String>) -> Result<JoinHandle<()>> {
        let name = name.into();
        self.request(|reply| PipelineCommand::DeregisterSink { name, reply })
            .await?
    }

    pub async fn register_observer<O: BeaconObserver>(&self, observer: O) -> Result<()> {
        self.send(PipelineCommand::RegisterObserver(Box::new(observer)))
            .await
    }

    pub async fn subscribe(&self, sink: impl Into<String>) -> Result<Option<broadcast::Receiver<DeliveryReport>>> {
        let sink = sink.into();
        self.request(|reply| PipelineCommand::Subscribe { sink, reply })
            .await
    }

    pub async fn stats(&self) -> Result<PipelineStats> {
        self.request(PipelineCommand::Stats).await
    }

    /// Stop the session, drain everything and end the pipeline task
    pub async fn shutdown(&self) -> Result<()> {
        self.request(PipelineCommand::Shutdown).await
    }

    async fn send(&self, command: PipelineCommand) -> Result<()> {
        self.tx.send(command).await.map_err(|_| {
            warn!("pipeline task is gone");
            PipelineError::Closed
        })
    }

    async fn request<T>(&self, make: impl FnOnce(Reply<T>) -> PipelineCommand) -> Result<T> {
        let (reply, rx) = oneshot::channel();
        self.send(make(reply)).await?;
        rx.await.map_err(|_| PipelineError::Closed)
    }
}
