//! # Integration Tests
//!
//! Cross-crate tests for the relay.
//!
//! Covers:
//! - identity stability of parsed records
//! - end-to-end cycles through pipeline, gates, sinks and observers
//! - config file to running pipeline

#[cfg(test)]
mod support {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use chrono::{DateTime, TimeZone, Utc};
    use contracts::{
        Ack, BeaconObserver, CanonicalRecord, GeoLocation, ObserverError, RawSighting,
        RecordSink, TransportError,
    };

    pub const UUID: &str = "2f234454-cf6d-4a0f-adf2-f4911ba9ffa6";

    pub fn at(secs: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap() + chrono::TimeDelta::seconds(secs.into())
    }

    pub fn sighting(minor: &str, located: bool, secs: u32) -> RawSighting {
        RawSighting {
            identifiers: vec![UUID.to_string(), "1".to_string(), minor.to_string()],
            rssi: -61.0,
            distance: 2.25,
            location: located.then(|| GeoLocation::new(49.2578, 7.0455)),
            bluetooth_address: None,
            tx_power: Some(-59),
            captured_at: at(secs),
        }
    }

    pub fn malformed(secs: u32) -> RawSighting {
        let mut s = sighting("x", true, secs);
        s.identifiers.truncate(2);
        s
    }

    /// Sink that only counts and remembers minors
    pub struct CountingSink {
        name: String,
        pub minors: Arc<Mutex<Vec<String>>>,
        pub closed: Arc<AtomicBool>,
        fail: bool,
    }

    impl CountingSink {
        pub fn new(name: &str) -> Self {
            Self {
                name: name.to_string(),
                minors: Arc::new(Mutex::new(Vec::new())),
                closed: Arc::new(AtomicBool::new(false)),
                fail: false,
            }
        }

        pub fn failing(name: &str) -> Self {
            Self {
                fail: true,
                ..Self::new(name)
            }
        }
    }

    impl RecordSink for CountingSink {
        fn name(&self) -> &str {
            &self.name
        }

        async fn transmit(&mut self, record: &CanonicalRecord) -> Result<Ack, TransportError> {
            if self.fail {
                return Err(TransportError::connection(&self.name, "collector unreachable"));
            }
            self.minors
                .lock()
                .unwrap()
                .push(record.identifiers.id3.clone());
            Ok(Ack::bytes(1))
        }

        async fn flush(&mut self) -> Result<(), TransportError> {
            Ok(())
        }

        async fn close(&mut self) -> Result<(), TransportError> {
            self.closed.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    /// Observer that keeps the size of every update
    #[derive(Clone, Default)]
    pub struct BatchObserver {
        pub batches: Arc<Mutex<Vec<usize>>>,
        pub starts: Arc<AtomicUsize>,
        pub stops: Arc<AtomicUsize>,
    }

    impl BeaconObserver for BatchObserver {
        fn name(&self) -> &str {
            "batches"
        }

        fn on_start(&mut self) -> Result<(), ObserverError> {
            self.starts.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn on_update(&mut self, records: &[CanonicalRecord]) -> Result<(), ObserverError> {
            self.batches.lock().unwrap().push(records.len());
            Ok(())
        }

        fn on_stop(&mut self) -> Result<(), ObserverError> {
            self.stops.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    /// Observer whose every callback fails
    pub struct BrokenObserver;

    impl BeaconObserver for BrokenObserver {
        fn name(&self) -> &str {
            "broken"
        }

        fn on_start(&mut self) -> Result<(), ObserverError> {
            Err(ObserverError::callback("broken", "start refused"))
        }

        fn on_update(&mut self, _records: &[CanonicalRecord]) -> Result<(), ObserverError> {
            Err(ObserverError::callback("broken", "update refused"))
        }
    }
}

#[cfg(test)]
mod identity_tests {
    use super::support::*;
    use ingestion::BeaconRecordParser;

    #[test]
    fn test_identity_key_stable_across_cycles() {
        let parser = BeaconRecordParser::new();
        let first = parser.parse(&sighting("7", true, 0)).unwrap();

        let mut later = sighting("7", false, 3600);
        later.identifiers[0] = UUID.to_uppercase();
        later.rssi = -88.0;
        let second = parser.parse(&later).unwrap();

        assert_eq!(first.identity_key, second.identity_key);
        assert_eq!(first.identity_key, second.identifiers.identity_key());
    }

    #[test]
    fn test_survivors_equal_received_minus_malformed() {
        let batch = vec![
            sighting("1", true, 0),
            malformed(0),
            sighting("2", false, 0),
            malformed(0),
            malformed(0),
            sighting("3", true, 0),
        ];
        let parsed = BeaconRecordParser::new().parse_batch(&batch);
        assert_eq!(parsed.records.len(), batch.len() - 3);
        assert_eq!(parsed.rejected.len(), 3);
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    use contracts::{DeliveryPolicy, HistoryConfig, ScanCycle, SendMode};
    use pipeline::{PipelineState, SightingPipeline};

    use super::support::*;

    fn policy(mode: SendMode, interval_ms: u64) -> DeliveryPolicy {
        DeliveryPolicy::new(mode, interval_ms)
    }

    /// Two sinks, one record with a location then one without
    #[tokio::test]
    async fn test_two_sinks_mode_matrix() {
        let mut pipeline = SightingPipeline::new(HistoryConfig::default());
        let sink_a = CountingSink::new("a");
        let sink_b = CountingSink::new("b");
        let (a, b) = (sink_a.minors.clone(), sink_b.minors.clone());
        pipeline
            .register_sink(sink_a, policy(SendMode::Always, 0), 16)
            .unwrap();
        pipeline
            .register_sink(sink_b, policy(SendMode::LocationRequired, 0), 16)
            .unwrap();

        assert!(pipeline.start_session().await);
        pipeline.on_cycle(&ScanCycle::new("r", vec![sighting("1", true, 0)]));
        pipeline.on_cycle(&ScanCycle::new("r", vec![sighting("2", false, 1)]));
        pipeline.shutdown().await;

        assert_eq!(*a.lock().unwrap(), vec!["1", "2"]);
        assert_eq!(*b.lock().unwrap(), vec!["1"]);
    }

    /// Three sightings, the middle one malformed
    #[tokio::test]
    async fn test_malformed_middle_sighting() {
        let mut pipeline = SightingPipeline::default();
        let sink = CountingSink::new("a");
        let sent = sink.minors.clone();
        pipeline
            .register_sink(sink, policy(SendMode::Always, 0), 16)
            .unwrap();
        let observer = BatchObserver::default();
        let batches = observer.batches.clone();
        pipeline.register_observer(observer);

        pipeline.start_session().await;
        let report = pipeline
            .on_cycle(&ScanCycle::new(
                "r",
                vec![sighting("1", true, 0), malformed(0), sighting("3", true, 0)],
            ))
            .unwrap();
        assert_eq!(report.parsed, 2);
        assert_eq!(report.rejected, 1);
        assert_eq!(report.enqueued, 2);

        pipeline.shutdown().await;
        assert_eq!(*sent.lock().unwrap(), vec!["1", "3"]);
        assert_eq!(*batches.lock().unwrap(), vec![2]);
    }

    /// A cycle after stop reaches nobody
    #[tokio::test]
    async fn test_late_cycle_after_stop() {
        let mut pipeline = SightingPipeline::default();
        let sink = CountingSink::new("a");
        let sent = sink.minors.clone();
        pipeline
            .register_sink(sink, policy(SendMode::Always, 0), 16)
            .unwrap();
        let observer = BatchObserver::default();
        let (batches, stops) = (observer.batches.clone(), observer.stops.clone());
        pipeline.register_observer(observer);

        pipeline.start_session().await;
        assert!(pipeline.stop_session().await);
        assert_eq!(pipeline.state(), PipelineState::Idle);

        let report = pipeline.on_cycle(&ScanCycle::new("r", vec![sighting("1", true, 0)]));
        assert!(report.is_none());

        pipeline.shutdown().await;
        assert!(sent.lock().unwrap().is_empty());
        assert!(batches.lock().unwrap().is_empty());
        assert_eq!(stops.load(Ordering::SeqCst), 1);
    }

    /// Throttle window is per sink and measured on capture time
    #[tokio::test]
    async fn test_resend_interval_across_cycles() {
        let mut pipeline = SightingPipeline::default();
        let sink = CountingSink::new("throttled");
        let sent = sink.minors.clone();
        pipeline
            .register_sink(sink, policy(SendMode::Always, 10_000), 16)
            .unwrap();

        pipeline.start_session().await;
        for secs in [0, 4, 9, 10, 15, 20] {
            pipeline.on_cycle(&ScanCycle::new("r", vec![sighting("1", true, secs)]));
        }
        pipeline.shutdown().await;

        // sent at 0, 10 and 20
        assert_eq!(sent.lock().unwrap().len(), 3);
    }

    /// A broken sink and a broken observer leave the healthy ones alone
    #[tokio::test]
    async fn test_failures_are_isolated() {
        let mut pipeline = SightingPipeline::default();
        let broken_sink = CountingSink::failing("down");
        let healthy = CountingSink::new("up");
        let sent = healthy.minors.clone();
        pipeline
            .register_sink(broken_sink, policy(SendMode::Always, 0), 16)
            .unwrap();
        pipeline
            .register_sink(healthy, policy(SendMode::Always, 0), 16)
            .unwrap();
        let mut reports = pipeline.subscribe("down").unwrap();

        pipeline.register_observer(BrokenObserver);
        let observer = BatchObserver::default();
        let (batches, starts) = (observer.batches.clone(), observer.starts.clone());
        pipeline.register_observer(observer);

        pipeline.start_session().await;
        pipeline.on_cycle(&ScanCycle::new(
            "r",
            vec![sighting("1", true, 0), sighting("2", true, 0)],
        ));

        let report = tokio::time::timeout(Duration::from_secs(2), reports.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(!report.is_success());
        assert!(pipeline.is_armed());

        pipeline.shutdown().await;
        assert_eq!(sent.lock().unwrap().len(), 2);
        assert_eq!(*batches.lock().unwrap(), vec![2]);
        assert_eq!(starts.load(Ordering::SeqCst), 1);
    }

    /// An empty survivor set dispatches nothing and notifies nobody
    #[tokio::test]
    async fn test_all_malformed_cycle() {
        let mut pipeline = SightingPipeline::default();
        let observer = BatchObserver::default();
        let batches = observer.batches.clone();
        pipeline.register_observer(observer);

        pipeline.start_session().await;
        let report = pipeline
            .on_cycle(&ScanCycle::new("r", vec![malformed(0), malformed(1)]))
            .unwrap();
        assert!(report.is_empty());
        assert_eq!(report.notified_observers, 0);

        pipeline.shutdown().await;
        assert!(batches.lock().unwrap().is_empty());
    }
}

#[cfg(test)]
mod handle_tests {
    use std::sync::atomic::Ordering;

    use contracts::{DeliveryPolicy, ScanCycle, SendMode};
    use pipeline::SightingPipeline;

    use super::support::*;

    /// Runtime add and remove through the cloneable handle
    #[tokio::test]
    async fn test_dynamic_registration() {
        let handle = SightingPipeline::default().spawn();
        let first = CountingSink::new("first");
        let second = CountingSink::new("second");
        let (sent_first, sent_second) = (first.minors.clone(), second.minors.clone());
        let first_closed = first.closed.clone();

        handle
            .register_sink(first, DeliveryPolicy::new(SendMode::Always, 0), 8)
            .await
            .unwrap();
        assert!(handle.start_session().await.unwrap());
        assert!(handle.is_armed());

        handle
            .process_cycle(ScanCycle::new("r", vec![sighting("1", true, 0)]))
            .await
            .unwrap();

        let drained = handle.deregister_sink("first").await.unwrap();
        drained.await.unwrap();
        assert!(first_closed.load(Ordering::SeqCst));

        handle
            .register_sink(second, DeliveryPolicy::new(SendMode::Always, 0), 8)
            .await
            .unwrap();
        handle
            .process_cycle(ScanCycle::new("r", vec![sighting("2", true, 1)]))
            .await
            .unwrap();

        handle.shutdown().await.unwrap();
        assert_eq!(*sent_first.lock().unwrap(), vec!["1"]);
        assert_eq!(*sent_second.lock().unwrap(), vec!["2"]);
        assert!(!handle.is_armed());
        assert!(handle.stats().await.is_err());
    }

    #[tokio::test]
    async fn test_invalid_policy_rejected_at_registration() {
        let handle = SightingPipeline::default().spawn();
        let mut policy = DeliveryPolicy::new(SendMode::Always, 0);
        policy.min_confirmations = 0;

        let err = handle
            .register_sink(CountingSink::new("bad"), policy, 8)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("bad"), "got: {err}");

        let stats = handle.stats().await.unwrap();
        assert!(stats.sinks.is_empty());
        handle.shutdown().await.unwrap();
    }
}

#[cfg(test)]
mod config_tests {
    use std::time::Duration;

    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::CanonicalRecord;
    use ingestion::{MockBeaconScanner, MockScannerConfig};
    use pipeline::SightingPipeline;

    /// relay.toml -> pipeline -> mock scanner -> JSONL file
    #[tokio::test]
    async fn test_config_to_file_sink() {
        let dir = tempfile::tempdir().unwrap();
        let config = format!(
            r#"
[scanner]
scan_period_ms = 10
region = "lobby"

[[sinks]]
name = "archive"
sink_type = "file"
[sinks.policy]
mode = "always"
min_resend_interval_ms = 60000
[sinks.params]
base_path = "{}"

[[sinks]]
name = "firehose"
sink_type = "file"
[sinks.policy]
mode = "location_required"
min_resend_interval_ms = 0
[sinks.params]
base_path = "{}"
"#,
            dir.path().display(),
            dir.path().display()
        );
        let blueprint = ConfigLoader::load_from_str(&config, ConfigFormat::Toml).unwrap();

        let handle = SightingPipeline::from_blueprint(&blueprint)
            .await
            .unwrap()
            .spawn();
        handle.start_session().await.unwrap();

        let scanner = MockBeaconScanner::new(MockScannerConfig {
            region: blueprint.scanner.region.clone(),
            scan_period: Duration::from_millis(blueprint.scanner.scan_period_ms),
            beacon_count: 2,
            location_every: 2,
            max_cycles: Some(3),
            ..Default::default()
        });
        let cycles = scanner.start(4);
        while let Ok(cycle) = cycles.recv().await {
            let report = handle.process_cycle(cycle).await.unwrap().unwrap();
            assert_eq!(report.region, "lobby");
        }
        handle.shutdown().await.unwrap();

        let read = |name: &str| -> Vec<CanonicalRecord> {
            std::fs::read_to_string(dir.path().join(format!("{name}.jsonl")))
                .unwrap()
                .lines()
                .map(|line| serde_json::from_str(line).unwrap())
                .collect()
        };

        // one send per beacon inside the 60 s window
        assert_eq!(read("archive").len(), 2);
        // only minor 0 carries a location, every cycle
        let firehose = read("firehose");
        assert_eq!(firehose.len(), 3);
        assert!(firehose.iter().all(|r| r.identifiers.id3 == "0"));
    }
}
