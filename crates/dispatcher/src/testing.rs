//! Test doubles shared by the unit tests of this crate

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{TimeZone, Utc};
use contracts::{
    Ack, BeaconIdentifiers, BeaconObserver, CanonicalRecord, GeoLocation, ObserverError,
    RecordSink, TransportError,
};

/// Record for beacon `minor`, captured at a fixed instant
pub fn record(minor: u32, location: bool) -> CanonicalRecord {
    let identifiers =
        BeaconIdentifiers::new("2f234454-cf6d-4a0f-adf2-f4911ba9ffa6", "1", minor.to_string());
    let captured_at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
    CanonicalRecord {
        identity_key: identifiers.identity_key(),
        identifiers,
        rssi: -60,
        distance: 1.5,
        location: location.then(|| GeoLocation::new(49.2578, 7.0455)),
        bluetooth_address: None,
        tx_power: Some(-59),
        captured_at,
        timestamp: "2024-05-01T12:00:00.000Z".into(),
    }
}

pub struct MockSink {
    name: String,
    transmitted: Arc<Mutex<Vec<CanonicalRecord>>>,
    closed: Arc<AtomicBool>,
    fail: bool,
    delay: Duration,
}

impl MockSink {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            transmitted: Arc::new(Mutex::new(Vec::new())),
            closed: Arc::new(AtomicBool::new(false)),
            fail: false,
            delay: Duration::ZERO,
        }
    }

    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn transmitted(&self) -> Arc<Mutex<Vec<CanonicalRecord>>> {
        Arc::clone(&self.transmitted)
    }

    pub fn closed_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.closed)
    }
}

impl RecordSink for MockSink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn transmit(&mut self, record: &CanonicalRecord) -> Result<Ack, TransportError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.fail {
            return Err(TransportError::send(&self.name, "mock failure"));
        }
        self.transmitted.lock().unwrap().push(record.clone());
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

/// Observer that records every callback as a string
pub struct RecordingObserver {
    name: String,
    pub events: Arc<Mutex<Vec<String>>>,
    fail_updates: bool,
    panic_on_update: bool,
}

impl RecordingObserver {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            events: Arc::new(Mutex::new(Vec::new())),
            fail_updates: false,
            panic_on_update: false,
        }
    }

    pub fn failing(mut self) -> Self {
        self.fail_updates = true;
        self
    }

    pub fn panicking(mut self) -> Self {
        self.panic_on_update = true;
        self
    }
}

impl BeaconObserver for RecordingObserver {
    fn name(&self) -> &str {
        &self.name
    }

    fn on_start(&mut self) -> Result<(), ObserverError> {
        self.events.lock().unwrap().push("start".into());
        Ok(())
    }

    fn on_update(&mut self, records: &[CanonicalRecord]) -> Result<(), ObserverError> {
        self.events
            .lock()
            .unwrap()
            .push(format!("update:{}", records.len()));
        if self.panic_on_update {
            panic!("observer blew up");
        }
        if self.fail_updates {
            return Err(ObserverError::callback(&self.name, "mock failure"));
        }
        Ok(())
    }

    fn on_stop(&mut self) -> Result<(), ObserverError> {
        self.events.lock().unwrap().push("stop".into());
        Ok(())
    }
}
