//! Mock beacon scanner
//!
//! Stands in for the radio scanning collaborator: emits one `ScanCycle` per
//! scan period with a fixed population of beacons. Output is deterministic
//! for a given config so tests can count exactly what went through.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_channel::{Receiver, bounded};
use chrono::Utc;
use contracts::{GeoLocation, RawSighting, ScanCycle};
use tracing::{debug, trace};

/// Proximity UUID every mock beacon advertises
pub const MOCK_PROXIMITY_UUID: &str = "2f234454-cf6d-4a0f-adf2-f4911ba9ffa6";

/// Mock scanner configuration
#[derive(Debug, Clone)]
pub struct MockScannerConfig {
    /// Region reported with every cycle
    pub region: String,

    /// Delay between cycles
    pub scan_period: Duration,

    /// Beacons visible per cycle
    pub beacon_count: u16,

    /// Fraction of sightings emitted with a broken identifier triplet
    pub malformed_rate: f64,

    /// Every n-th beacon carries a device location (0 = none do)
    pub location_every: u16,

    /// Stop after this many cycles (`None` = until stopped)
    pub max_cycles: Option<u64>,
}

impl Default for MockScannerConfig {
    fn default() -> Self {
        Self {
            region: "AllBeaconsRegion".to_string(),
            scan_period: Duration::from_millis(1100),
            beacon_count: 4,
            malformed_rate: 0.0,
            location_every: 1,
            max_cycles: None,
        }
    }
}

/// Mock beacon scanner
pub struct MockBeaconScanner {
    config: MockScannerConfig,
    running: Arc<AtomicBool>,
}

impl MockBeaconScanner {
    pub fn new(config: MockScannerConfig) -> Self {
        Self {
            config,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn config(&self) -> &MockScannerConfig {
        &self.config
    }

    /// Build cycle number `cycle` without any timing
    pub fn generate_cycle(&self, cycle: u64) -> ScanCycle {
        let now = Utc::now();
        let count = u64::from(self.config.beacon_count);
        let sightings = (0..self.config.beacon_count)
            .map(|minor| {
                let seq = cycle * count + u64::from(minor);
                let mut sighting = RawSighting {
                    identifiers: vec![
                        MOCK_PROXIMITY_UUID.to_string(),
                        "1".to_string(),
                        minor.to_string(),
                    ],
                    rssi: -55.0 - f64::from(minor % 40),
                    distance: 0.5 + f64::from(minor) * 0.75,
                    location: None,
                    bluetooth_address: Some(format!("c4:7c:8d:00:{:02x}:{:02x}", minor >> 8, minor & 0xff)),
                    tx_power: Some(-59),
                    captured_at: now,
                };

                if self.config.location_every > 0 && minor % self.config.location_every == 0 {
                    sighting.location = Some(GeoLocation::new(
                        49.2578 + f64::from(minor) * 1e-4,
                        7.0455 + (cycle % 100) as f64 * 1e-5,
                    ));
                }
                if is_malformed(seq, self.config.malformed_rate) {
                    sighting.identifiers.truncate(1);
                }
                sighting
            })
            .collect();

        ScanCycle::new(self.config.region.clone(), sightings)
    }

    /// Start emitting cycles, returns the receiving end
    pub fn start(&self, channel_capacity: usize) -> Receiver<ScanCycle> {
        let (tx, rx) = bounded(channel_capacity.max(1));
        let running = self.running.clone();
        let scanner = Self {
            config: self.config.clone(),
            running: running.clone(),
        };

        running.store(true, Ordering::SeqCst);

        tokio::spawn(async move {
            let mut cycle: u64 = 0;

            debug!(
                region = %scanner.config.region,
                beacons = scanner.config.beacon_count,
                period_ms = scanner.config.scan_period.as_millis() as u64,
                "mock beacon scanner started"
            );

            while running.load(Ordering::Relaxed) {
                if scanner.config.max_cycles.is_some_and(|max| cycle >= max) {
                    break;
                }

                let scan = scanner.generate_cycle(cycle);
                let sightings = scan.sightings.len();
                if tx.send(scan).await.is_err() {
                    debug!("mock scanner channel closed");
                    break;
                }
                trace!(cycle, sightings, "mock scan cycle sent");

                cycle += 1;
                tokio::time::sleep(scanner.config.scan_period).await;
            }

            running.store(false, Ordering::SeqCst);
            debug!(cycles = cycle, "mock beacon scanner stopped");
        });

        rx
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }
}

/// Spread `rate` evenly over the sighting sequence
fn is_malformed(seq: u64, rate: f64) -> bool {
    if rate <= 0.0 {
        return false;
    }
    let rate = rate.min(1.0);
    ((seq + 1) as f64 * rate).floor() > (seq as f64 * rate).floor()
}
