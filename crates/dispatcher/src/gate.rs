//! DeliveryGate - per-sink send decision
//!
//! Order of checks for one record:
//! 1. recency: last send for the identity key within `min_resend_interval`
//!    suppresses, without looking at the mode and without touching history
//! 2. mode: `always` / `never` / `location_required`
//! 3. a positive decision stamps `now` into the history
//!
//! A record rejected by policy never opens a throttle window.

use std::collections::HashMap;

use chrono::{DateTime, TimeDelta, Utc};
use contracts::{CanonicalRecord, DeliveryPolicy, HistoryConfig, IdentityKey, SendMode, SinkId};
use metrics::{counter, gauge};
use tracing::trace;

/// Result of one gate evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    /// Transmit now
    Send,
    /// Same beacon was sent too recently
    Throttled,
    /// Policy mode excludes this record
    PolicyRejected,
}

impl GateDecision {
    pub fn is_send(&self) -> bool {
        matches!(self, Self::Send)
    }

    /// Label for metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Send => "send",
            Self::Throttled => "throttled",
            Self::PolicyRejected => "policy_rejected",
        }
    }
}

/// Last-sent timestamps per identity key, bounded
///
/// Past `max_entries`, entries older than the retention window are swept,
/// then the oldest are evicted until the map fits.
#[derive(Debug)]
pub struct DeliveryHistory {
    entries: HashMap<IdentityKey, DateTime<Utc>>,
    max_entries: usize,
    /// `None` when the window does not fit a `TimeDelta`; sweeping is skipped
    retention: Option<TimeDelta>,
}

impl DeliveryHistory {
    pub fn new(config: &HistoryConfig, min_resend_interval: TimeDelta) -> Self {
        Self {
            entries: HashMap::new(),
            max_entries: config.max_entries.max(1),
            retention: i32::try_from(config.retention_factor.max(1))
                .ok()
                .and_then(|factor| min_resend_interval.checked_mul(factor)),
        }
    }

    pub fn last_sent(&self, key: &IdentityKey) -> Option<DateTime<Utc>> {
        self.entries.get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    /// Stamp `now` for `key`, then enforce the bound
    pub fn record(&mut self, key: IdentityKey, now: DateTime<Utc>) {
        self.entries.insert(key, now);
        if self.entries.len() > self.max_entries {
            self.sweep(now);
            self.evict_oldest();
        }
    }

    /// Drop entries that can no longer throttle anything
    pub fn sweep(&mut self, now: DateTime<Utc>) -> usize {
        let Some(cutoff) = self
            .retention
            .and_then(|retention| now.checked_sub_signed(retention))
        else {
            return 0;
        };
        let before = self.entries.len();
        self.entries.retain(|_, last| *last >= cutoff);
        before - self.entries.len()
    }

    fn evict_oldest(&mut self) {
        let excess = self.entries.len().saturating_sub(self.max_entries);
        if excess == 0 {
            return;
        }

        let mut by_age: Vec<(DateTime<Utc>, IdentityKey)> =
            self.entries.iter().map(|(k, t)| (*t, *k)).collect();
        by_age.select_nth_unstable(excess - 1);
        for (_, key) in &by_age[..excess] {
            self.entries.remove(key);
        }
    }
}

/// Per-sink dedup / throttle gate
///
/// Owned by exactly one dispatcher entry; `&mut self` is the single-writer
/// guarantee for the history.
#[derive(Debug)]
pub struct DeliveryGate {
    sink: SinkId,
    policy: DeliveryPolicy,
    history: DeliveryHistory,
}

impl DeliveryGate {
    pub fn new(sink: SinkId, policy: DeliveryPolicy, history: &HistoryConfig) -> Self {
        let history = DeliveryHistory::new(history, policy.min_resend_interval());
        Self {
            sink,
            policy,
            history,
        }
    }

    pub fn policy(&self) -> &DeliveryPolicy {
        &self.policy
    }

    pub fn history(&self) -> &DeliveryHistory {
        &self.history
    }

    /// Decide whether `record` goes out now, stamping history on `true`
    pub fn should_send(&mut self, record: &CanonicalRecord, now: DateTime<Utc>) -> bool {
        self.evaluate(record, now).is_send()
    }

    /// Same as [`should_send`](Self::should_send) but says why
    pub fn evaluate(&mut self, record: &CanonicalRecord, now: DateTime<Utc>) -> GateDecision {
        let decision = self.decide(record, now);

        if decision.is_send() {
            self.history.record(record.identity_key, now);
            gauge!("beacon_relay_history_size", "sink" => self.sink.to_string())
                .set(self.history.len() as f64);
        }
        counter!(
            "beacon_relay_gate_decisions_total",
            "sink" => self.sink.to_string(),
            "decision" => decision.as_str()
        )
        .increment(1);
        trace!(
            sink = %self.sink,
            identity_key = %record.identity_key,
            decision = decision.as_str(),
            "gate decision"
        );

        decision
    }

    fn decide(&self, record: &CanonicalRecord, now: DateTime<Utc>) -> GateDecision {
        if let Some(last) = self.history.last_sent(&record.identity_key) {
            // negative elapsed (out of order capture) is suppressed too
            if now - last < self.policy.min_resend_interval() {
                return GateDecision::Throttled;
            }
        }

        match self.policy.mode {
            SendMode::Always => GateDecision::Send,
            SendMode::Never => GateDecision::PolicyRejected,
            SendMode::LocationRequired if record.has_location() => GateDecision::Send,
            SendMode::LocationRequired => GateDecision::PolicyRejected,
        }
    }
}
