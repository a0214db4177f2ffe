//! Ingestion statistics

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::error::IngestError;

/// Live counters updated from the ingestion path
#[derive(Debug)]
pub struct IngestStats {
    started_at: Instant,
    messages_received: AtomicU64,
    readings_applied: AtomicU64,
    simulated_updates: AtomicU64,
    admin_updates: AtomicU64,
    dropped_malformed: AtomicU64,
    dropped_unidentified: AtomicU64,
    dropped_invalid: AtomicU64,
    events_broadcast: AtomicU64,
}

impl IngestStats {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            messages_received: AtomicU64::new(0),
            readings_applied: AtomicU64::new(0),
            simulated_updates: AtomicU64::new(0),
            admin_updates: AtomicU64::new(0),
            dropped_malformed: AtomicU64::new(0),
            dropped_unidentified: AtomicU64::new(0),
            dropped_invalid: AtomicU64::new(0),
            events_broadcast: AtomicU64::new(0),
        }
    }

    /// A raw message arrived from the broker
    pub fn record_received(&self) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
    }

    /// A telemetry reading was applied to the registry
    pub fn record_applied(&self) {
        self.readings_applied.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_simulated(&self) {
        self.simulated_updates.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_admin(&self) {
        self.admin_updates.fetch_add(1, Ordering::Relaxed);
    }

    /// A message was dropped
    pub fn record_dropped(&self, reason: &IngestError) {
        let counter = match reason {
            IngestError::MalformedPayload(_) => &self.dropped_malformed,
            IngestError::UnidentifiedPayload => &self.dropped_unidentified,
            IngestError::InvalidReading { .. } => &self.dropped_invalid,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// An event was queued for `receivers` observers
    pub fn record_broadcast(&self, receivers: usize) {
        self.events_broadcast
            .fetch_add(receivers as u64, Ordering::Relaxed);
    }

    /// Time since the counters were created
    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Point-in-time copy of all counters
    pub fn snapshot(&self) -> IngestStatsSnapshot {
        IngestStatsSnapshot {
            uptime_secs: self.uptime().as_secs(),
            messages_received: self.messages_received.load(Ordering::Relaxed),
            readings_applied: self.readings_applied.load(Ordering::Relaxed),
            simulated_updates: self.simulated_updates.load(Ordering::Relaxed),
            admin_updates: self.admin_updates.load(Ordering::Relaxed),
            dropped_malformed: self.dropped_malformed.load(Ordering::Relaxed),
            dropped_unidentified: self.dropped_unidentified.load(Ordering::Relaxed),
            dropped_invalid: self.dropped_invalid.load(Ordering::Relaxed),
            events_broadcast: self.events_broadcast.load(Ordering::Relaxed),
        }
    }
}

impl Default for IngestStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Serializable copy of [`IngestStats`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestStatsSnapshot {
    pub uptime_secs: u64,
    pub messages_received: u64,
    pub readings_applied: u64,
    pub simulated_updates: u64,
    pub admin_updates: u64,
    pub dropped_malformed: u64,
    pub dropped_unidentified: u64,
    pub dropped_invalid: u64,
    /// Sum over events of the observers each was queued for
    pub events_broadcast: u64,
}

impl IngestStatsSnapshot {
    /// Total messages dropped for any reason
    pub fn dropped(&self) -> u64 {
        self.dropped_malformed + self.dropped_unidentified + self.dropped_invalid
    }
}
