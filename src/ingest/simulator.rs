//! Synthetic telemetry for when no broker is available

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::sync::mpsc;

use crate::registry::{Bin, BinRegistry};
use crate::telemetry::ReadingDelta;

use super::updater::Inbound;

/// Maximum fill change per step, in percentage points
pub const FILL_JITTER: f64 = 10.0;

/// Maximum temperature change per step, in °C
pub const TEMPERATURE_JITTER: f64 = 2.0;

/// Simulated temperatures stay within this range
pub const TEMPERATURE_RANGE: (f64, f64) = (-20.0, 80.0);

/// Maximum coordinate change per step, in degrees
pub const COORDINATE_JITTER: f64 = 0.00025;

/// One random walk step from the current state of `bin`
///
/// Absent temperature and coordinates stay absent. An unknown fill level
/// starts from zero.
pub fn perturb<R: Rng + ?Sized>(bin: &Bin, rng: &mut R) -> ReadingDelta {
    let fill = f64::from(bin.fill_percent.unwrap_or(0));
    let fill = (fill + rng.random_range(-FILL_JITTER..=FILL_JITTER))
        .round()
        .clamp(0.0, 100.0);

    let mut delta = ReadingDelta::new().percent(fill);

    delta.temperature = bin.temperature.map(|t| {
        let (lo, hi) = TEMPERATURE_RANGE;
        round_to(t + rng.random_range(-TEMPERATURE_JITTER..=TEMPERATURE_JITTER), 1).clamp(lo, hi)
    });
    delta.latitude = bin
        .latitude
        .map(|v| round_to(v + rng.random_range(-COORDINATE_JITTER..=COORDINATE_JITTER), 6));
    delta.longitude = bin
        .longitude
        .map(|v| round_to(v + rng.random_range(-COORDINATE_JITTER..=COORDINATE_JITTER), 6));

    delta
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Periodically asks the updater to perturb a random registered bin
pub struct Simulator {
    registry: Arc<BinRegistry>,
    tx: mpsc::Sender<Inbound>,
    interval: Duration,
}

impl Simulator {
    pub fn new(registry: Arc<BinRegistry>, tx: mpsc::Sender<Inbound>, interval: Duration) -> Self {
        Self {
            registry,
            tx,
            interval,
        }
    }

    /// Run until the updater goes away
    pub async fn run(self) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // First tick completes immediately
        ticker.tick().await;

        tracing::info!(
            interval_ms = self.interval.as_millis() as u64,
            "Simulation mode active"
        );

        loop {
            ticker.tick().await;

            let ids = self.registry.ids().await;
            if ids.is_empty() {
                tracing::trace!("No bins to simulate");
                continue;
            }

            let id = {
                let mut rng = rand::rng();
                ids[rng.random_range(0..ids.len())].clone()
            };

            if self.tx.send(Inbound::Perturb(id)).await.is_err() {
                tracing::debug!("Updater closed, stopping simulator");
                break;
            }
        }
    }
}
