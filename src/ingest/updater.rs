//! Single writer for telemetry updates
//!
//! The broker task and the simulator only enqueue work; this task is the one
//! place where telemetry reaches the registry.

use bytes::Bytes;
use tokio::sync::mpsc;

use crate::query::BinService;
use crate::telemetry::normalize_bytes;

/// Work item for the updater
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// Raw payload as delivered by the broker
    Message(Bytes),
    /// Apply one simulation step to this bin
    Perturb(String),
}

/// Create the bounded channel feeding an [`Updater`]
pub fn channel(capacity: usize) -> (mpsc::Sender<Inbound>, mpsc::Receiver<Inbound>) {
    mpsc::channel(capacity.max(1))
}

/// Consumes [`Inbound`] items and applies them
pub struct Updater {
    service: BinService,
    rx: mpsc::Receiver<Inbound>,
}

impl Updater {
    pub fn new(service: BinService, rx: mpsc::Receiver<Inbound>) -> Self {
        Self { service, rx }
    }

    /// Run until every sender is dropped
    pub async fn run(mut self) {
        while let Some(item) = self.rx.recv().await {
            self.handle(item).await;
        }
        tracing::debug!("Updater channel closed");
    }

    async fn handle(&self, item: Inbound) {
        match item {
            Inbound::Message(payload) => self.handle_message(&payload).await,
            Inbound::Perturb(id) => {
                if let Err(e) = self.service.perturb(&id).await {
                    tracing::debug!(bin = %id, error = %e, "Simulation step skipped");
                }
            }
        }
    }

    async fn handle_message(&self, payload: &[u8]) {
        let stats = self.service.ingest_stats();
        stats.record_received();

        match normalize_bytes(payload) {
            Ok((id, delta)) => {
                let bin = self.service.ingest(&id, &delta).await;
                tracing::debug!(
                    bin = %bin.id,
                    fill = ?bin.fill_percent,
                    "Telemetry applied"
                );
            }
            Err(e) => {
                stats.record_dropped(&e);
                tracing::warn!(error = %e, bytes = payload.len(), "Dropping telemetry message");
            }
        }
    }
}
