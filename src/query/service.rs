//! Bin query and admin service

use std::sync::Arc;

use crate::error::QueryError;
use crate::fanout::FanoutHub;
use crate::ingest::simulator::perturb;
use crate::registry::{Bin, BinRegistry, Registration};
use crate::stats::{IngestStats, IngestStatsSnapshot};
use crate::telemetry::ReadingDelta;

use super::request::AdminUpdate;

/// Handle shared by the updater, the HTTP routes, and any other caller
///
/// Every mutation goes through the registry and is then broadcast.
#[derive(Clone)]
pub struct BinService {
    registry: Arc<BinRegistry>,
    hub: FanoutHub,
    stats: Arc<IngestStats>,
}

impl BinService {
    pub fn new(registry: Arc<BinRegistry>, hub: FanoutHub, stats: Arc<IngestStats>) -> Self {
        Self {
            registry,
            hub,
            stats,
        }
    }

    pub fn registry(&self) -> &Arc<BinRegistry> {
        &self.registry
    }

    pub fn hub(&self) -> &FanoutHub {
        &self.hub
    }

    pub fn ingest_stats(&self) -> &Arc<IngestStats> {
        &self.stats
    }

    /// Apply a normalized telemetry reading and broadcast the result
    pub async fn ingest(&self, id: &str, delta: &ReadingDelta) -> Bin {
        let bin = self.registry.upsert(id, delta).await;
        self.stats.record_applied();
        self.publish(&bin);
        bin
    }

    /// Run one simulation step on an existing bin
    pub async fn perturb(&self, id: &str) -> Result<Bin, QueryError> {
        let bin = self
            .registry
            .modify(id, |bin| perturb(bin, &mut rand::rng()))
            .await?;

        self.stats.record_simulated();
        self.publish(&bin);
        Ok(bin)
    }

    /// The most recently updated bin
    pub async fn latest(&self) -> Result<Bin, QueryError> {
        self.registry.latest().await.ok_or(QueryError::NoDataYet)
    }

    pub async fn list_all(&self) -> Vec<Bin> {
        self.registry.list().await
    }

    pub async fn get(&self, id: &str) -> Result<Bin, QueryError> {
        Ok(self.registry.get(id).await?)
    }

    /// Manual update of an existing bin
    pub async fn update_fields(&self, id: &str, update: &AdminUpdate) -> Result<Bin, QueryError> {
        let delta = update.to_delta();
        let bin = self.registry.modify(id, |_| delta).await?;

        tracing::info!(bin = %id, "Bin updated manually");
        self.stats.record_admin();
        self.publish(&bin);
        Ok(bin)
    }

    /// Manual simulated update
    ///
    /// With no fields given, one random perturbation step is applied.
    pub async fn simulate(&self, id: &str, update: Option<&AdminUpdate>) -> Result<Bin, QueryError> {
        match update.filter(|u| !u.is_empty()) {
            Some(update) => self.update_fields(id, update).await,
            None => self.perturb(id).await,
        }
    }

    /// Register a bin; an existing bin is returned unchanged
    pub async fn register_bin(&self, id: &str, registration: &Registration) -> Bin {
        let (bin, created) = self.registry.register(id, registration).await;
        if created {
            self.publish(&bin);
        }
        bin
    }

    pub fn stats(&self) -> IngestStatsSnapshot {
        self.stats.snapshot()
    }

    fn publish(&self, bin: &Bin) {
        let receivers = self.hub.broadcast(bin);
        self.stats.record_broadcast(receivers);
    }
}

impl Default for BinService {
    fn default() -> Self {
        Self::new(
            Arc::new(BinRegistry::new()),
            FanoutHub::new(),
            Arc::new(IngestStats::new()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_latest_before_any_data() {
        let service = BinService::default();
        assert_eq!(service.latest().await, Err(QueryError::NoDataYet));
        assert!(service.list_all().await.is_empty());
    }

    #[tokio::test]
    async fn test_ingest_broadcasts() {
        let service = BinService::default();
        let mut sub = service.hub().subscribe();

        let delta = ReadingDelta::new().distance(10.0);
        let bin = service.ingest("Bin_009", &delta).await;
        assert_eq!(bin.fill_percent, Some(74));

        let event = sub.recv().await.unwrap();
        assert_eq!(event.bin_id, "Bin_009");
        assert_eq!(event.fill_percent, Some(74));

        assert_eq!(service.latest().await.unwrap().id, "Bin_009");
        let stats = service.stats();
        assert_eq!(stats.readings_applied, 1);
        assert_eq!(stats.events_broadcast, 1);
    }

    #[tokio::test]
    async fn test_update_missing_bin() {
        let service = BinService::default();
        let update = AdminUpdate {
            fill_percent: Some(50.0),
            ..Default::default()
        };

        let err = service.update_fields("missing-id", &update).await.unwrap_err();
        assert_eq!(err, QueryError::NotFound("missing-id".into()));
        assert!(service.list_all().await.is_empty());
    }

    #[tokio::test]
    async fn test_update_fields_is_percent() {
        let service = BinService::default();
        service
            .register_bin("Bin_001", &Registration::default())
            .await;

        let update = AdminUpdate {
            fill_percent: Some(150.0),
            temperature: Some(30.0),
            ..Default::default()
        };
        let bin = service.update_fields("Bin_001", &update).await.unwrap();
        assert_eq!(bin.fill_percent, Some(100));
        assert_eq!(bin.raw_distance, None);
        assert_eq!(bin.temperature, Some(30.0));
    }

    #[tokio::test]
    async fn test_simulate_without_body_perturbs() {
        let service = BinService::default();
        service.registry().seed_demo().await;

        let before = service.get("Bin_002").await.unwrap();
        let after = service.simulate("Bin_002", None).await.unwrap();

        let (b, a) = (before.fill_percent.unwrap(), after.fill_percent.unwrap());
        assert!(a.abs_diff(b) <= 10);
        assert!(after.latitude.is_some());
        assert_eq!(service.stats().simulated_updates, 1);

        let err = service.simulate("nope", None).await.unwrap_err();
        assert_eq!(err, QueryError::NotFound("nope".into()));
    }

    #[tokio::test]
    async fn test_simulate_with_empty_body_perturbs() {
        let service = BinService::default();
        service.registry().seed_demo().await;

        service
            .simulate("Bin_001", Some(&AdminUpdate::default()))
            .await
            .unwrap();
        assert_eq!(service.stats().simulated_updates, 1);
        assert_eq!(service.stats().admin_updates, 0);
    }

    #[tokio::test]
    async fn test_register_broadcasts_only_once() {
        let service = BinService::default();
        let mut sub = service.hub().subscribe();

        let first = service
            .register_bin("Bin_100", &Registration::with_height(50.0))
            .await;
        let second = service
            .register_bin("Bin_100", &Registration::with_height(80.0))
            .await;

        assert_eq!(first, second);
        assert_eq!(second.height, 50.0);

        assert!(sub.recv().await.is_some());
        assert!(sub.try_recv().is_none());
    }
}
