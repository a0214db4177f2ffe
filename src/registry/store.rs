//! Bin registry implementation
//!
//! The single authoritative map from bin id to current state.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use tokio::sync::RwLock;

use crate::telemetry::ReadingDelta;

use super::bin::{Bin, Registration};
use super::config::RegistryConfig;
use super::error::RegistryError;

struct Inner {
    bins: HashMap<String, Bin>,
    /// Ids in insertion order
    order: Vec<String>,
    /// Id of the most recently created or mutated bin
    latest: Option<String>,
}

impl Inner {
    fn insert(&mut self, bin: Bin) {
        self.order.push(bin.id.clone());
        self.bins.insert(bin.id.clone(), bin);
    }
}

/// Central registry for all known bins
///
/// Thread-safe via `RwLock`. Every mutation completes under the write lock,
/// so readers never observe a half-applied delta.
pub struct BinRegistry {
    inner: RwLock<Inner>,

    config: RegistryConfig,
}

impl BinRegistry {
    /// Create a new registry with default configuration
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    /// Create a new registry with custom configuration
    pub fn with_config(config: RegistryConfig) -> Self {
        Self {
            inner: RwLock::new(Inner {
                bins: HashMap::new(),
                order: Vec::new(),
                latest: None,
            }),
            config,
        }
    }

    /// Get the registry configuration
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Apply a delta to a bin, creating it if unknown
    ///
    /// Returns the resulting bin.
    pub async fn upsert(&self, id: &str, delta: &ReadingDelta) -> Bin {
        let mut guard = self.inner.write().await;
        let inner = &mut *guard;

        let bin = match inner.bins.entry(id.to_string()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                tracing::info!(bin = %id, "Bin created from telemetry");
                inner.order.push(id.to_string());
                entry.insert(Bin::new(id, self.config.default_height))
            }
        };

        bin.apply(delta);
        let snapshot = bin.clone();

        inner.latest = Some(id.to_string());
        snapshot
    }

    /// Compute a delta from the current state and apply it atomically
    pub async fn modify<F>(&self, id: &str, f: F) -> Result<Bin, RegistryError>
    where
        F: FnOnce(&Bin) -> ReadingDelta,
    {
        let mut inner = self.inner.write().await;

        let bin = inner
            .bins
            .get_mut(id)
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))?;

        let delta = f(bin);
        bin.apply(&delta);
        let snapshot = bin.clone();

        inner.latest = Some(id.to_string());
        Ok(snapshot)
    }

    /// Register a bin
    ///
    /// Idempotent: an existing bin is returned unchanged. The flag is `true`
    /// when the bin was newly created.
    pub async fn register(&self, id: &str, registration: &Registration) -> (Bin, bool) {
        let mut inner = self.inner.write().await;

        if let Some(existing) = inner.bins.get(id) {
            return (existing.clone(), false);
        }

        let bin = Bin::from_registration(id, registration, self.config.default_height);
        inner.insert(bin.clone());
        inner.latest = Some(id.to_string());

        tracing::info!(bin = %id, height = bin.height, "Bin registered");

        (bin, true)
    }

    /// Look up a single bin
    pub async fn get(&self, id: &str) -> Result<Bin, RegistryError> {
        self.inner
            .read()
            .await
            .bins
            .get(id)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))
    }

    /// Snapshot of all bins in insertion order
    pub async fn list(&self) -> Vec<Bin> {
        let inner = self.inner.read().await;
        inner
            .order
            .iter()
            .filter_map(|id| inner.bins.get(id).cloned())
            .collect()
    }

    /// Ids of all bins in insertion order
    pub async fn ids(&self) -> Vec<String> {
        self.inner.read().await.order.clone()
    }

    /// The most recently created or mutated bin
    pub async fn latest(&self) -> Option<Bin> {
        let inner = self.inner.read().await;
        inner
            .latest
            .as_ref()
            .and_then(|id| inner.bins.get(id).cloned())
    }

    /// Check if a bin exists
    pub async fn contains(&self, id: &str) -> bool {
        self.inner.read().await.bins.contains_key(id)
    }

    /// Get total number of bins
    pub async fn len(&self) -> usize {
        self.inner.read().await.bins.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Register the demo bins `Bin_001` to `Bin_003`
    pub async fn seed_demo(&self) {
        let demo = [
            ("Bin_001", 10.0, 25.0, 29.0, 80.0),
            ("Bin_002", 40.0, 27.0, 29.01, 80.01),
            ("Bin_003", 75.0, 29.0, 28.99, 79.99),
        ];

        for (id, fill, temperature, latitude, longitude) in demo {
            let registration = Registration {
                height: Some(self.config.default_height),
                fill_percent: Some(fill),
                temperature: Some(temperature),
                latitude: Some(latitude),
                longitude: Some(longitude),
            };
            self.register(id, &registration).await;
        }
    }
}

impl Default for BinRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[tokio::test]
    async fn test_upsert_creates_and_converts_distance() {
        let registry = BinRegistry::new();

        let bin = registry
            .upsert("Bin_009", &ReadingDelta::new().distance(10.0).height(38.0))
            .await;
        assert_eq!(bin.fill_percent, Some(74));

        let bin = registry.get("Bin_009").await.unwrap();
        assert_eq!(bin.fill_percent, Some(74));
        assert_eq!(bin.raw_distance, Some(10.0));
    }

    #[tokio::test]
    async fn test_upsert_is_idempotent() {
        let registry = BinRegistry::new();
        let delta = ReadingDelta::new().distance(12.0).temperature(24.0);

        let once = registry.upsert("b", &delta).await;
        let twice = registry.upsert("b", &delta).await;

        assert_eq!(once, twice);
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_upsert_uses_bin_height() {
        let registry = BinRegistry::new();
        registry.register("tall", &Registration::with_height(200.0)).await;

        let bin = registry
            .upsert("tall", &ReadingDelta::new().distance(150.0))
            .await;
        assert_eq!(bin.fill_percent, Some(25));
    }

    #[tokio::test]
    async fn test_height_only_upsert_recalibrates_fill() {
        let registry = BinRegistry::new();
        registry.upsert("b", &ReadingDelta::new().distance(10.0)).await;

        let bin = registry.upsert("b", &ReadingDelta::new().height(100.0)).await;
        assert_eq!(bin.raw_distance, Some(10.0));
        assert_eq!(bin.height, 100.0);
        assert_eq!(bin.fill_percent, Some(90));
        assert_eq!(registry.get("b").await.unwrap(), bin);
    }

    #[tokio::test]
    async fn test_register_zero_height_uses_configured_default() {
        let registry = BinRegistry::with_config(RegistryConfig::default().default_height(55.0));
        let (bin, created) = registry
            .register("b", &Registration::with_height(0.0))
            .await;

        assert!(created);
        assert_eq!(bin.height, 55.0);
    }

    #[tokio::test]
    async fn test_fill_always_in_range() {
        let registry = BinRegistry::new();
        for v in [-1e9, -50.0, 0.0, 37.9, 101.0, 1e9] {
            for delta in [
                ReadingDelta::new().distance(v),
                ReadingDelta::new().percent(v),
            ] {
                let bin = registry.upsert("b", &delta).await;
                let fill = bin.fill_percent.unwrap();
                assert!(fill <= 100, "fill {fill} out of range for {v}");
            }
        }
    }

    #[tokio::test]
    async fn test_get_unknown() {
        let registry = BinRegistry::new();
        assert_eq!(
            registry.get("nope").await,
            Err(RegistryError::NotFound("nope".into()))
        );
    }

    #[tokio::test]
    async fn test_list_keeps_insertion_order() {
        let registry = BinRegistry::new();
        for id in ["c", "a", "b"] {
            registry.upsert(id, &ReadingDelta::new().percent(1.0)).await;
        }
        // Updating an early bin does not reorder
        registry.upsert("c", &ReadingDelta::new().percent(99.0)).await;

        let ids: Vec<_> = registry.list().await.into_iter().map(|b| b.id).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
        assert_eq!(registry.ids().await, vec!["c", "a", "b"]);
    }

    #[tokio::test]
    async fn test_list_is_snapshot() {
        let registry = BinRegistry::new();
        registry.upsert("a", &ReadingDelta::new().percent(10.0)).await;

        let before = registry.list().await;
        registry.upsert("a", &ReadingDelta::new().percent(90.0)).await;

        assert_eq!(before[0].fill_percent, Some(10));
        assert_eq!(registry.list().await[0].fill_percent, Some(90));
    }

    #[tokio::test]
    async fn test_register_idempotent() {
        let registry = BinRegistry::new();

        let (first, created) = registry
            .register("Bin_100", &Registration::with_height(50.0))
            .await;
        assert!(created);

        let (second, created) = registry
            .register("Bin_100", &Registration::with_height(90.0))
            .await;
        assert!(!created);
        assert_eq!(first, second);
        assert_eq!(second.height, 50.0);
    }

    #[tokio::test]
    async fn test_modify_unknown() {
        let registry = BinRegistry::new();
        let result = registry.modify("ghost", |_| ReadingDelta::new()).await;
        assert_eq!(result, Err(RegistryError::NotFound("ghost".into())));
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_modify_sees_current_state() {
        let registry = BinRegistry::new();
        registry.upsert("b", &ReadingDelta::new().percent(40.0)).await;

        let bin = registry
            .modify("b", |bin| {
                let current = bin.fill_percent.unwrap_or(0) as f64;
                ReadingDelta::new().percent(current + 5.0)
            })
            .await
            .unwrap();
        assert_eq!(bin.fill_percent, Some(45));
    }

    #[tokio::test]
    async fn test_latest_tracks_mutations() {
        let registry = BinRegistry::new();
        assert!(registry.latest().await.is_none());

        registry.upsert("a", &ReadingDelta::new().percent(1.0)).await;
        registry.upsert("b", &ReadingDelta::new().percent(2.0)).await;
        assert_eq!(registry.latest().await.unwrap().id, "b");

        registry.upsert("a", &ReadingDelta::new().percent(3.0)).await;
        let latest = registry.latest().await.unwrap();
        assert_eq!(latest.id, "a");
        assert_eq!(latest.fill_percent, Some(3));
    }

    #[tokio::test]
    async fn test_seed_demo() {
        let registry = BinRegistry::new();
        registry.seed_demo().await;
        registry.seed_demo().await;

        let bins = registry.list().await;
        assert_eq!(bins.len(), 3);
        assert_eq!(bins[0].id, "Bin_001");
        assert_eq!(bins[1].fill_percent, Some(40));
        assert_eq!(bins[2].latitude, Some(28.99));
    }

    #[tokio::test]
    async fn test_concurrent_upserts() {
        let registry = Arc::new(BinRegistry::new());

        let mut handles = Vec::new();
        for i in 0..32 {
            let registry = Arc::clone(&registry);
            handles.push(tokio::spawn(async move {
                let id = format!("bin_{}", i % 4);
                registry
                    .upsert(&id, &ReadingDelta::new().distance(i as f64))
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(registry.len().await, 4);
        for bin in registry.list().await {
            // Fill and distance always come from the same write
            let distance = bin.raw_distance.unwrap();
            let expected = crate::telemetry::distance_to_percent(distance, bin.height).unwrap();
            assert_eq!(bin.fill_percent, Some(expected));
        }
    }
}
