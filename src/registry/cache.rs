//! Snapshot cache of deployed registry reads.
//!
//! Callers own the cache and pass it by reference; nothing is cached
//! process-wide. Writes must `invalidate` the entries they change.

use crate::registry::backend::DeployedOperation;
use crate::utils::Network;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;

/// Cache key: one operation of one deployed registry on one network.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SnapshotKey {
    pub network: Network,
    /// `RegistryBackend::registry_id` of the registry that was read.
    pub registry: String,
    pub operation: String,
}

impl SnapshotKey {
    pub fn new(network: Network, registry: &str, operation: &str) -> Self {
        Self {
            network,
            registry: registry.to_string(),
            operation: operation.to_string(),
        }
    }
}

/// Last observed registry state per operation. A cached `None` records that
/// the operation was not registered.
#[derive(Debug, Default)]
pub struct RegistrySnapshotCache {
    entries: RwLock<HashMap<SnapshotKey, Option<DeployedOperation>>>,
    hits: AtomicUsize,
    misses: AtomicUsize,
}

impl RegistrySnapshotCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, key: &SnapshotKey) -> Option<Option<DeployedOperation>> {
        let cached = self.entries.read().await.get(key).cloned();
        if cached.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
        cached
    }

    pub async fn insert(&self, key: SnapshotKey, snapshot: Option<DeployedOperation>) {
        self.entries.write().await.insert(key, snapshot);
    }

    /// Drop one entry. Returns whether it was cached.
    pub async fn invalidate(&self, key: &SnapshotKey) -> bool {
        let removed = self.entries.write().await.remove(key).is_some();
        if removed {
            tracing::trace!(network = %key.network, registry = %key.registry, operation = %key.operation, "Invalidated registry snapshot");
        }
        removed
    }

    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// `(hits, misses)` since creation.
    pub fn stats(&self) -> (usize, usize) {
        (
            self.hits.load(Ordering::Relaxed),
            self.misses.load(Ordering::Relaxed),
        )
    }
}
