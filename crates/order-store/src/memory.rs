use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{OrderId, Result, Snapshot, SnapshotStore, StoreError, Version};

#[derive(Debug, Clone)]
struct Entry {
    /// Position of the aggregate in first-save order.
    position: u64,
    snapshot: Snapshot,
}

#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<OrderId, Entry>,
    next_position: u64,
}

/// In-memory snapshot store.
///
/// Cloning the store yields another handle to the same data.
#[derive(Clone, Default)]
pub struct InMemorySnapshotStore {
    inner: Arc<RwLock<Inner>>,
}

impl InMemorySnapshotStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored aggregates.
    pub async fn len(&self) -> usize {
        self.inner.read().await.entries.len()
    }

    /// Returns true if nothing is stored.
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.entries.is_empty()
    }
}

#[async_trait]
impl SnapshotStore for InMemorySnapshotStore {
    async fn save(&self, snapshot: Snapshot) -> Result<Version> {
        let mut inner = self.inner.write().await;
        let version = snapshot.version;

        if let Some(entry) = inner.entries.get_mut(&snapshot.aggregate_id) {
            if !snapshot.supersedes(&entry.snapshot) {
                return Err(StoreError::ConcurrencyConflict {
                    aggregate_id: snapshot.aggregate_id,
                    expected: version,
                    actual: entry.snapshot.version,
                });
            }
            entry.snapshot = snapshot;
        } else {
            let position = inner.next_position;
            inner.next_position += 1;
            inner
                .entries
                .insert(snapshot.aggregate_id.clone(), Entry { position, snapshot });
        }

        Ok(version)
    }

    async fn load(&self, aggregate_id: &OrderId) -> Result<Option<Snapshot>> {
        let inner = self.inner.read().await;
        Ok(inner
            .entries
            .get(aggregate_id)
            .map(|entry| entry.snapshot.clone()))
    }

    async fn load_all(&self) -> Result<Vec<Snapshot>> {
        let inner = self.inner.read().await;
        let mut entries: Vec<_> = inner.entries.values().collect();
        entries.sort_by_key(|entry| entry.position);
        Ok(entries
            .into_iter()
            .map(|entry| entry.snapshot.clone())
            .collect())
    }

    async fn get_version(&self, aggregate_id: &OrderId) -> Result<Option<Version>> {
        let inner = self.inner.read().await;
        Ok(inner
            .entries
            .get(aggregate_id)
            .map(|entry| entry.snapshot.version))
    }

    async fn reset(&self) -> Result<()> {
        let mut inner = self.inner.write().await;
        let discarded = inner.entries.len();
        inner.entries.clear();
        inner.next_position = 0;
        tracing::debug!(discarded, "snapshot store reset");
        Ok(())
    }
}
