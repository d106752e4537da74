use async_trait::async_trait;

use crate::{OrderId, Result, Snapshot, Version};

/// Core trait for snapshot store implementations.
///
/// A snapshot store keeps the latest serialized state of each aggregate.
/// All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Saves a snapshot, replacing the stored one for the same aggregate.
    ///
    /// Fails with `ConcurrencyConflict` if the stored snapshot already has a
    /// version greater than or equal to `snapshot.version`.
    ///
    /// Returns the version that was stored.
    async fn save(&self, snapshot: Snapshot) -> Result<Version>;

    /// Retrieves the latest snapshot for an aggregate.
    ///
    /// Returns None if the aggregate was never saved.
    async fn load(&self, aggregate_id: &OrderId) -> Result<Option<Snapshot>>;

    /// Retrieves every stored snapshot, in the order aggregates were first saved.
    async fn load_all(&self) -> Result<Vec<Snapshot>>;

    /// Gets the stored version of an aggregate.
    ///
    /// Returns None if the aggregate doesn't exist.
    async fn get_version(&self, aggregate_id: &OrderId) -> Result<Option<Version>>;

    /// Discards every stored snapshot.
    async fn reset(&self) -> Result<()>;
}

/// Extension trait providing convenience methods for snapshot stores.
#[async_trait]
pub trait SnapshotStoreExt: SnapshotStore {
    /// Checks if an aggregate has been stored.
    async fn exists(&self, aggregate_id: &OrderId) -> Result<bool> {
        Ok(self.get_version(aggregate_id).await?.is_some())
    }

    /// Loads a snapshot and deserializes its state.
    async fn load_state<T>(&self, aggregate_id: &OrderId) -> Result<Option<T>>
    where
        T: serde::de::DeserializeOwned,
    {
        match self.load(aggregate_id).await? {
            Some(snapshot) => snapshot.restore().map(Some),
            None => Ok(None),
        }
    }
}

// Blanket implementation for all SnapshotStore implementations
impl<T: SnapshotStore + ?Sized> SnapshotStoreExt for T {}
