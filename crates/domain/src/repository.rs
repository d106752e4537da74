//! Persistence port for repair orders and its snapshot-backed adapter.

use async_trait::async_trait;
use common::OrderId;
use order_store::{Snapshot, SnapshotStore, SnapshotStoreExt};

use crate::aggregate::Aggregate;
use crate::error::DomainError;
use crate::order::RepairOrder;

/// Storage capability the command handler depends on.
#[async_trait]
pub trait RepairOrderRepository: Send + Sync {
    /// Loads an order, or None if it was never saved.
    async fn load(&self, order_id: &OrderId) -> Result<Option<RepairOrder>, DomainError>;

    /// Stores the current state of an order.
    async fn save(&self, order: &RepairOrder) -> Result<(), DomainError>;

    /// Returns true if the order was saved before.
    async fn exists(&self, order_id: &OrderId) -> Result<bool, DomainError>;

    /// Returns every stored order, in the order they were first saved.
    async fn list(&self) -> Result<Vec<RepairOrder>, DomainError>;

    /// Discards every stored order.
    async fn reset(&self) -> Result<(), DomainError>;
}

/// Repository that keeps each order as a JSON snapshot of the whole aggregate.
#[derive(Clone, Default)]
pub struct SnapshotRepository<S> {
    store: S,
}

impl<S: SnapshotStore> SnapshotRepository<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Returns the underlying snapshot store.
    pub fn store(&self) -> &S {
        &self.store
    }
}

#[async_trait]
impl<S: SnapshotStore> RepairOrderRepository for SnapshotRepository<S> {
    async fn load(&self, order_id: &OrderId) -> Result<Option<RepairOrder>, DomainError> {
        Ok(self.store.load_state(order_id).await?)
    }

    async fn save(&self, order: &RepairOrder) -> Result<(), DomainError> {
        let snapshot = Snapshot::capture(
            order.order_id(),
            RepairOrder::aggregate_type(),
            order.version(),
            order,
        )?;
        let version = self.store.save(snapshot).await?;

        tracing::debug!(order_id = %order.order_id(), %version, "Saved repair order");
        Ok(())
    }

    async fn exists(&self, order_id: &OrderId) -> Result<bool, DomainError> {
        Ok(self.store.exists(order_id).await?)
    }

    async fn list(&self) -> Result<Vec<RepairOrder>, DomainError> {
        self.store
            .load_all()
            .await?
            .into_iter()
            .map(|snapshot| snapshot.restore().map_err(DomainError::from))
            .collect()
    }

    async fn reset(&self) -> Result<(), DomainError> {
        Ok(self.store.reset().await?)
    }
}
