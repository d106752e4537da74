use thiserror::Error;

use crate::{OrderId, Version};

/// Errors that can occur when interacting with the snapshot store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A snapshot was saved on top of a newer (or equally new) one.
    /// Another writer already persisted this version of the aggregate.
    #[error(
        "Concurrency conflict for aggregate {aggregate_id}: saving version {expected}, stored version is {actual}"
    )]
    ConcurrencyConflict {
        aggregate_id: OrderId,
        expected: Version,
        actual: Version,
    },

    /// The backing storage cannot be reached.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for snapshot store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
