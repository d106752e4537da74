//! Snapshot persistence for repair order aggregates.
//!
//! Provides the `SnapshotStore` trait, an in-memory implementation, and the
//! `Version` used to detect stale writers.

pub mod error;
pub mod memory;
pub mod snapshot;
pub mod store;
pub mod version;

pub use common::OrderId;
pub use error::{Result, StoreError};
pub use memory::InMemorySnapshotStore;
pub use snapshot::Snapshot;
pub use store::{SnapshotStore, SnapshotStoreExt};
pub use version::Version;
