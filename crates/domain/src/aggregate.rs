//! Core aggregate and domain event traits.

use common::OrderId;
use order_store::Version;
use serde::{Serialize, de::DeserializeOwned};

/// Trait for domain events.
///
/// Domain events record facts that have happened to an aggregate.
/// They are immutable and named in past tense.
pub trait DomainEvent: Serialize + DeserializeOwned + Send + Sync + Clone {
    /// Returns the event type name, as it appears in the audit trail.
    fn event_type(&self) -> &'static str;
}

/// Trait for aggregates.
///
/// An aggregate is a cluster of domain objects treated as a single unit. Every
/// change goes through the aggregate root, which validates the change, turns it
/// into an event and applies that event to itself.
pub trait Aggregate: Default + Send + Sync + Sized {
    /// The type of events this aggregate records.
    type Event: DomainEvent;

    /// Returns the aggregate type name.
    ///
    /// Used to tag persisted snapshots.
    fn aggregate_type() -> &'static str;

    /// Returns the aggregate's unique identifier.
    ///
    /// Returns None for a new, uninitialized aggregate.
    fn id(&self) -> Option<&OrderId>;

    /// Returns the current version of the aggregate.
    ///
    /// Version starts at 0 for a new aggregate and increments with each event.
    fn version(&self) -> Version;

    /// Applies an event to the aggregate, updating its state.
    ///
    /// This method must be deterministic and must not fail: validation
    /// happens before the event is produced.
    fn apply(&mut self, event: Self::Event);
}
