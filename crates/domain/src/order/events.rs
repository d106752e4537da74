//! Repair order domain events.

use chrono::{DateTime, Utc};
use common::OrderId;
use order_store::Version;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::aggregate::DomainEvent;
use crate::money::Money;

use super::{Authorization, ComponentId, Service, ServiceId};

/// Unique identifier for a recorded event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(Uuid);

impl EventId {
    /// Creates a new random event ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Events that can occur on a repair order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderEvent {
    /// Order was opened.
    Created(OrderCreatedData),

    /// A service was added to the estimate.
    ServiceAdded(ServiceAddedData),

    /// The vehicle was diagnosed.
    Diagnosed,

    /// The customer authorized the estimate.
    Authorized(AuthorizedData),

    /// Work started.
    InProgress,

    /// A real cost was recorded for a service or one of its components.
    RealCostSet(RealCostSetData),

    /// Real cost went over the overrun limit.
    WaitingForApproval(OverrunData),

    /// Work finished within the limit.
    Completed(CompletedData),

    /// A new amount was authorized after an overrun.
    Reauthorized(ReauthorizedData),

    /// The vehicle was handed back.
    Delivered,

    /// The order was cancelled.
    Cancelled(CancelledData),
}

impl DomainEvent for OrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            OrderEvent::Created(_) => "CREATED",
            OrderEvent::ServiceAdded(_) => "SERVICE_ADDED",
            OrderEvent::Diagnosed => "DIAGNOSED",
            OrderEvent::Authorized(_) => "AUTHORIZED",
            OrderEvent::InProgress => "IN_PROGRESS",
            OrderEvent::RealCostSet(_) => "REAL_COST_SET",
            OrderEvent::WaitingForApproval(_) => "WAITING_FOR_APPROVAL",
            OrderEvent::Completed(_) => "COMPLETED",
            OrderEvent::Reauthorized(_) => "REAUTHORIZED",
            OrderEvent::Delivered => "DELIVERED",
            OrderEvent::Cancelled(_) => "CANCELLED",
        }
    }
}

/// Data for the Created event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCreatedData {
    pub order_id: OrderId,
    pub customer: String,
    pub vehicle: String,
}

/// Data for the ServiceAdded event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceAddedData {
    /// The service with its assigned ids and estimate.
    pub service: Service,

    /// Order subtotal including this service.
    pub subtotal: Money,
}

/// Data for the Authorized event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizedData {
    pub subtotal: Money,
    pub authorization: Authorization,
}

/// Data for the RealCostSet event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RealCostSetData {
    pub service_id: ServiceId,

    /// Set when the cost belongs to a single component.
    pub component_id: Option<ComponentId>,

    pub real_cost: Money,

    /// Only meaningful for service-level costs.
    pub completed: bool,

    /// Real total of the service after this cost.
    pub service_real_total: Money,

    /// Real total of the order after this cost.
    pub real_total: Money,
}

/// Data for the WaitingForApproval event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverrunData {
    pub real_total: Money,
    pub limit: Money,
}

/// Data for the Completed event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedData {
    pub real_total: Money,
}

/// Data for the Reauthorized event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReauthorizedData {
    pub authorization: Authorization,
}

/// Data for the Cancelled event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelledData {
    pub reason: String,
}

/// An event as kept in the order's audit trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordedEvent {
    pub event_id: EventId,

    pub order_id: OrderId,

    /// Position of the event in the order's log (the aggregate version it produced).
    pub sequence: Version,

    /// Timestamp of the command that produced the event.
    pub occurred_at: DateTime<Utc>,

    pub event: OrderEvent,
}

impl RecordedEvent {
    /// Returns the event type name.
    pub fn event_type(&self) -> &'static str {
        self.event.event_type()
    }
}

// Convenience constructors for events
impl OrderEvent {
    /// Creates a Created event.
    pub fn created(order_id: OrderId, customer: impl Into<String>, vehicle: impl Into<String>) -> Self {
        OrderEvent::Created(OrderCreatedData {
            order_id,
            customer: customer.into(),
            vehicle: vehicle.into(),
        })
    }

    /// Creates a ServiceAdded event.
    pub fn service_added(service: Service, subtotal: Money) -> Self {
        OrderEvent::ServiceAdded(ServiceAddedData { service, subtotal })
    }

    /// Creates an Authorized event.
    pub fn authorized(authorization: Authorization) -> Self {
        OrderEvent::Authorized(AuthorizedData {
            subtotal: authorization.subtotal,
            authorization,
        })
    }

    /// Creates a RealCostSet event.
    pub fn real_cost_set(data: RealCostSetData) -> Self {
        OrderEvent::RealCostSet(data)
    }

    /// Creates a WaitingForApproval event.
    pub fn waiting_for_approval(real_total: Money, limit: Money) -> Self {
        OrderEvent::WaitingForApproval(OverrunData { real_total, limit })
    }

    /// Creates a Completed event.
    pub fn completed(real_total: Money) -> Self {
        OrderEvent::Completed(CompletedData { real_total })
    }

    /// Creates a Reauthorized event.
    pub fn reauthorized(authorization: Authorization) -> Self {
        OrderEvent::Reauthorized(ReauthorizedData { authorization })
    }

    /// Creates a Cancelled event.
    pub fn cancelled(reason: impl Into<String>) -> Self {
        OrderEvent::Cancelled(CancelledData {
            reason: reason.into(),
        })
    }
}
