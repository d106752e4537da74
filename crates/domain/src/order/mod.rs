//! Repair order aggregate and related types.

mod aggregate;
mod authorization;
mod commands;
mod events;
mod line_items;
mod state;
mod summary;

pub use aggregate::RepairOrder;
pub use authorization::{Authorization, OVERRUN_RATE, TAX_RATE};
pub use commands::*;
pub use events::{
    AuthorizedData, CancelledData, CompletedData, EventId, OrderCreatedData, OrderEvent,
    OverrunData, ReauthorizedData, RealCostSetData, RecordedEvent, ServiceAddedData,
};
pub use line_items::{Component, ComponentId, NewComponent, NewService, Service, ServiceId};
pub use state::OrderStatus;
pub use summary::{ComponentSummary, EventSummary, OrderSummary, ServiceSummary};

use common::OrderId;
use thiserror::Error;

use crate::error::ErrorCode;
use crate::money::Money;

/// Errors that can occur during repair order operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderError {
    /// The aggregate was already created.
    #[error("Order already created")]
    AlreadyCreated,

    /// A required field is missing or blank.
    #[error("Field '{field}' is required")]
    MissingField { field: &'static str },

    /// The operation is not permitted in the current status.
    #[error("Invalid state transition: cannot {action} from {current} state")]
    InvalidTransition {
        current: OrderStatus,
        action: &'static str,
    },

    /// Services are frozen once the estimate is authorized.
    #[error("Services cannot be modified after authorization (order is {current})")]
    ServicesLocked { current: OrderStatus },

    /// The order was delivered; nothing else may happen to it.
    #[error("Order {0} was already delivered")]
    OrderDelivered(OrderId),

    /// The order was cancelled; nothing else may happen to it.
    #[error("Order {0} is cancelled")]
    OrderCancelled(OrderId),

    /// Authorization needs at least one service.
    #[error("No services to authorize")]
    NoServices,

    /// Real cost is above the overrun limit.
    #[error(
        "Real cost ({real_total}) exceeds 110% of the authorized amount ({authorized_amount}). Limit: {limit}"
    )]
    RequiresReauthorization {
        real_total: Money,
        authorized_amount: Money,
        limit: Money,
    },

    /// Service not found in the order.
    #[error("Service not found: {0}")]
    ServiceNotFound(ServiceId),

    /// Component not found in the service.
    #[error("Component {component_id} not found in service {service_id}")]
    ComponentNotFound {
        service_id: ServiceId,
        component_id: ComponentId,
    },

    /// Invalid component quantity.
    #[error("Invalid quantity for component '{name}': {quantity} (must be greater than 0)")]
    InvalidQuantity { name: String, quantity: u32 },

    /// Cost fields cannot be negative.
    #[error("Invalid amount for '{field}': {amount} (must not be negative)")]
    NegativeAmount { field: &'static str, amount: Money },

    /// A computed amount is too large to represent.
    #[error("Amount for '{field}' is out of range")]
    AmountOutOfRange { field: &'static str },
}

impl OrderError {
    /// Returns the wire code reported for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            OrderError::AlreadyCreated => ErrorCode::OrderAlreadyExists,
            OrderError::InvalidTransition { .. } => ErrorCode::SequenceError,
            OrderError::ServicesLocked { .. } | OrderError::OrderDelivered(_) => {
                ErrorCode::NotAllowedAfterAuthorization
            }
            OrderError::OrderCancelled(_) => ErrorCode::OrderCancelled,
            OrderError::NoServices => ErrorCode::NoServices,
            OrderError::RequiresReauthorization { .. } => ErrorCode::RequiresReauth,
            OrderError::MissingField { .. }
            | OrderError::ServiceNotFound(_)
            | OrderError::ComponentNotFound { .. }
            | OrderError::InvalidQuantity { .. }
            | OrderError::NegativeAmount { .. }
            | OrderError::AmountOutOfRange { .. } => ErrorCode::ValidationError,
        }
    }
}
