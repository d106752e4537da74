//! Repair order state machine.

use serde::{Deserialize, Serialize};

/// The status of a repair order in its lifecycle.
///
/// State transitions:
/// ```text
/// Created ──► Diagnosed ──► Authorized ──► InProgress ──► Completed ──► Delivered
///    │            │             ▲              │
///    └────────────┴──► Authorized              ▼
///                               └─── WaitingForApproval
///
/// Created, Diagnosed, Authorized, InProgress, WaitingForApproval ──► Cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Order was opened; services can be added.
    #[default]
    Created,

    /// The vehicle was diagnosed; services can still be added.
    Diagnosed,

    /// The customer authorized the estimate; services are frozen.
    Authorized,

    /// Real cost exceeded the overrun limit; a new authorization is needed.
    WaitingForApproval,

    /// Work is being carried out.
    InProgress,

    /// Work finished within the authorized limit.
    Completed,

    /// Vehicle handed back to the customer (terminal state).
    Delivered,

    /// Order was cancelled (terminal state).
    Cancelled,
}

impl OrderStatus {
    /// Returns true if services can be added in this status.
    pub fn can_modify_services(&self) -> bool {
        matches!(self, OrderStatus::Created | OrderStatus::Diagnosed)
    }

    /// Returns true if the order can be marked as diagnosed.
    pub fn can_diagnose(&self) -> bool {
        matches!(self, OrderStatus::Created)
    }

    /// Returns true if the estimate can be authorized in this status.
    pub fn can_authorize(&self) -> bool {
        matches!(self, OrderStatus::Created | OrderStatus::Diagnosed)
    }

    /// Returns true if work can start in this status.
    pub fn can_start_work(&self) -> bool {
        matches!(self, OrderStatus::Authorized)
    }

    /// Returns true if real costs can be recorded in this status.
    pub fn can_record_costs(&self) -> bool {
        matches!(self, OrderStatus::InProgress)
    }

    /// Returns true if completion can be attempted in this status.
    pub fn can_complete(&self) -> bool {
        matches!(self, OrderStatus::InProgress)
    }

    /// Returns true if a new authorization can be granted in this status.
    pub fn can_reauthorize(&self) -> bool {
        matches!(self, OrderStatus::WaitingForApproval)
    }

    /// Returns true if the vehicle can be delivered in this status.
    pub fn can_deliver(&self) -> bool {
        matches!(self, OrderStatus::Completed)
    }

    /// Returns true if the order can be cancelled in this status.
    pub fn can_cancel(&self) -> bool {
        matches!(
            self,
            OrderStatus::Created
                | OrderStatus::Diagnosed
                | OrderStatus::Authorized
                | OrderStatus::InProgress
                | OrderStatus::WaitingForApproval
        )
    }

    /// Returns true if this is a terminal status (no further transitions possible).
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    /// Returns the status name as it appears on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Created => "CREATED",
            OrderStatus::Diagnosed => "DIAGNOSED",
            OrderStatus::Authorized => "AUTHORIZED",
            OrderStatus::WaitingForApproval => "WAITING_FOR_APPROVAL",
            OrderStatus::InProgress => "IN_PROGRESS",
            OrderStatus::Completed => "COMPLETED",
            OrderStatus::Delivered => "DELIVERED",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
