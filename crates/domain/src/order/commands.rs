//! Repair order commands and their wire format.

use chrono::{DateTime, NaiveDateTime, Utc};
use common::OrderId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::command::Command;
use crate::error::ErrorCode;
use crate::money::Money;

use super::{ComponentId, NewService, OrderError, ServiceId};

/// Operation tags accepted in a command batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Operation {
    CreateOrder,
    AddService,
    SetStateDiagnosed,
    Authorize,
    SetStateInProgress,
    SetRealCost,
    TryComplete,
    Reauthorize,
    Deliver,
    Cancel,
}

impl Operation {
    pub const ALL: [Operation; 10] = [
        Operation::CreateOrder,
        Operation::AddService,
        Operation::SetStateDiagnosed,
        Operation::Authorize,
        Operation::SetStateInProgress,
        Operation::SetRealCost,
        Operation::TryComplete,
        Operation::Reauthorize,
        Operation::Deliver,
        Operation::Cancel,
    ];

    /// Returns the tag as it appears on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::CreateOrder => "CREATE_ORDER",
            Operation::AddService => "ADD_SERVICE",
            Operation::SetStateDiagnosed => "SET_STATE_DIAGNOSED",
            Operation::Authorize => "AUTHORIZE",
            Operation::SetStateInProgress => "SET_STATE_IN_PROGRESS",
            Operation::SetRealCost => "SET_REAL_COST",
            Operation::TryComplete => "TRY_COMPLETE",
            Operation::Reauthorize => "REAUTHORIZE",
            Operation::Deliver => "DELIVER",
            Operation::Cancel => "CANCEL",
        }
    }

    /// Parses a wire tag.
    pub fn parse(tag: &str) -> Option<Operation> {
        Self::ALL.into_iter().find(|op| op.as_str() == tag)
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Command to open a new order.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CreateOrder {
    pub order_id: OrderId,
    pub customer: String,
    pub vehicle: String,
}

impl CreateOrder {
    pub fn new(
        order_id: impl Into<OrderId>,
        customer: impl Into<String>,
        vehicle: impl Into<String>,
    ) -> Self {
        Self {
            order_id: order_id.into(),
            customer: customer.into(),
            vehicle: vehicle.into(),
        }
    }
}

/// Command to add a service to the estimate.
///
/// On the wire the service is either nested under `service` or given inline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddService {
    pub order_id: OrderId,
    pub service: NewService,
}

impl AddService {
    pub fn new(order_id: impl Into<OrderId>, service: NewService) -> Self {
        Self {
            order_id: order_id.into(),
            service,
        }
    }

    fn from_data(data: Value) -> Result<Self, serde_json::Error> {
        #[derive(Deserialize)]
        struct Nested {
            order_id: OrderId,
            service: NewService,
        }

        #[derive(Deserialize)]
        struct Inline {
            order_id: OrderId,
            #[serde(flatten)]
            service: NewService,
        }

        if data.get("service").is_some() {
            let Nested { order_id, service } = serde_json::from_value(data)?;
            Ok(Self { order_id, service })
        } else {
            let Inline { order_id, service } = serde_json::from_value(data)?;
            Ok(Self { order_id, service })
        }
    }
}

/// Command to mark the vehicle as diagnosed.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MarkDiagnosed {
    pub order_id: OrderId,
}

/// Command to authorize the estimate.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Authorize {
    pub order_id: OrderId,
}

/// Command to start the work.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StartWork {
    pub order_id: OrderId,
}

/// Command to record a real cost.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SetRealCost {
    pub order_id: OrderId,

    #[serde(alias = "service_index")]
    pub service_id: ServiceId,

    /// Targets a single component when present.
    #[serde(default, alias = "component_index")]
    pub component_id: Option<ComponentId>,

    pub real_cost: Money,

    #[serde(default)]
    pub completed: bool,
}

impl SetRealCost {
    pub fn new(order_id: impl Into<OrderId>, service_id: ServiceId, real_cost: Money) -> Self {
        Self {
            order_id: order_id.into(),
            service_id,
            component_id: None,
            real_cost,
            completed: false,
        }
    }

    /// Targets a component instead of the service itself.
    pub fn for_component(mut self, component_id: ComponentId) -> Self {
        self.component_id = Some(component_id);
        self
    }

    pub fn completed(mut self) -> Self {
        self.completed = true;
        self
    }
}

/// Command to try to complete the work.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TryComplete {
    pub order_id: OrderId,
}

/// Command to grant a new authorization after an overrun.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Reauthorize {
    pub order_id: OrderId,

    /// Defaults to the current real total.
    #[serde(default)]
    pub new_authorized_amount: Option<Money>,
}

/// Command to hand the vehicle back.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Deliver {
    pub order_id: OrderId,
}

/// Command to cancel the order.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Cancel {
    pub order_id: OrderId,

    #[serde(default)]
    pub reason: Option<String>,
}

/// One command per operation tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderCommand {
    CreateOrder(CreateOrder),
    AddService(AddService),
    MarkDiagnosed(MarkDiagnosed),
    Authorize(Authorize),
    StartWork(StartWork),
    SetRealCost(SetRealCost),
    TryComplete(TryComplete),
    Reauthorize(Reauthorize),
    Deliver(Deliver),
    Cancel(Cancel),
}

impl OrderCommand {
    /// Builds the command for `op` from its data payload.
    pub fn from_data(op: Operation, data: Value) -> Result<Self, serde_json::Error> {
        Ok(match op {
            Operation::CreateOrder => OrderCommand::CreateOrder(serde_json::from_value(data)?),
            Operation::AddService => OrderCommand::AddService(AddService::from_data(data)?),
            Operation::SetStateDiagnosed => {
                OrderCommand::MarkDiagnosed(serde_json::from_value(data)?)
            }
            Operation::Authorize => OrderCommand::Authorize(serde_json::from_value(data)?),
            Operation::SetStateInProgress => {
                OrderCommand::StartWork(serde_json::from_value(data)?)
            }
            Operation::SetRealCost => OrderCommand::SetRealCost(serde_json::from_value(data)?),
            Operation::TryComplete => OrderCommand::TryComplete(serde_json::from_value(data)?),
            Operation::Reauthorize => OrderCommand::Reauthorize(serde_json::from_value(data)?),
            Operation::Deliver => OrderCommand::Deliver(serde_json::from_value(data)?),
            Operation::Cancel => OrderCommand::Cancel(serde_json::from_value(data)?),
        })
    }

    /// Returns the operation tag of this command.
    pub fn operation(&self) -> Operation {
        match self {
            OrderCommand::CreateOrder(_) => Operation::CreateOrder,
            OrderCommand::AddService(_) => Operation::AddService,
            OrderCommand::MarkDiagnosed(_) => Operation::SetStateDiagnosed,
            OrderCommand::Authorize(_) => Operation::Authorize,
            OrderCommand::StartWork(_) => Operation::SetStateInProgress,
            OrderCommand::SetRealCost(_) => Operation::SetRealCost,
            OrderCommand::TryComplete(_) => Operation::TryComplete,
            OrderCommand::Reauthorize(_) => Operation::Reauthorize,
            OrderCommand::Deliver(_) => Operation::Deliver,
            OrderCommand::Cancel(_) => Operation::Cancel,
        }
    }
}

macro_rules! impl_command {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Command for $ty {
                fn order_id(&self) -> &OrderId {
                    &self.order_id
                }
            }
        )*
    };
}

impl_command!(
    CreateOrder,
    AddService,
    MarkDiagnosed,
    Authorize,
    StartWork,
    SetRealCost,
    TryComplete,
    Reauthorize,
    Deliver,
    Cancel,
);

impl Command for OrderCommand {
    fn order_id(&self) -> &OrderId {
        match self {
            OrderCommand::CreateOrder(c) => c.order_id(),
            OrderCommand::AddService(c) => c.order_id(),
            OrderCommand::MarkDiagnosed(c) => c.order_id(),
            OrderCommand::Authorize(c) => c.order_id(),
            OrderCommand::StartWork(c) => c.order_id(),
            OrderCommand::SetRealCost(c) => c.order_id(),
            OrderCommand::TryComplete(c) => c.order_id(),
            OrderCommand::Reauthorize(c) => c.order_id(),
            OrderCommand::Deliver(c) => c.order_id(),
            OrderCommand::Cancel(c) => c.order_id(),
        }
    }
}

/// A command record as received in a batch, before validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandRequest {
    #[serde(default)]
    pub op: String,

    /// ISO-8601 timestamp; the current time is used when absent.
    #[serde(default)]
    pub ts: Option<String>,

    #[serde(default)]
    pub data: Value,
}

impl CommandRequest {
    pub fn new(op: impl Into<String>, ts: impl Into<String>, data: Value) -> Self {
        Self {
            op: op.into(),
            ts: Some(ts.into()),
            data,
        }
    }

    /// Best-effort order id, used to label failures of unparseable commands.
    pub fn order_id_hint(&self) -> Option<OrderId> {
        self.data
            .get("order_id")
            .and_then(Value::as_str)
            .map(OrderId::from)
    }

    /// Validates the record into a typed command.
    pub fn parse(&self) -> Result<CommandEnvelope, CommandError> {
        let op = Operation::parse(&self.op)
            .ok_or_else(|| CommandError::UnsupportedOperation(self.op.clone()))?;

        let ts = match self.ts.as_deref() {
            Some(raw) => parse_timestamp(raw)
                .map_err(|e| CommandError::InvalidPayload(format!("invalid ts '{raw}': {e}")))?,
            None => Utc::now(),
        };

        let command = OrderCommand::from_data(op, self.data.clone())
            .map_err(|e| CommandError::InvalidPayload(format!("{op}: {e}")))?;

        Ok(CommandEnvelope { ts, command })
    }
}

/// Parses an ISO-8601 timestamp. One without an offset is taken as UTC.
fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .or_else(|_| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f").map(|ts| ts.and_utc())
        })
}

/// A validated command with its timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandEnvelope {
    pub ts: DateTime<Utc>,
    pub command: OrderCommand,
}

/// Reasons a single command failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("Unsupported operation: '{0}'")]
    UnsupportedOperation(String),

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    #[error("Order already exists: {0}")]
    OrderAlreadyExists(OrderId),

    /// The aggregate refused the command.
    #[error(transparent)]
    Rejected(#[from] OrderError),
}

impl CommandError {
    /// Returns the wire code reported for this failure.
    pub fn code(&self) -> ErrorCode {
        match self {
            CommandError::UnsupportedOperation(_) => ErrorCode::UnsupportedOperation,
            CommandError::InvalidPayload(_) => ErrorCode::ValidationError,
            CommandError::OrderNotFound(_) => ErrorCode::OrderNotFound,
            CommandError::OrderAlreadyExists(_) => ErrorCode::OrderAlreadyExists,
            CommandError::Rejected(e) => e.code(),
        }
    }
}
