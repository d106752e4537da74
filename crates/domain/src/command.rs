//! Batch command handling.

use std::time::Instant;

use chrono::{DateTime, Utc};
use common::OrderId;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::aggregate::Aggregate;
use crate::error::{DomainError, ErrorCode};
use crate::order::{
    CommandEnvelope, CommandError, CommandRequest, EventSummary, OrderCommand, OrderError,
    OrderSummary, RecordedEvent, RepairOrder,
};
use crate::repository::RepairOrderRepository;

/// Trait for commands that target a single repair order.
///
/// Commands represent an intention to perform an action. They may be rejected
/// if the order's current state doesn't allow the action.
pub trait Command: Send + Sync {
    /// Returns the ID of the order this command targets.
    fn order_id(&self) -> &OrderId;
}

/// Machine-readable failure of one command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: ErrorCode,
    pub message: String,
}

impl From<&CommandError> for ErrorBody {
    fn from(error: &CommandError) -> Self {
        Self {
            code: error.code(),
            message: error.to_string(),
        }
    }
}

/// Result of one command in a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandOutcome {
    /// Position of the command in the batch.
    pub index: usize,

    pub op: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_id: Option<OrderId>,

    pub success: bool,

    /// The order after the command, when one was resolved.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<OrderSummary>,

    /// Events recorded by this command. May be non-empty on failure.
    #[serde(default)]
    pub events: Vec<RecordedEvent>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

/// Flat failure record, one per failed command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandFailure {
    pub op: String,
    pub order_id: String,
    pub code: ErrorCode,
    pub message: String,
}

/// Output of a whole batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchResponse {
    /// One entry per input command, in input order.
    pub results: Vec<CommandOutcome>,

    /// Every stored order after the batch.
    pub orders: Vec<OrderSummary>,

    /// Every event of every stored order.
    pub events: Vec<EventSummary>,

    /// Every failed command of this batch.
    pub errors: Vec<CommandFailure>,
}

impl BatchResponse {
    /// Returns the number of failed commands.
    pub fn failure_count(&self) -> usize {
        self.errors.len()
    }
}

/// Applies command batches to repair orders.
///
/// The handler is responsible for:
/// 1. Validating each command record
/// 2. Loading (or creating) the target order
/// 3. Invoking the matching aggregate operation
/// 4. Persisting the order whenever it recorded events
///
/// Batches and resets are serialized: only one runs at a time.
pub struct CommandHandler<R> {
    repository: R,
    batch_guard: Mutex<()>,
}

impl<R: RepairOrderRepository> CommandHandler<R> {
    /// Creates a new command handler over the given repository.
    pub fn new(repository: R) -> Self {
        Self {
            repository,
            batch_guard: Mutex::new(()),
        }
    }

    /// Returns a reference to the underlying repository.
    pub fn repository(&self) -> &R {
        &self.repository
    }

    /// Executes a batch, in input order.
    ///
    /// A failed command never stops the batch; only repository failures do.
    #[tracing::instrument(skip(self, commands), fields(batch_size = commands.len()))]
    pub async fn execute(
        &self,
        commands: Vec<CommandRequest>,
    ) -> Result<BatchResponse, DomainError> {
        let _guard = self.batch_guard.lock().await;
        let started = Instant::now();

        let mut results = Vec::with_capacity(commands.len());
        for (index, request) in commands.iter().enumerate() {
            results.push(self.process(index, request).await?);
        }

        let orders = self.repository.list().await?;
        let response = build_response(results, &orders);

        metrics::counter!("repair_order_batches_total").increment(1);
        metrics::histogram!("repair_order_batch_duration_seconds")
            .record(started.elapsed().as_secs_f64());
        tracing::info!(
            commands = commands.len(),
            failed = response.failure_count(),
            "Batch processed"
        );

        Ok(response)
    }

    /// Discards every stored order.
    #[tracing::instrument(skip(self))]
    pub async fn reset(&self) -> Result<(), DomainError> {
        let _guard = self.batch_guard.lock().await;
        self.repository.reset().await?;
        tracing::info!("Repository cleared");
        Ok(())
    }

    /// Loads one order.
    pub async fn order(&self, order_id: &OrderId) -> Result<Option<RepairOrder>, DomainError> {
        self.repository.load(order_id).await
    }

    /// Loads every order, in the order they were created.
    pub async fn orders(&self) -> Result<Vec<RepairOrder>, DomainError> {
        self.repository.list().await
    }

    async fn process(
        &self,
        index: usize,
        request: &CommandRequest,
    ) -> Result<CommandOutcome, DomainError> {
        let CommandEnvelope { ts, command } = match request.parse() {
            Ok(envelope) => envelope,
            Err(error) => {
                let order_id = request.order_id_hint();
                return Ok(self.failed(index, &request.op, order_id, None, Vec::new(), error));
            }
        };

        let op = command.operation().as_str();
        let order_id = command.order_id().clone();

        let mut order = match self.resolve(&command).await? {
            Ok(order) => order,
            Err(error) => {
                return Ok(self.failed(index, op, Some(order_id), None, Vec::new(), error));
            }
        };

        let before = order.version();
        let result = dispatch(&mut order, ts, command);

        // Recorded events are kept even when the command reports a failure.
        if order.version() != before {
            self.repository.save(&order).await?;
        }

        let events = order.events_since(before).to_vec();
        let summary = order.id().map(|_| OrderSummary::from(&order));

        match result {
            Ok(()) => {
                metrics::counter!("repair_order_commands_total", "op" => op, "outcome" => "success")
                    .increment(1);
                Ok(CommandOutcome {
                    index,
                    op: op.to_string(),
                    order_id: Some(order_id),
                    success: true,
                    order: summary,
                    events,
                    error: None,
                })
            }
            Err(error) => {
                if matches!(error, OrderError::RequiresReauthorization { .. }) {
                    metrics::counter!("repair_order_reauthorizations_required_total").increment(1);
                }
                Ok(self.failed(index, op, Some(order_id), summary, events, error.into()))
            }
        }
    }

    /// Finds the order a command targets, or starts a new one for CREATE_ORDER.
    async fn resolve(
        &self,
        command: &OrderCommand,
    ) -> Result<Result<RepairOrder, CommandError>, DomainError> {
        let order_id = command.order_id();
        let existing = if order_id.is_blank() {
            None
        } else {
            self.repository.load(order_id).await?
        };

        Ok(match (command, existing) {
            (OrderCommand::CreateOrder(_), None) => Ok(RepairOrder::default()),
            (OrderCommand::CreateOrder(_), Some(_)) => {
                Err(CommandError::OrderAlreadyExists(order_id.clone()))
            }
            (_, Some(order)) => Ok(order),
            (_, None) => Err(CommandError::OrderNotFound(order_id.clone())),
        })
    }

    fn failed(
        &self,
        index: usize,
        op: &str,
        order_id: Option<OrderId>,
        order: Option<OrderSummary>,
        events: Vec<RecordedEvent>,
        error: CommandError,
    ) -> CommandOutcome {
        let code = error.code();
        tracing::warn!(
            index,
            op,
            order_id = order_id.as_ref().map(OrderId::as_str).unwrap_or_default(),
            %code,
            error = %error,
            "Command rejected"
        );
        metrics::counter!(
            "repair_order_commands_total",
            "op" => op.to_string(),
            "outcome" => "failure"
        )
        .increment(1);

        CommandOutcome {
            index,
            op: op.to_string(),
            order_id,
            success: false,
            order,
            events,
            error: Some(ErrorBody::from(&error)),
        }
    }
}

/// Invokes the aggregate operation matching the command.
fn dispatch(
    order: &mut RepairOrder,
    ts: DateTime<Utc>,
    command: OrderCommand,
) -> Result<(), OrderError> {
    match command {
        OrderCommand::CreateOrder(cmd) => order.create(cmd.order_id, cmd.customer, cmd.vehicle, ts),
        OrderCommand::AddService(cmd) => order.add_service(cmd.service, ts),
        OrderCommand::MarkDiagnosed(_) => order.diagnose(ts),
        OrderCommand::Authorize(_) => order.authorize(ts),
        OrderCommand::StartWork(_) => order.start_work(ts),
        OrderCommand::SetRealCost(cmd) => order.set_real_cost(
            cmd.service_id,
            cmd.component_id,
            cmd.real_cost,
            cmd.completed,
            ts,
        ),
        OrderCommand::TryComplete(_) => order.try_complete(ts),
        OrderCommand::Reauthorize(cmd) => order.reauthorize(cmd.new_authorized_amount, ts),
        OrderCommand::Deliver(_) => order.deliver(ts),
        OrderCommand::Cancel(cmd) => order.cancel(cmd.reason, ts),
    }
}

fn build_response(results: Vec<CommandOutcome>, orders: &[RepairOrder]) -> BatchResponse {
    let errors = results
        .iter()
        .filter_map(|outcome| {
            outcome.error.as_ref().map(|error| CommandFailure {
                op: outcome.op.clone(),
                order_id: outcome
                    .order_id
                    .as_ref()
                    .map(OrderId::to_string)
                    .unwrap_or_default(),
                code: error.code,
                message: error.message.clone(),
            })
        })
        .collect();

    BatchResponse {
        results,
        orders: orders.iter().map(OrderSummary::from).collect(),
        events: orders
            .iter()
            .flat_map(RepairOrder::events)
            .map(EventSummary::from)
            .collect(),
        errors,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::SnapshotRepository;
    use order_store::InMemorySnapshotStore;
    use serde_json::{Value, json};

    fn handler() -> CommandHandler<SnapshotRepository<InMemorySnapshotStore>> {
        CommandHandler::new(SnapshotRepository::new(InMemorySnapshotStore::new()))
    }

    fn cmd(op: &str, data: Value) -> CommandRequest {
        CommandRequest::new(op, "2025-03-01T09:00:00Z", data)
    }

    fn create(id: &str) -> CommandRequest {
        cmd(
            "CREATE_ORDER",
            json!({"order_id": id, "customer": "ACME", "vehicle": "ABC-123"}),
        )
    }

    #[tokio::test]
    async fn test_create_order() {
        let handler = handler();
        let response = handler.execute(vec![create("R001")]).await.unwrap();

        let outcome = &response.results[0];
        assert!(outcome.success);
        assert_eq!(outcome.events.len(), 1);
        assert_eq!(outcome.order.as_ref().unwrap().order_id, "R001");
        assert_eq!(response.orders.len(), 1);
        assert!(response.errors.is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_create_fails() {
        let handler = handler();
        let response = handler
            .execute(vec![create("R001"), create("R001")])
            .await
            .unwrap();

        let error = response.results[1].error.as_ref().unwrap();
        assert_eq!(error.code, ErrorCode::OrderAlreadyExists);
        assert_eq!(response.orders.len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_order() {
        let handler = handler();
        let response = handler
            .execute(vec![cmd("AUTHORIZE", json!({"order_id": "R404"}))])
            .await
            .unwrap();

        let outcome = &response.results[0];
        assert!(!outcome.success);
        assert!(outcome.order.is_none());
        assert_eq!(outcome.error.as_ref().unwrap().code, ErrorCode::OrderNotFound);
        assert_eq!(response.errors[0].order_id, "R404");
    }

    #[tokio::test]
    async fn test_failure_does_not_abort_batch() {
        let handler = handler();
        let response = handler
            .execute(vec![
                create("R001"),
                cmd("FLY", json!({"order_id": "R001"})),
                cmd("AUTHORIZE", json!({"order_id": "R001"})),
                cmd("SET_STATE_DIAGNOSED", json!({"order_id": "R001"})),
            ])
            .await
            .unwrap();

        let codes: Vec<Option<ErrorCode>> = response
            .results
            .iter()
            .map(|r| r.error.as_ref().map(|e| e.code))
            .collect();
        assert_eq!(
            codes,
            vec![
                None,
                Some(ErrorCode::UnsupportedOperation),
                Some(ErrorCode::NoServices),
                None
            ]
        );
        assert_eq!(response.errors.len(), 2);
        assert_eq!(response.orders[0].status.as_str(), "DIAGNOSED");
    }

    #[tokio::test]
    async fn test_reset_clears_orders() {
        let handler = handler();
        handler.execute(vec![create("R001")]).await.unwrap();

        handler.reset().await.unwrap();
        assert!(handler.orders().await.unwrap().is_empty());
        assert!(handler.order(&OrderId::new("R001")).await.unwrap().is_none());
    }
}
