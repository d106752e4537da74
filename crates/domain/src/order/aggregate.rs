//! Repair order aggregate implementation.

use chrono::{DateTime, Utc};
use common::OrderId;
use order_store::Version;
use serde::{Deserialize, Serialize};

use crate::aggregate::Aggregate;
use crate::money::Money;

use super::{
    Authorization, ComponentId, EventId, NewService, OrderError, OrderEvent, OrderStatus,
    RecordedEvent, Service, ServiceId,
    events::{OrderCreatedData, RealCostSetData},
};

/// Repair order aggregate root.
///
/// Owns the services, the current authorization and the audit trail of an
/// order. Every operation either records one or more events and returns
/// `Ok`, or leaves the order untouched and returns an [`OrderError`]. The one
/// exception is [`RepairOrder::try_complete`] on an overrun, which records the
/// move to `WAITING_FOR_APPROVAL` and still reports the failure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepairOrder {
    /// Unique order identifier.
    id: Option<OrderId>,

    /// Number of events recorded so far.
    #[serde(default)]
    version: Version,

    customer: String,

    vehicle: String,

    status: OrderStatus,

    /// Services in insertion order; a service's id is its 1-based position.
    services: Vec<Service>,

    /// Sum of every service's estimate.
    #[serde(default)]
    subtotal: Money,

    /// Current authorization, if any.
    authorization: Option<Authorization>,

    /// Running sum of every recorded real cost (unrounded).
    real_total: Money,

    cancel_reason: Option<String>,

    created_at: Option<DateTime<Utc>>,

    /// Append-only audit trail.
    events: Vec<RecordedEvent>,
}

impl Aggregate for RepairOrder {
    type Event = OrderEvent;

    fn aggregate_type() -> &'static str {
        "RepairOrder"
    }

    fn id(&self) -> Option<&OrderId> {
        self.id.as_ref()
    }

    fn version(&self) -> Version {
        self.version
    }

    fn apply(&mut self, event: Self::Event) {
        match event {
            OrderEvent::Created(data) => self.apply_created(data),
            OrderEvent::ServiceAdded(data) => {
                self.services.push(data.service);
                self.subtotal = data.subtotal;
            }
            OrderEvent::Diagnosed => self.status = OrderStatus::Diagnosed,
            OrderEvent::Authorized(data) => {
                self.authorization = Some(data.authorization);
                self.status = OrderStatus::Authorized;
            }
            OrderEvent::InProgress => self.status = OrderStatus::InProgress,
            OrderEvent::RealCostSet(data) => self.apply_real_cost_set(data),
            OrderEvent::WaitingForApproval(_) => self.status = OrderStatus::WaitingForApproval,
            OrderEvent::Completed(_) => self.status = OrderStatus::Completed,
            OrderEvent::Reauthorized(data) => {
                self.authorization = Some(data.authorization);
                self.status = OrderStatus::Authorized;
            }
            OrderEvent::Delivered => self.status = OrderStatus::Delivered,
            OrderEvent::Cancelled(data) => {
                self.cancel_reason = Some(data.reason);
                self.status = OrderStatus::Cancelled;
            }
        }
    }
}

// Query methods
impl RepairOrder {
    /// Returns the order id, or an empty id for an uninitialized aggregate.
    pub fn order_id(&self) -> OrderId {
        self.id.clone().unwrap_or_default()
    }

    pub fn customer(&self) -> &str {
        &self.customer
    }

    pub fn vehicle(&self) -> &str {
        &self.vehicle
    }

    /// Returns the current status.
    pub fn status(&self) -> OrderStatus {
        self.status
    }

    /// Returns all services in insertion order.
    pub fn services(&self) -> &[Service] {
        &self.services
    }

    /// Returns a service by id.
    pub fn service(&self, id: ServiceId) -> Option<&Service> {
        self.services.iter().find(|s| s.id == id)
    }

    /// Returns the current authorization.
    pub fn authorization(&self) -> Option<&Authorization> {
        self.authorization.as_ref()
    }

    /// Returns the currently authorized amount.
    pub fn authorized_amount(&self) -> Option<Money> {
        self.authorization.as_ref().map(|a| a.authorized_amount)
    }

    /// Returns the highest real total accepted without re-authorization.
    pub fn overrun_limit(&self) -> Option<Money> {
        self.authorization.as_ref().map(|a| a.limit)
    }

    /// Returns the sum of every service's estimated cost.
    pub fn subtotal_estimated(&self) -> Money {
        self.subtotal
    }

    /// Returns the running real-cost total.
    pub fn real_total(&self) -> Money {
        self.real_total
    }

    pub fn cancel_reason(&self) -> Option<&str> {
        self.cancel_reason.as_deref()
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    /// Returns the full audit trail.
    pub fn events(&self) -> &[RecordedEvent] {
        &self.events
    }

    /// Returns the events recorded after the aggregate was at `version`.
    pub fn events_since(&self, version: Version) -> &[RecordedEvent] {
        let start = usize::try_from(version.as_i64())
            .unwrap_or(0)
            .min(self.events.len());
        &self.events[start..]
    }

    /// Returns true if the order is in a terminal status.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

// Command methods
impl RepairOrder {
    /// Opens the order.
    pub fn create(
        &mut self,
        order_id: OrderId,
        customer: impl Into<String>,
        vehicle: impl Into<String>,
        ts: DateTime<Utc>,
    ) -> Result<(), OrderError> {
        if self.id.is_some() {
            return Err(OrderError::AlreadyCreated);
        }

        let customer = customer.into();
        let vehicle = vehicle.into();
        if order_id.is_blank() {
            return Err(OrderError::MissingField { field: "order_id" });
        }
        if customer.trim().is_empty() {
            return Err(OrderError::MissingField { field: "customer" });
        }
        if vehicle.trim().is_empty() {
            return Err(OrderError::MissingField { field: "vehicle" });
        }

        self.created_at = Some(ts);
        self.record(ts, OrderEvent::created(order_id, customer, vehicle));
        Ok(())
    }

    /// Adds a service to the estimate. Only allowed before authorization.
    pub fn add_service(&mut self, service: NewService, ts: DateTime<Utc>) -> Result<(), OrderError> {
        self.ensure_open()?;

        if !self.status.can_modify_services() {
            return Err(OrderError::ServicesLocked {
                current: self.status,
            });
        }

        validate_new_service(&service)?;

        let id = ServiceId::new(self.services.len() as u32 + 1);
        let service = service.into_service(id).ok_or(OrderError::AmountOutOfRange {
            field: "estimated_cost",
        })?;
        let subtotal = self
            .subtotal
            .checked_add(service.estimated_cost)
            .ok_or(OrderError::AmountOutOfRange {
                field: "subtotal_estimated",
            })?;

        self.record(ts, OrderEvent::service_added(service, subtotal));
        Ok(())
    }

    /// Marks the vehicle as diagnosed.
    pub fn diagnose(&mut self, ts: DateTime<Utc>) -> Result<(), OrderError> {
        self.ensure_open()?;
        self.ensure(self.status.can_diagnose(), "diagnose")?;

        self.record(ts, OrderEvent::Diagnosed);
        Ok(())
    }

    /// Authorizes the estimate: `subtotal × 1.16`, rounded half-even.
    pub fn authorize(&mut self, ts: DateTime<Utc>) -> Result<(), OrderError> {
        self.ensure_open()?;
        self.ensure(self.status.can_authorize(), "authorize")?;

        if self.services.is_empty() {
            return Err(OrderError::NoServices);
        }

        let authorization =
            Authorization::initial(self.subtotal, ts).ok_or(OrderError::AmountOutOfRange {
                field: "authorized_amount",
            })?;
        self.record(ts, OrderEvent::authorized(authorization));
        Ok(())
    }

    /// Starts the work. Requires a current authorization.
    pub fn start_work(&mut self, ts: DateTime<Utc>) -> Result<(), OrderError> {
        self.ensure_open()?;
        self.ensure(
            self.status.can_start_work() && self.authorization.is_some(),
            "start work",
        )?;

        self.record(ts, OrderEvent::InProgress);
        Ok(())
    }

    /// Records the real cost of a service, or of one of its components.
    pub fn set_real_cost(
        &mut self,
        service_id: ServiceId,
        component_id: Option<ComponentId>,
        real_cost: Money,
        completed: bool,
        ts: DateTime<Utc>,
    ) -> Result<(), OrderError> {
        self.ensure_open()?;
        self.ensure(self.status.can_record_costs(), "set real cost")?;

        if real_cost.is_negative() {
            return Err(OrderError::NegativeAmount {
                field: "real_cost",
                amount: real_cost,
            });
        }

        let service = self
            .service(service_id)
            .ok_or(OrderError::ServiceNotFound(service_id))?;

        let mut projected = service.clone();
        match component_id {
            Some(component_id) => {
                let component = projected.component_mut(component_id).ok_or(
                    OrderError::ComponentNotFound {
                        service_id,
                        component_id,
                    },
                )?;
                component.real_cost = Some(real_cost);
            }
            None => projected.real_cost = Some(real_cost),
        }

        let out_of_range = OrderError::AmountOutOfRange { field: "real_cost" };
        let service_real_total = projected
            .checked_real_total()
            .ok_or_else(|| out_of_range.clone())?;
        let real_total = Money::checked_sum(self.services.iter().map(|s| {
            if s.id == service_id {
                service_real_total
            } else {
                s.real_total
            }
        }))
        .ok_or(out_of_range)?;

        self.record(
            ts,
            OrderEvent::real_cost_set(RealCostSetData {
                service_id,
                component_id,
                real_cost,
                completed,
                service_real_total,
                real_total,
            }),
        );
        Ok(())
    }

    /// Attempts to complete the work.
    ///
    /// Completes when the rounded real total is within 110% of the authorized
    /// amount (inclusive). Otherwise the order moves to `WAITING_FOR_APPROVAL`
    /// and `RequiresReauthorization` is returned; that move is kept.
    pub fn try_complete(&mut self, ts: DateTime<Utc>) -> Result<(), OrderError> {
        self.ensure_open()?;

        if self.status == OrderStatus::WaitingForApproval {
            return Err(self.overrun_error());
        }
        self.ensure(self.status.can_complete(), "complete")?;

        let Some(authorization) = self.authorization.as_ref() else {
            return Err(OrderError::InvalidTransition {
                current: self.status,
                action: "complete",
            });
        };

        let real_total = self.real_total.rounded();
        if authorization.exceeds_limit(real_total) {
            let limit = authorization.limit;
            self.record(ts, OrderEvent::waiting_for_approval(real_total, limit));
            return Err(self.overrun_error());
        }

        self.record(ts, OrderEvent::completed(real_total));
        Ok(())
    }

    /// Grants a new authorization after an overrun.
    ///
    /// Without an explicit amount the current real total is authorized. Work
    /// resumes only after another `start_work`.
    pub fn reauthorize(
        &mut self,
        new_amount: Option<Money>,
        ts: DateTime<Utc>,
    ) -> Result<(), OrderError> {
        self.ensure_open()?;
        self.ensure(self.status.can_reauthorize(), "reauthorize")?;

        let amount = new_amount.unwrap_or(self.real_total);
        if amount.is_negative() {
            return Err(OrderError::NegativeAmount {
                field: "new_authorized_amount",
                amount,
            });
        }

        let Some(current) = self.authorization.as_ref() else {
            return Err(OrderError::InvalidTransition {
                current: self.status,
                action: "reauthorize",
            });
        };

        let authorization =
            current
                .reauthorize(amount, ts)
                .ok_or(OrderError::AmountOutOfRange {
                    field: "new_authorized_amount",
                })?;
        self.record(ts, OrderEvent::reauthorized(authorization));
        Ok(())
    }

    /// Hands the vehicle back to the customer.
    pub fn deliver(&mut self, ts: DateTime<Utc>) -> Result<(), OrderError> {
        self.ensure_open()?;
        self.ensure(self.status.can_deliver(), "deliver")?;

        self.record(ts, OrderEvent::Delivered);
        Ok(())
    }

    /// Cancels the order.
    pub fn cancel(&mut self, reason: Option<String>, ts: DateTime<Utc>) -> Result<(), OrderError> {
        self.ensure_open()?;
        self.ensure(self.status.can_cancel(), "cancel")?;

        self.record(ts, OrderEvent::cancelled(reason.unwrap_or_default()));
        Ok(())
    }
}

// Guards and event helpers
impl RepairOrder {
    fn ensure_open(&self) -> Result<(), OrderError> {
        match self.status {
            OrderStatus::Cancelled => Err(OrderError::OrderCancelled(self.order_id())),
            OrderStatus::Delivered => Err(OrderError::OrderDelivered(self.order_id())),
            _ => Ok(()),
        }
    }

    fn ensure(&self, allowed: bool, action: &'static str) -> Result<(), OrderError> {
        if allowed {
            Ok(())
        } else {
            Err(OrderError::InvalidTransition {
                current: self.status,
                action,
            })
        }
    }

    fn overrun_error(&self) -> OrderError {
        OrderError::RequiresReauthorization {
            real_total: self.real_total.rounded(),
            authorized_amount: self.authorized_amount().unwrap_or_default(),
            limit: self.overrun_limit().unwrap_or_default(),
        }
    }

    /// Applies an event and appends it to the audit trail.
    fn record(&mut self, occurred_at: DateTime<Utc>, event: OrderEvent) {
        self.apply(event.clone());
        self.version = self.version.next();
        self.events.push(RecordedEvent {
            event_id: EventId::new(),
            order_id: self.order_id(),
            sequence: self.version,
            occurred_at,
            event,
        });
    }

    fn apply_created(&mut self, data: OrderCreatedData) {
        self.id = Some(data.order_id);
        self.customer = data.customer;
        self.vehicle = data.vehicle;
        self.status = OrderStatus::Created;
    }

    fn apply_real_cost_set(&mut self, data: RealCostSetData) {
        if let Some(service) = self.services.iter_mut().find(|s| s.id == data.service_id) {
            match data.component_id {
                Some(component_id) => {
                    if let Some(component) = service.component_mut(component_id) {
                        component.real_cost = Some(data.real_cost);
                    }
                }
                None => {
                    service.real_cost = Some(data.real_cost);
                    service.completed = data.completed;
                }
            }
            service.real_total = data.service_real_total;
        }
        self.real_total = data.real_total;
    }
}

fn validate_new_service(service: &NewService) -> Result<(), OrderError> {
    if service.description.trim().is_empty() {
        return Err(OrderError::MissingField {
            field: "description",
        });
    }
    if service.labor_estimated_cost.is_negative() {
        return Err(OrderError::NegativeAmount {
            field: "labor_estimated_cost",
            amount: service.labor_estimated_cost,
        });
    }

    for component in &service.components {
        if component.name.trim().is_empty() {
            return Err(OrderError::MissingField { field: "name" });
        }
        if component.quantity == 0 {
            return Err(OrderError::InvalidQuantity {
                name: component.name.clone(),
                quantity: component.quantity,
            });
        }
        if component.unit_cost.is_negative() {
            return Err(OrderError::NegativeAmount {
                field: "unit_cost",
                amount: component.unit_cost,
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::order::NewComponent;
    use chrono::TimeZone;
    use rust_decimal::Decimal;

    fn money(s: &str) -> Money {
        s.parse().unwrap()
    }

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap()
    }

    fn create_order() -> RepairOrder {
        let mut order = RepairOrder::default();
        order
            .create(OrderId::new("R001"), "ACME", "ABC-123", ts())
            .unwrap();
        order
    }

    fn engine_repair() -> NewService {
        NewService::new("Engine repair", money("10000.00"))
            .with_component(NewComponent::new("Oil pump", money("1500.00"), 1))
    }

    /// Order with one service (subtotal 11500.00), authorized and in progress.
    fn in_progress_order() -> RepairOrder {
        let mut order = create_order();
        order.add_service(engine_repair(), ts()).unwrap();
        order.authorize(ts()).unwrap();
        order.start_work(ts()).unwrap();
        order
    }

    fn event_types(order: &RepairOrder) -> Vec<&'static str> {
        order.events().iter().map(RecordedEvent::event_type).collect()
    }

    #[test]
    fn test_create_order() {
        let order = create_order();
        assert_eq!(order.id(), Some(&OrderId::new("R001")));
        assert_eq!(order.customer(), "ACME");
        assert_eq!(order.vehicle(), "ABC-123");
        assert_eq!(order.status(), OrderStatus::Created);
        assert_eq!(order.version(), Version::new(1));
        assert_eq!(event_types(&order), vec!["CREATED"]);
    }

    #[test]
    fn test_create_order_twice_fails() {
        let mut order = create_order();
        let result = order.create(OrderId::new("R001"), "ACME", "ABC-123", ts());
        assert_eq!(result, Err(OrderError::AlreadyCreated));
        assert_eq!(order.events().len(), 1);
    }

    #[test]
    fn test_create_requires_fields() {
        let mut order = RepairOrder::default();
        let result = order.create(OrderId::new("R001"), "", "ABC-123", ts());
        assert_eq!(result, Err(OrderError::MissingField { field: "customer" }));
        assert!(order.id().is_none());
        assert!(order.events().is_empty());
    }

    #[test]
    fn test_add_service_assigns_positions() {
        let mut order = create_order();
        order.add_service(engine_repair(), ts()).unwrap();
        order
            .add_service(NewService::new("Alignment", money("800.00")), ts())
            .unwrap();

        let ids: Vec<u32> = order.services().iter().map(|s| s.id.get()).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(order.subtotal_estimated(), money("12300.00"));
    }

    #[test]
    fn test_add_service_rejects_zero_quantity() {
        let mut order = create_order();
        let service = NewService::new("Brakes", money("100.00"))
            .with_component(NewComponent::new("Pads", money("50.00"), 0));

        let err = order.add_service(service, ts()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::ValidationError);
        assert!(order.services().is_empty());
    }

    #[test]
    fn test_diagnose_only_once() {
        let mut order = create_order();
        order.diagnose(ts()).unwrap();
        assert_eq!(order.status(), OrderStatus::Diagnosed);

        let err = order.diagnose(ts()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::SequenceError);
    }

    #[test]
    fn test_authorize_without_services_fails() {
        let mut order = create_order();
        let err = order.authorize(ts()).unwrap_err();
        assert_eq!(err, OrderError::NoServices);
        assert_eq!(order.status(), OrderStatus::Created);
        assert!(order.authorization().is_none());
    }

    #[test]
    fn test_authorize_applies_tax() {
        let mut order = create_order();
        order.add_service(engine_repair(), ts()).unwrap();
        order.authorize(ts()).unwrap();

        assert_eq!(order.status(), OrderStatus::Authorized);
        assert_eq!(order.authorized_amount(), Some(money("13340.00")));
        assert_eq!(order.overrun_limit(), Some(money("14674.00")));
    }

    #[test]
    fn test_authorize_from_diagnosed() {
        let mut order = create_order();
        order.add_service(engine_repair(), ts()).unwrap();
        order.diagnose(ts()).unwrap();
        order.authorize(ts()).unwrap();
        assert_eq!(order.status(), OrderStatus::Authorized);
    }

    #[test]
    fn test_services_locked_after_authorization() {
        let mut order = create_order();
        order.add_service(engine_repair(), ts()).unwrap();
        order.authorize(ts()).unwrap();

        let err = order.add_service(engine_repair(), ts()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotAllowedAfterAuthorization);
        assert_eq!(order.services().len(), 1);
    }

    #[test]
    fn test_start_work_requires_authorization() {
        let mut order = create_order();
        let err = order.start_work(ts()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::SequenceError);
    }

    #[test]
    fn test_set_real_cost_on_component() {
        let mut order = in_progress_order();
        order
            .set_real_cost(
                ServiceId::new(1),
                Some(ComponentId::new(1)),
                money("1600.00"),
                false,
                ts(),
            )
            .unwrap();
        order
            .set_real_cost(ServiceId::new(1), None, money("9000.00"), true, ts())
            .unwrap();

        assert_eq!(order.status(), OrderStatus::InProgress);
        assert_eq!(order.real_total(), money("10600.00"));
        assert!(order.service(ServiceId::new(1)).unwrap().completed);
    }

    #[test]
    fn test_set_real_cost_overwrites_previous_value() {
        let mut order = in_progress_order();
        order
            .set_real_cost(ServiceId::new(1), None, money("5000.00"), false, ts())
            .unwrap();
        order
            .set_real_cost(ServiceId::new(1), None, money("7000.00"), false, ts())
            .unwrap();
        assert_eq!(order.real_total(), money("7000.00"));
    }

    #[test]
    fn test_component_cost_keeps_service_completion() {
        let mut order = in_progress_order();
        order
            .set_real_cost(ServiceId::new(1), None, money("9000.00"), true, ts())
            .unwrap();
        order
            .set_real_cost(
                ServiceId::new(1),
                Some(ComponentId::new(1)),
                money("1600.00"),
                false,
                ts(),
            )
            .unwrap();

        let service = order.service(ServiceId::new(1)).unwrap();
        assert!(service.completed);
        assert_eq!(service.real_total, money("10600.00"));
    }

    #[test]
    fn test_add_service_with_unrepresentable_estimate() {
        let mut order = create_order();
        let service = NewService::new("Fleet overhaul", money("0"))
            .with_component(NewComponent::new(
                "Gearbox",
                money("100000000000000000000"),
                u32::MAX,
            ));

        let err = order.add_service(service, ts()).unwrap_err();
        assert_eq!(
            err,
            OrderError::AmountOutOfRange {
                field: "estimated_cost"
            }
        );
        assert_eq!(err.code(), ErrorCode::ValidationError);
        assert!(order.services().is_empty());
        assert_eq!(order.version(), Version::new(1));
    }

    #[test]
    fn test_add_service_with_unrepresentable_subtotal() {
        let mut order = create_order();
        let huge = Money::new(Decimal::MAX);
        order.add_service(NewService::new("Rebuild", huge), ts()).unwrap();

        let err = order
            .add_service(NewService::new("Paint", money("1.00")), ts())
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::ValidationError);
        assert_eq!(order.services().len(), 1);
        assert_eq!(order.subtotal_estimated(), huge);

        let err = order.authorize(ts()).unwrap_err();
        assert_eq!(
            err,
            OrderError::AmountOutOfRange {
                field: "authorized_amount"
            }
        );
        assert_eq!(order.status(), OrderStatus::Created);
    }

    #[test]
    fn test_set_real_cost_with_unrepresentable_total() {
        let mut order = in_progress_order();
        order
            .set_real_cost(
                ServiceId::new(1),
                Some(ComponentId::new(1)),
                Money::new(Decimal::MAX),
                false,
                ts(),
            )
            .unwrap();
        let before = order.clone();

        let err = order
            .set_real_cost(ServiceId::new(1), None, money("1.00"), true, ts())
            .unwrap_err();
        assert_eq!(err, OrderError::AmountOutOfRange { field: "real_cost" });
        assert_eq!(order, before);
    }

    #[test]
    fn test_set_real_cost_unknown_service() {
        let mut order = in_progress_order();
        let err = order
            .set_real_cost(ServiceId::new(9), None, money("1.00"), false, ts())
            .unwrap_err();
        assert_eq!(err, OrderError::ServiceNotFound(ServiceId::new(9)));
    }

    #[test]
    fn test_set_real_cost_before_work_fails() {
        let mut order = create_order();
        order.add_service(engine_repair(), ts()).unwrap();
        let err = order
            .set_real_cost(ServiceId::new(1), None, money("1.00"), false, ts())
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::SequenceError);
    }

    #[test]
    fn test_complete_within_limit() {
        let mut order = in_progress_order();
        order
            .set_real_cost(ServiceId::new(1), None, money("14674.00"), true, ts())
            .unwrap();

        order.try_complete(ts()).unwrap();
        assert_eq!(order.status(), OrderStatus::Completed);
    }

    #[test]
    fn test_complete_over_limit_requires_reauth() {
        let mut order = in_progress_order();
        order
            .set_real_cost(ServiceId::new(1), None, money("14674.01"), true, ts())
            .unwrap();
        let before = order.version();

        let err = order.try_complete(ts()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::RequiresReauth);
        assert_eq!(order.status(), OrderStatus::WaitingForApproval);
        assert_eq!(order.events_since(before).len(), 1);
        assert_eq!(order.events_since(before)[0].event_type(), "WAITING_FOR_APPROVAL");
    }

    #[test]
    fn test_complete_while_waiting_is_blocked() {
        let mut order = in_progress_order();
        order
            .set_real_cost(ServiceId::new(1), None, money("20000.00"), true, ts())
            .unwrap();
        let _ = order.try_complete(ts());
        let before = order.version();

        let err = order.try_complete(ts()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::RequiresReauth);
        assert_eq!(order.version(), before);
    }

    #[test]
    fn test_reauthorize_then_complete() {
        let mut order = in_progress_order();
        order
            .set_real_cost(ServiceId::new(1), None, money("20000.00"), true, ts())
            .unwrap();
        let _ = order.try_complete(ts());

        order.reauthorize(Some(money("20000.00")), ts()).unwrap();
        assert_eq!(order.status(), OrderStatus::Authorized);
        assert_eq!(order.authorization().unwrap().reauthorization_count, 1);

        order.start_work(ts()).unwrap();
        order.try_complete(ts()).unwrap();
        order.deliver(ts()).unwrap();
        assert_eq!(order.status(), OrderStatus::Delivered);
    }

    #[test]
    fn test_reauthorize_defaults_to_real_total() {
        let mut order = in_progress_order();
        order
            .set_real_cost(ServiceId::new(1), None, money("15000.005"), true, ts())
            .unwrap();
        let _ = order.try_complete(ts());

        order.reauthorize(None, ts()).unwrap();
        assert_eq!(order.authorized_amount(), Some(money("15000.00")));
    }

    #[test]
    fn test_reauthorize_outside_waiting_fails() {
        let mut order = in_progress_order();
        let err = order.reauthorize(None, ts()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::SequenceError);
    }

    #[test]
    fn test_deliver_requires_completion() {
        let mut order = in_progress_order();
        let err = order.deliver(ts()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::SequenceError);
    }

    #[test]
    fn test_delivered_order_rejects_everything() {
        let mut order = in_progress_order();
        order.try_complete(ts()).unwrap();
        order.deliver(ts()).unwrap();

        let err = order.cancel(None, ts()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotAllowedAfterAuthorization);
        let err = order.diagnose(ts()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotAllowedAfterAuthorization);
    }

    #[test]
    fn test_cancel_records_reason() {
        let mut order = create_order();
        order
            .cancel(Some("customer declined".to_string()), ts())
            .unwrap();
        assert_eq!(order.status(), OrderStatus::Cancelled);
        assert_eq!(order.cancel_reason(), Some("customer declined"));
        assert!(order.is_terminal());
    }

    #[test]
    fn test_cancelled_order_rejects_everything() {
        let mut order = create_order();
        order.cancel(None, ts()).unwrap();

        let err = order.add_service(engine_repair(), ts()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::OrderCancelled);
        let err = order.cancel(None, ts()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::OrderCancelled);
    }

    #[test]
    fn test_cancel_completed_order_fails() {
        let mut order = in_progress_order();
        order.try_complete(ts()).unwrap();
        let err = order.cancel(None, ts()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::SequenceError);
    }

    #[test]
    fn test_events_carry_sequence_numbers() {
        let order = in_progress_order();
        let sequences: Vec<i64> = order.events().iter().map(|e| e.sequence.as_i64()).collect();
        assert_eq!(sequences, vec![1, 2, 3, 4]);
        assert!(order.events().iter().all(|e| e.order_id.as_str() == "R001"));
        assert_eq!(
            event_types(&order),
            vec!["CREATED", "SERVICE_ADDED", "AUTHORIZED", "IN_PROGRESS"]
        );
    }

    #[test]
    fn test_failed_command_leaves_order_untouched() {
        let mut order = create_order();
        let before = order.clone();
        let _ = order.authorize(ts());
        assert_eq!(order, before);
    }

    #[test]
    fn test_serde_roundtrip() {
        let order = in_progress_order();
        let json = serde_json::to_value(&order).unwrap();
        let restored: RepairOrder = serde_json::from_value(json).unwrap();
        assert_eq!(restored, order);
    }
}
