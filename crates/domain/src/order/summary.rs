//! Read-side views of a repair order.
//!
//! Money is rendered as a string with exactly two fraction digits.

use serde::{Deserialize, Serialize};

use super::{Component, OrderStatus, RecordedEvent, RepairOrder, Service};

/// Snapshot of an order as reported to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSummary {
    pub order_id: String,
    pub status: OrderStatus,
    pub customer: String,
    pub vehicle: String,
    pub subtotal_estimated: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorized_amount: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overrun_limit: Option<String>,

    /// Omitted while nothing real has been recorded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub real_total: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancel_reason: Option<String>,

    pub services: Vec<ServiceSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceSummary {
    pub service_id: u32,
    pub description: String,
    pub labor_estimated_cost: String,
    pub estimated_cost: String,
    pub real_cost: String,
    pub completed: bool,
    pub components: Vec<ComponentSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentSummary {
    pub component_id: u32,
    pub name: String,
    pub unit_cost: String,
    pub quantity: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub real_cost: Option<String>,
}

/// Minimal event view: which order, which event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventSummary {
    pub order_id: String,

    #[serde(rename = "type")]
    pub event_type: String,
}

impl From<&RepairOrder> for OrderSummary {
    fn from(order: &RepairOrder) -> Self {
        let real_total = order.real_total();
        Self {
            order_id: order.order_id().to_string(),
            status: order.status(),
            customer: order.customer().to_string(),
            vehicle: order.vehicle().to_string(),
            subtotal_estimated: order.subtotal_estimated().to_string(),
            authorized_amount: order.authorized_amount().map(|m| m.to_string()),
            overrun_limit: order.overrun_limit().map(|m| m.to_string()),
            real_total: (!real_total.is_zero()).then(|| real_total.to_string()),
            cancel_reason: order.cancel_reason().map(str::to_string),
            services: order.services().iter().map(ServiceSummary::from).collect(),
        }
    }
}

impl From<&Service> for ServiceSummary {
    fn from(service: &Service) -> Self {
        Self {
            service_id: service.id.get(),
            description: service.description.clone(),
            labor_estimated_cost: service.labor_estimated_cost.to_string(),
            estimated_cost: service.estimated_cost.to_string(),
            real_cost: service.real_total.to_string(),
            completed: service.completed,
            components: service.components.iter().map(ComponentSummary::from).collect(),
        }
    }
}

impl From<&Component> for ComponentSummary {
    fn from(component: &Component) -> Self {
        Self {
            component_id: component.id.get(),
            name: component.name.clone(),
            unit_cost: component.unit_cost.to_string(),
            quantity: component.quantity,
            real_cost: component.real_cost.map(|m| m.to_string()),
        }
    }
}

impl From<&RecordedEvent> for EventSummary {
    fn from(event: &RecordedEvent) -> Self {
        Self {
            order_id: event.order_id.to_string(),
            event_type: event.event_type().to_string(),
        }
    }
}
