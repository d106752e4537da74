//! Read-only order endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use common::OrderId;
use domain::{OrderSummary, RecordedEvent, RepairOrder, RepairOrderRepository};

use crate::AppState;
use crate::error::ApiError;

/// GET /api/v1/orders: every order, in creation order.
#[tracing::instrument(skip(state))]
pub async fn list<R: RepairOrderRepository + 'static>(
    State(state): State<Arc<AppState<R>>>,
) -> Result<Json<Vec<OrderSummary>>, ApiError> {
    let orders = state.handler.orders().await?;
    Ok(Json(orders.iter().map(OrderSummary::from).collect()))
}

/// GET /api/v1/orders/{id}: one order.
#[tracing::instrument(skip(state))]
pub async fn get<R: RepairOrderRepository + 'static>(
    State(state): State<Arc<AppState<R>>>,
    Path(id): Path<String>,
) -> Result<Json<OrderSummary>, ApiError> {
    let order = load(&state, id).await?;
    Ok(Json(OrderSummary::from(&order)))
}

/// GET /api/v1/orders/{id}/events: the full audit trail of one order.
#[tracing::instrument(skip(state))]
pub async fn events<R: RepairOrderRepository + 'static>(
    State(state): State<Arc<AppState<R>>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<RecordedEvent>>, ApiError> {
    let order = load(&state, id).await?;
    Ok(Json(order.events().to_vec()))
}

async fn load<R: RepairOrderRepository>(
    state: &AppState<R>,
    id: String,
) -> Result<RepairOrder, ApiError> {
    let order_id = OrderId::new(id);
    state
        .handler
        .order(&order_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Order not found: {order_id}")))
}
