//! Command batch and reset endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use domain::{BatchResponse, CommandRequest, RepairOrderRepository};
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct BatchRequest {
    pub commands: Vec<CommandRequest>,
}

#[derive(Debug, Serialize)]
pub struct ResetResponse {
    pub status: &'static str,
    pub message: &'static str,
}

/// POST /api/v1/commands: applies a batch in input order.
///
/// Responds 200 even when individual commands fail.
#[tracing::instrument(skip(state, req), fields(batch_size = req.commands.len()))]
pub async fn execute<R: RepairOrderRepository + 'static>(
    State(state): State<Arc<AppState<R>>>,
    Json(req): Json<BatchRequest>,
) -> Result<Json<BatchResponse>, ApiError> {
    let response = state.handler.execute(req.commands).await?;
    Ok(Json(response))
}

/// POST /api/v1/reset: discards every stored order.
#[tracing::instrument(skip(state))]
pub async fn reset<R: RepairOrderRepository + 'static>(
    State(state): State<Arc<AppState<R>>>,
) -> Result<Json<ResetResponse>, ApiError> {
    state.handler.reset().await?;
    Ok(Json(ResetResponse {
        status: "ok",
        message: "Repository cleared",
    }))
}
