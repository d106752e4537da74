//! HTTP API server with observability for the repair order system.
//!
//! Provides the command batch endpoint, reset, and read-only order views,
//! with structured logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use domain::{CommandHandler, RepairOrderRepository, SnapshotRepository};
use metrics_exporter_prometheus::PrometheusHandle;
use order_store::InMemorySnapshotStore;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared application state accessible from all handlers.
pub struct AppState<R> {
    pub handler: CommandHandler<R>,
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<R: RepairOrderRepository + 'static>(
    state: Arc<AppState<R>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/api/v1/commands", post(routes::commands::execute::<R>))
        .route("/api/v1/reset", post(routes::commands::reset::<R>))
        .route("/api/v1/orders", get(routes::orders::list::<R>))
        .route("/api/v1/orders/{id}", get(routes::orders::get::<R>))
        .route("/api/v1/orders/{id}/events", get(routes::orders::events::<R>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates the default application state backed by an in-memory store.
pub fn create_default_state() -> Arc<AppState<SnapshotRepository<InMemorySnapshotStore>>> {
    let repository = SnapshotRepository::new(InMemorySnapshotStore::new());
    Arc::new(AppState {
        handler: CommandHandler::new(repository),
    })
}

/// Registers descriptions for the metrics the domain records.
pub fn describe_metrics() {
    metrics::describe_counter!(
        "repair_order_commands_total",
        "Commands processed, labelled by op and outcome"
    );
    metrics::describe_counter!(
        "repair_order_reauthorizations_required_total",
        "Completion attempts that exceeded the overrun limit"
    );
    metrics::describe_counter!("repair_order_batches_total", "Command batches processed");
    metrics::describe_histogram!(
        "repair_order_batch_duration_seconds",
        metrics::Unit::Seconds,
        "Time spent processing one command batch"
    );
}
