//! Integration tests for the API server.

use std::sync::OnceLock;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::{Value, json};
use tower::ServiceExt;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            builder
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

fn setup() -> axum::Router {
    let state = api::create_default_state();
    api::create_app(state, get_metrics_handle())
}

async fn send(app: &axum::Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap_or(Value::Null)
    };
    (status, json)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_string(body).unwrap()))
        .unwrap()
}

fn lifecycle_batch(real_cost: &str) -> Value {
    json!({
        "commands": [
            {"op": "CREATE_ORDER", "ts": "2025-03-01T09:00:00Z",
             "data": {"order_id": "R001", "customer": "ACME", "vehicle": "ABC-123"}},
            {"op": "ADD_SERVICE", "ts": "2025-03-01T09:05:00Z",
             "data": {"order_id": "R001", "service": {
                 "description": "Engine repair",
                 "labor_estimated_cost": "10000.00",
                 "components": [{"description": "Oil pump", "estimated_cost": "1500.00"}]}}},
            {"op": "SET_STATE_DIAGNOSED", "ts": "2025-03-01T09:10:00Z", "data": {"order_id": "R001"}},
            {"op": "AUTHORIZE", "ts": "2025-03-01T09:11:00Z", "data": {"order_id": "R001"}},
            {"op": "SET_STATE_IN_PROGRESS", "ts": "2025-03-01T09:15:00Z", "data": {"order_id": "R001"}},
            {"op": "SET_REAL_COST", "ts": "2025-03-01T09:20:00Z",
             "data": {"order_id": "R001", "service_index": 1, "real_cost": real_cost, "completed": true}},
            {"op": "TRY_COMPLETE", "ts": "2025-03-01T09:25:00Z", "data": {"order_id": "R001"}}
        ]
    })
}

#[tokio::test]
async fn test_health_check() {
    let app = setup();
    let (status, json) = send(&app, get("/health")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, json!({"status": "healthy"}));
}

#[tokio::test]
async fn test_command_batch_completes_order() {
    let app = setup();
    let (status, json) = send(&app, post_json("/api/v1/commands", &lifecycle_batch("11500.00"))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["errors"], json!([]));
    assert_eq!(json["results"].as_array().unwrap().len(), 7);
    let order = &json["orders"][0];
    assert_eq!(order["status"], "COMPLETED");
    assert_eq!(order["subtotal_estimated"], "11500.00");
    assert_eq!(order["authorized_amount"], "13340.00");
}

#[tokio::test]
async fn test_command_batch_reports_overrun() {
    let app = setup();
    let (status, json) = send(&app, post_json("/api/v1/commands", &lifecycle_batch("15000.00"))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["orders"][0]["status"], "WAITING_FOR_APPROVAL");
    assert_eq!(json["orders"][0]["real_total"], "15000.00");
    assert_eq!(
        json["errors"],
        json!([{
            "op": "TRY_COMPLETE",
            "order_id": "R001",
            "code": "REQUIRES_REAUTH",
            "message": json["errors"][0]["message"]
        }])
    );
    assert_eq!(json["results"][6]["events"][0]["event"]["type"], "WAITING_FOR_APPROVAL");
}

#[tokio::test]
async fn test_unsupported_operation_is_reported_not_rejected() {
    let app = setup();
    let body = json!({"commands": [{"op": "WARP", "ts": "2025-03-01T09:00:00Z", "data": {}}]});
    let (status, json) = send(&app, post_json("/api/v1/commands", &body)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["results"][0]["success"], false);
    assert_eq!(json["errors"][0]["code"], "UNSUPPORTED_OPERATION");
}

#[tokio::test]
async fn test_malformed_body_is_rejected() {
    let app = setup();
    let (status, _) = send(&app, post_json("/api/v1/commands", &json!({"orders": []}))).await;

    assert!(status.is_client_error());
}

#[tokio::test]
async fn test_get_order_and_events() {
    let app = setup();
    send(&app, post_json("/api/v1/commands", &lifecycle_batch("11500.00"))).await;

    let (status, order) = send(&app, get("/api/v1/orders/R001")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(order["order_id"], "R001");
    assert_eq!(order["services"][0]["description"], "Engine repair");

    let (status, events) = send(&app, get("/api/v1/orders/R001/events")).await;
    assert_eq!(status, StatusCode::OK);
    let types: Vec<&str> = events
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["event"]["type"].as_str().unwrap())
        .collect();
    assert_eq!(
        types,
        vec![
            "CREATED",
            "SERVICE_ADDED",
            "DIAGNOSED",
            "AUTHORIZED",
            "IN_PROGRESS",
            "REAL_COST_SET",
            "COMPLETED"
        ]
    );
}

#[tokio::test]
async fn test_get_nonexistent_order() {
    let app = setup();
    let (status, json) = send(&app, get("/api/v1/orders/R404")).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "Order not found: R404");
}

#[tokio::test]
async fn test_list_orders() {
    let app = setup();
    let body = json!({"commands": [
        {"op": "CREATE_ORDER", "ts": "2025-03-01T09:00:00Z",
         "data": {"order_id": "R001", "customer": "ACME", "vehicle": "ABC-123"}},
        {"op": "CREATE_ORDER", "ts": "2025-03-01T09:00:00Z",
         "data": {"order_id": "R002", "customer": "BETA", "vehicle": "XYZ-789"}}
    ]});
    send(&app, post_json("/api/v1/commands", &body)).await;

    let (status, json) = send(&app, get("/api/v1/orders")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json.as_array().unwrap().len(), 2);
    assert_eq!(json[1]["customer"], "BETA");
}

#[tokio::test]
async fn test_reset_clears_orders() {
    let app = setup();
    send(&app, post_json("/api/v1/commands", &lifecycle_batch("11500.00"))).await;

    let (status, json) = send(&app, post_json("/api/v1/reset", &json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, json!({"status": "ok", "message": "Repository cleared"}));

    let (_, orders) = send(&app, get("/api/v1/orders")).await;
    assert_eq!(orders, json!([]));
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let app = setup();
    send(&app, post_json("/api/v1/commands", &lifecycle_batch("11500.00"))).await;

    let response = app.clone().oneshot(get("/metrics")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("repair_order_commands_total"));
}
