//! In-process HTTP tests: the production router over in-memory collaborators,
//! with deterministic ids and a fixed clock.

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use chrono::{DateTime, TimeZone, Utc};
use serde_json::{Value, json};
use tower::ServiceExt;

use medsupply_api::app::{self, AppServices};
use medsupply_core::{FixedClock, OrderId, SequentialIdGenerator};
use medsupply_events::EventBus;
use medsupply_infra::{InMemoryOrderStore, OrderStore, ServiceConfig};
use medsupply_replenishment::Priority;

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 3, 12, 0, 0).unwrap()
}

fn test_app() -> (Router, Arc<AppServices>) {
    let services = Arc::new(AppServices::new(
        Arc::new(InMemoryOrderStore::new()),
        Arc::new(SequentialIdGenerator::new()),
        Arc::new(FixedClock::new(now())),
        &ServiceConfig::default(),
    ));
    (app::build_app(services.clone()), services)
}

async fn post(app: &Router, uri: &str, body: impl Into<Body>) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(body.into())
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn stock_update(current: i64, daily: i64, dos: f64) -> Value {
    json!({
        "hospitalId": "Hospital-A",
        "productCode": "PHYSIO-SALINE",
        "currentStockUnits": current,
        "dailyConsumptionUnits": daily,
        "daysOfSupply": dos,
        "timestamp": "2026-01-03T12:00:00Z"
    })
}

fn low_inventory(event_id: &str, current: i64, daily: i64, dos: f64) -> Value {
    json!({
        "eventId": event_id,
        "eventType": "InventoryLow",
        "hospitalId": "Hospital-B",
        "productCode": "SURGICAL-GLOVES-M",
        "currentStockUnits": current,
        "dailyConsumptionUnits": daily,
        "daysOfSupply": dos,
        "threshold": 2.0,
        "timestamp": "2026-01-03T12:00:00.000Z"
    })
}

#[tokio::test]
async fn health_lists_the_services() {
    let (app, _) = test_app();

    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["status"], "healthy");
    let services = body["services"].as_array().unwrap();
    assert!(services.contains(&json!("StockUpdateService")));
    assert!(services.contains(&json!("OrderCreationService")));
}

#[tokio::test]
async fn low_stock_update_creates_an_order() {
    let (app, services) = test_app();

    let (status, body) = post(&app, "/stock-updates", stock_update(40, 30, 1.33).to_string()).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["orderTriggered"], true);
    let order_id = body["orderId"].as_str().unwrap().to_string();
    assert!(order_id.starts_with("ORD-20260103-"), "unexpected id {order_id}");
    assert_eq!(body["message"], format!("Order created: {order_id}"));

    let order = services
        .store()
        .get_order(&OrderId::parse(order_id).unwrap())
        .unwrap()
        .unwrap();
    assert_eq!(order.order_quantity, 170);
    assert_eq!(order.priority, Priority::High);
}

#[tokio::test]
async fn adequate_stock_update_creates_nothing() {
    let (app, _) = test_app();

    let (status, body) = post(&app, "/stock-updates", stock_update(500, 100, 5.0).to_string()).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["orderTriggered"], false);
    assert_eq!(body["message"], "Stock adequate");
    assert!(body.get("orderId").is_none());
}

#[tokio::test]
async fn missing_field_is_a_validation_fault() {
    let (app, _) = test_app();
    let mut payload = stock_update(40, 30, 1.33);
    payload.as_object_mut().unwrap().remove("currentStockUnits");

    let (status, body) = post(&app, "/stock-updates", payload.to_string()).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errorCode"], "VALIDATION_ERROR");
    assert_eq!(body["hospitalId"], "Hospital-A");
    assert!(body["errorMessage"].as_str().unwrap().contains("currentStockUnits"));
}

#[tokio::test]
async fn undecodable_body_is_a_parse_fault() {
    let (app, _) = test_app();

    let (status, body) = post(&app, "/stock-updates", "<soap:Envelope>").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errorCode"], "PARSE_ERROR");
    assert!(body.get("hospitalId").is_none());
}

#[tokio::test]
async fn manual_order_is_created_once() {
    let (app, services) = test_app();
    let payload = json!({
        "orderId": "ORD-20260103-0000ABCD",
        "hospitalId": "Hospital-C",
        "productCode": "N95-MASKS",
        "orderQuantity": 200,
        "priority": "NORMAL",
        "timestamp": "2026-01-03T09:00:00Z"
    })
    .to_string();

    let (status, body) = post(&app, "/orders", payload.clone()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "Order processed");
    assert_eq!(body["orderId"], "ORD-20260103-0000ABCD");

    let (status, body) = post(&app, "/orders", payload).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Order ORD-20260103-0000ABCD already exists");

    let order = services
        .store()
        .get_order(&OrderId::parse("ORD-20260103-0000ABCD").unwrap())
        .unwrap()
        .unwrap();
    assert_eq!(order.priority, Priority::Normal);
}

#[tokio::test]
async fn manual_order_with_bad_priority_is_rejected() {
    let (app, _) = test_app();
    let payload = json!({
        "hospitalId": "Hospital-C",
        "productCode": "N95-MASKS",
        "orderQuantity": 200,
        "priority": "WHENEVER",
        "timestamp": "2026-01-03T09:00:00Z"
    });

    let (status, body) = post(&app, "/orders", payload.to_string()).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errorCode"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn batch_with_a_malformed_entry_flushes_the_rest() {
    let (app, services) = test_app();
    let subscription = services.outbound.subscribe();
    let batch = json!([
        low_inventory("evt-http-001", 40, 30, 1.33),
        low_inventory("evt-http-002", 25, 50, 0.5),
        "not an event",
        low_inventory("evt-http-004", 30, 20, 1.5),
    ]);

    let (status, body) = post(&app, "/events/batch", batch.to_string()).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["received"], 4);
    assert_eq!(body["ordersTriggered"], 3);
    assert_eq!(body["failures"].as_array().unwrap().len(), 1);
    assert_eq!(body["failures"][0]["sequenceNumber"], 2);
    assert_eq!(body["failures"][0]["step"], "parse");
    assert_eq!(body["commands"][0]["commandType"], "CreateOrder");

    let published = subscription.drain();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].len(), 3);
}

#[tokio::test]
async fn redelivered_batch_is_dropped() {
    let (app, _) = test_app();
    let batch = json!([low_inventory("evt-http-010", 25, 50, 0.5)]).to_string();

    let (_, first) = post(&app, "/events/batch", batch.clone()).await;
    let (status, second) = post(&app, "/events/batch", batch).await;

    assert_eq!(first["ordersTriggered"], 1);
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["ordersTriggered"], 0);
    assert_eq!(second["duplicates"], 1);
}

#[tokio::test]
async fn batch_body_must_be_an_array() {
    let (app, _) = test_app();

    let (status, body) = post(&app, "/events/batch", low_inventory("evt-x", 1, 1, 1.0).to_string()).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "parse_error");
}
