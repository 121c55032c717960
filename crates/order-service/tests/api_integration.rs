//! Integration tests for the order service HTTP surface.

use std::sync::OnceLock;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::Utc;
use metrics_exporter_prometheus::PrometheusHandle;
use order_saga::{
    CheckoutCompletedData, CheckoutLineItem, CustomerId, InboundEnvelope, InboundMessage,
    MessageId, Money, OrderId, PaymentCapturedData, PaymentId, PaymentMethodToken,
    ShippingAddress, ShippingMethod, Sku,
};
use saga_runtime::RuntimeConfig;
use saga_store::InMemorySagaStore;
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
    let state = order_service::create_state(InMemorySagaStore::new(), RuntimeConfig::default());
    order_service::create_app(state, get_metrics_handle())
}

fn checkout(order_id: OrderId) -> InboundMessage {
    InboundMessage::CheckoutCompleted(CheckoutCompletedData {
        order_id,
        customer_id: Some(CustomerId::new()),
        line_items: vec![
            CheckoutLineItem {
                sku: Sku::new("SKU-001"),
                quantity: 2,
                unit_price: Money::from_cents(1999),
            },
            CheckoutLineItem {
                sku: Sku::new("SKU-002"),
                quantity: 1,
                unit_price: Money::from_cents(3999),
            },
        ],
        shipping_address: Some(ShippingAddress {
            recipient: "Grace Hopper".to_string(),
            line1: "1 Navy Way".to_string(),
            line2: None,
            city: "Arlington".to_string(),
            region: Some("VA".to_string()),
            postal_code: "22202".to_string(),
            country: "US".to_string(),
        }),
        shipping_method: ShippingMethod::Express,
        shipping_cost: Money::from_cents(599),
        payment_method_token: Some(PaymentMethodToken::new("tok_mastercard")),
        completed_at: Utc::now(),
    })
}

fn captured(order_id: OrderId) -> InboundMessage {
    InboundMessage::PaymentCaptured(PaymentCapturedData {
        payment_id: PaymentId::new("pay-1"),
        order_id,
        amount: Money::from_cents(8596),
        transaction_id: "txn-1".to_string(),
        captured_at: Utc::now(),
    })
}

async fn post_message(app: axum::Router, envelope: &InboundEnvelope) -> axum::response::Response {
    app.oneshot(
        Request::builder()
            .method("POST")
            .uri("/messages")
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_string(envelope).unwrap()))
            .unwrap(),
    )
    .await
    .unwrap()
}

async fn get(app: axum::Router, uri: &str) -> axum::response::Response {
    app.oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn test_health_check() {
    let app = setup();

    let response = get(app, "/health").await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = json_body(response).await;
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_checkout_is_accepted_and_applied() {
    let app = setup();
    let order_id = OrderId::new();

    let response = post_message(app, &InboundEnvelope::new(checkout(order_id))).await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let json = json_body(response).await;
    assert_eq!(json["outcome"], "applied");
    assert_eq!(json["status"], "Placed");
    assert_eq!(json["version"], 1);
    assert_eq!(json["emitted"], 1);
}

#[tokio::test]
async fn test_get_order_after_checkout() {
    let app = setup();
    let order_id = OrderId::new();

    let response = post_message(app.clone(), &InboundEnvelope::new(checkout(order_id))).await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let response = get(app, &format!("/orders/{order_id}")).await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = json_body(response).await;
    assert_eq!(json["order_id"], order_id.to_string());
    assert_eq!(json["status"], "Placed");
    assert_eq!(json["total_amount"], 8596);
    assert_eq!(json["shipping_method"], "Express");
    assert_eq!(json["line_items"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_order_status_follows_messages() {
    let app = setup();
    let order_id = OrderId::new();

    post_message(app.clone(), &InboundEnvelope::new(checkout(order_id))).await;
    let response = post_message(app.clone(), &InboundEnvelope::new(captured(order_id))).await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let json = json_body(get(app, &format!("/orders/{order_id}")).await).await;
    assert_eq!(json["status"], "PaymentConfirmed");
}

#[tokio::test]
async fn test_redelivery_is_accepted_as_duplicate() {
    let app = setup();
    let order_id = OrderId::new();
    let envelope = InboundEnvelope::with_id(MessageId::new(), checkout(order_id));

    post_message(app.clone(), &envelope).await;
    let response = post_message(app, &envelope).await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let json = json_body(response).await;
    assert_eq!(json["outcome"], "duplicate");
}

#[tokio::test]
async fn test_invalid_checkout_is_bad_request() {
    let app = setup();
    let order_id = OrderId::new();
    let InboundMessage::CheckoutCompleted(mut data) = checkout(order_id) else {
        unreachable!()
    };
    data.line_items.clear();

    let response = post_message(
        app.clone(),
        &InboundEnvelope::new(InboundMessage::CheckoutCompleted(data)),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json = json_body(response).await;
    assert!(json["error"].as_str().unwrap().contains("no line items"));

    let response = get(app, &format!("/orders/{order_id}")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_message_for_unknown_order_is_not_found() {
    let app = setup();

    let response = post_message(app, &InboundEnvelope::new(captured(OrderId::new()))).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_malformed_message_is_rejected() {
    let app = setup();

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/messages")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"message_id":"nope","message":{"type":"Unknown"}}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert!(response.status().is_client_error());
}

#[tokio::test]
async fn test_get_order_with_invalid_id() {
    let app = setup();

    let response = get(app, "/orders/not-a-uuid").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json = json_body(response).await;
    assert!(json["error"].as_str().unwrap().contains("Invalid order ID"));
}

#[tokio::test]
async fn test_get_unknown_order() {
    let app = setup();

    let response = get(app, &format!("/orders/{}", OrderId::new())).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let app = setup();
    let order_id = OrderId::new();
    post_message(app.clone(), &InboundEnvelope::new(checkout(order_id))).await;

    let response = get(app, "/metrics").await;
    assert_eq!(response.status(), StatusCode::OK);

    let content_type = response.headers()["content-type"].to_str().unwrap();
    assert!(content_type.starts_with("text/plain"));
}
