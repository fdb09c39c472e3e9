//! Integration tests for the HTTP API.
//!
//! These tests drive the full router (handlers, error envelopes, request
//! context middleware) against the in-memory ledger and the simulated
//! gateway, without binding a socket.

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    response::Response,
};
use http_body_util::BodyExt;
use serde_json::json;
use tower::ServiceExt;

use gateway_sim::SimGateway;
use payflow_engine::{PaymentEngine, inbound::HttpServer};
use payflow_ledger::MemoryLedger;

/// Helper to create a test server over the in-memory ledger.
fn test_server() -> HttpServer<MemoryLedger, SimGateway> {
    let engine = PaymentEngine::new(MemoryLedger::new(), SimGateway::new());
    HttpServer::new(engine)
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("Content-Type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn authorize_body(order_id: &str, key: &str) -> serde_json::Value {
    json!({
        "order_id": order_id,
        "customer_id": "CUST-2002",
        "amount": "100.50",
        "currency": "USD",
        "payment_method": "credit_card",
        "card_details": {
            "card_token": "tok_visa_4242",
            "last_four": "4242",
            "brand": "visa",
            "exp_month": 12,
            "exp_year": 2030
        },
        "idempotency_key": key
    })
}

async fn json_body(response: Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Helper to authorize a payment and return its id.
async fn create_authorized_payment(app: axum::Router, key: &str) -> String {
    let response = app
        .oneshot(post_json("/payments/authorize", authorize_body("ORD-1001", key)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let json = json_body(response).await;
    json["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_root_returns_service_info() {
    let app = test_server().router();

    let response = app.oneshot(get_request("/")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["service"], "payflow");
    assert!(json["version"].as_str().is_some());
}

#[tokio::test]
async fn test_health_probes() {
    let app = test_server().router();

    let response = app.clone().oneshot(get_request("/healthz")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["status"], "ok");

    let response = app.oneshot(get_request("/readyz")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["status"], "ready");
}

#[tokio::test]
async fn test_responses_carry_request_and_trace_ids() {
    let app = test_server().router();

    let response = app.oneshot(get_request("/healthz")).await.unwrap();

    assert!(response.headers().get("x-request-id").is_some());
    assert!(response.headers().get("x-trace-id").is_some());
}

#[tokio::test]
async fn test_request_id_header_is_echoed() {
    let app = test_server().router();

    let request = Request::builder()
        .uri("/healthz")
        .header("x-request-id", "req-1234")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(
        response.headers().get("x-request-id").unwrap(),
        "req-1234"
    );
}

#[tokio::test]
async fn test_traceparent_sets_trace_id() {
    let app = test_server().router();

    let request = Request::builder()
        .uri("/healthz")
        .header(
            "traceparent",
            "00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01",
        )
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(
        response.headers().get("x-trace-id").unwrap(),
        "4bf92f3577b34da6a3ce929d0e0e4736"
    );
}

#[tokio::test]
async fn test_authorize_returns_created_payment() {
    let app = test_server().router();

    let response = app
        .oneshot(post_json(
            "/payments/authorize",
            authorize_body("ORD-1001", "auth-1"),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let json = json_body(response).await;
    assert!(json["id"].as_str().unwrap().starts_with("PAY-"));
    assert_eq!(json["status"], "authorized");
    assert_eq!(json["authorized_amount"], "100.50");
    assert_eq!(json["captured_total"], "0");
    assert_eq!(json["currency"], "USD");
    assert_eq!(json["card_last_four"], "4242");
    assert!(json["gateway_reference"].as_str().is_some());
}

#[tokio::test]
async fn test_authorize_replay_returns_same_payment() {
    let app = test_server().router();

    let first = app
        .clone()
        .oneshot(post_json(
            "/payments/authorize",
            authorize_body("ORD-1001", "auth-1"),
        ))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::CREATED);
    let first = json_body(first).await;

    let second = app
        .oneshot(post_json(
            "/payments/authorize",
            authorize_body("ORD-1001", "auth-1"),
        ))
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::CREATED);
    let second = json_body(second).await;

    assert_eq!(first["id"], second["id"]);
}

#[tokio::test]
async fn test_validation_error_envelope() {
    let app = test_server().router();

    let mut body = authorize_body("ORD-1001", "auth-1");
    body.as_object_mut().unwrap().remove("card_details");
    let response = app
        .oneshot(post_json("/payments/authorize", body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = json_body(response).await;
    assert_eq!(json["error"], "Card details required for card payments");
    assert_eq!(json["kind"], "VALIDATION_ERROR");
    assert_eq!(json["code"], 400);
}

#[tokio::test]
async fn test_declined_authorize_returns_402_with_payment_id() {
    let app = test_server().router();

    let mut body = authorize_body("ORD-1001", "auth-1");
    body["card_details"]["card_token"] = json!("tok_decline");
    let response = app
        .oneshot(post_json("/payments/authorize", body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
    let json = json_body(response).await;
    assert_eq!(json["error"], "Payment declined: Card declined by issuer");
    assert_eq!(json["kind"], "GATEWAY_DECLINED");
    assert!(json["payment_id"].as_str().unwrap().starts_with("PAY-"));
}

#[tokio::test]
async fn test_missing_fields_rejected_by_extractor() {
    let app = test_server().router();

    let response = app
        .oneshot(post_json("/payments/authorize", json!({})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_get_payment_roundtrip() {
    let app = test_server().router();
    let id = create_authorized_payment(app.clone(), "auth-1").await;

    let response = app
        .oneshot(get_request(&format!("/payments/{id}")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["id"], id.as_str());
    assert_eq!(json["order_id"], "ORD-1001");
}

#[tokio::test]
async fn test_invalid_payment_id_is_rejected() {
    let app = test_server().router();

    let response = app
        .oneshot(get_request("/payments/not-a-payment-id"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = json_body(response).await;
    assert_eq!(json["error"], "Invalid payment ID");
    assert_eq!(json["kind"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_unknown_payment_is_not_found() {
    let app = test_server().router();

    let response = app
        .oneshot(get_request("/payments/PAY-0123456789AB"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = json_body(response).await;
    assert_eq!(json["error"], "Payment not found");
    assert_eq!(json["kind"], "NOT_FOUND");
}

#[tokio::test]
async fn test_capture_then_refund_flow() {
    let app = test_server().router();
    let id = create_authorized_payment(app.clone(), "auth-1").await;

    let response = app
        .clone()
        .oneshot(post_json(
            &format!("/payments/{id}/capture"),
            json!({"amount": "40.00", "idempotency_key": "cap-1"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["status"], "partially_captured");
    assert_eq!(json["captured_total"], "40.00");

    // Refund without an amount returns everything captured so far.
    let response = app
        .oneshot(post_json(
            &format!("/payments/{id}/refund"),
            json!({"idempotency_key": "ref-1"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["status"], "refunded");
    assert_eq!(json["refunded_total"], "40.00");
}

#[tokio::test]
async fn test_void_accepts_empty_body() {
    let app = test_server().router();
    let id = create_authorized_payment(app.clone(), "auth-1").await;

    let request = Request::builder()
        .method(Method::POST)
        .uri(format!("/payments/{id}/void"))
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["status"], "voided");
}

#[tokio::test]
async fn test_capture_after_void_conflicts() {
    let app = test_server().router();
    let id = create_authorized_payment(app.clone(), "auth-1").await;

    let response = app
        .clone()
        .oneshot(post_json(&format!("/payments/{id}/void"), json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(post_json(
            &format!("/payments/{id}/capture"),
            json!({"amount": "10.00", "idempotency_key": "cap-1"}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);
    let json = json_body(response).await;
    assert_eq!(json["kind"], "INVALID_STATE_TRANSITION");
}

#[tokio::test]
async fn test_receipt_gates_on_settled_funds() {
    let app = test_server().router();
    let id = create_authorized_payment(app.clone(), "auth-1").await;

    let early = app
        .clone()
        .oneshot(get_request(&format!("/payments/{id}/receipt")))
        .await
        .unwrap();
    assert_eq!(early.status(), StatusCode::BAD_REQUEST);
    let json = json_body(early).await;
    assert_eq!(json["error"], "Receipt only available for completed payments");

    let response = app
        .clone()
        .oneshot(post_json(
            &format!("/payments/{id}/capture"),
            json!({"amount": "100.50", "idempotency_key": "cap-1"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(get_request(&format!("/payments/{id}/receipt")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["receipt_id"], format!("RCP-{id}"));
    assert_eq!(json["amount"], "100.50");
    assert_eq!(json["card_last_four"], "****4242");
}

#[tokio::test]
async fn test_list_payments_with_filters() {
    let app = test_server().router();

    let first = app
        .clone()
        .oneshot(post_json(
            "/payments/authorize",
            authorize_body("ORD-A", "auth-a"),
        ))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::CREATED);
    let second = app
        .clone()
        .oneshot(post_json(
            "/payments/authorize",
            authorize_body("ORD-B", "auth-b"),
        ))
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::CREATED);

    let response = app
        .clone()
        .oneshot(get_request("/payments?order_id=ORD-A"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json.as_array().unwrap().len(), 1);
    assert_eq!(json[0]["order_id"], "ORD-A");

    let response = app
        .clone()
        .oneshot(get_request("/payments?status=authorized"))
        .await
        .unwrap();
    let json = json_body(response).await;
    assert_eq!(json.as_array().unwrap().len(), 2);

    let response = app
        .oneshot(get_request("/payments?limit=1"))
        .await
        .unwrap();
    let json = json_body(response).await;
    assert_eq!(json.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_openapi_spec_is_served() {
    let app = test_server().router();

    let response = app
        .oneshot(get_request("/api-docs/openapi.json"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["info"]["title"], "Payflow Payments API");
    assert!(json["paths"].get("/payments/authorize").is_some());
}
