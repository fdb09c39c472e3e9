//! OpenAPI specification and documentation.

#![allow(dead_code)] // Path functions are only used by utoipa for documentation generation

use payflow_core::domain::{Currency, PaymentId, PaymentMethod, PaymentStatus};
use payflow_core::dto::{
    AuthorizeRequest, CaptureRequest, CardDetails, PaymentView, Receipt, RefundRequest,
    VoidRequest,
};
use utoipa::OpenApi;

// Dummy functions to generate path documentation
// These are not the actual handlers, just for OpenAPI path generation

/// Service info
#[utoipa::path(
    get,
    path = "/",
    tag = "health",
    responses(
        (status = 200, description = "Service name and version", body = inline(serde_json::Value), example = json!({"service": "payflow", "version": "1.0.0"}))
    )
)]
async fn root() {}

/// Liveness probe
#[utoipa::path(
    get,
    path = "/healthz",
    tag = "health",
    responses(
        (status = 200, description = "Service is alive", body = inline(serde_json::Value), example = json!({"status": "ok"}))
    )
)]
async fn healthz() {}

/// Readiness probe
#[utoipa::path(
    get,
    path = "/readyz",
    tag = "health",
    responses(
        (status = 200, description = "Service is ready to accept traffic", body = inline(serde_json::Value), example = json!({"status": "ready"}))
    )
)]
async fn readyz() {}

/// Authorize a new payment
#[utoipa::path(
    post,
    path = "/payments/authorize",
    tag = "payments",
    request_body = AuthorizeRequest,
    responses(
        (status = 201, description = "Payment authorized", body = PaymentView),
        (status = 400, description = "Invalid request"),
        (status = 402, description = "Payment declined by the gateway"),
        (status = 409, description = "Idempotency key reused with a different request"),
        (status = 502, description = "Gateway unavailable or timed out")
    )
)]
async fn authorize() {}

/// List payments
#[utoipa::path(
    get,
    path = "/payments",
    tag = "payments",
    params(
        ("order_id" = Option<String>, Query, description = "Filter by merchant order"),
        ("customer_id" = Option<String>, Query, description = "Filter by customer"),
        ("status" = Option<PaymentStatus>, Query, description = "Filter by derived status"),
        ("limit" = Option<u32>, Query, description = "Page size, defaults to 50")
    ),
    responses(
        (status = 200, description = "Payments matching the filter, newest first", body = Vec<PaymentView>)
    )
)]
async fn list_payments() {}

/// Get payment by ID
#[utoipa::path(
    get,
    path = "/payments/{id}",
    tag = "payments",
    params(
        ("id" = PaymentId, Path, description = "Payment ID")
    ),
    responses(
        (status = 200, description = "Payment details", body = PaymentView),
        (status = 400, description = "Invalid payment ID"),
        (status = 404, description = "Payment not found")
    )
)]
async fn get_payment() {}

/// Capture part or all of an authorized payment
#[utoipa::path(
    post,
    path = "/payments/{id}/capture",
    tag = "payments",
    request_body = CaptureRequest,
    params(
        ("id" = PaymentId, Path, description = "Payment ID")
    ),
    responses(
        (status = 200, description = "Capture applied", body = PaymentView),
        (status = 400, description = "Invalid request"),
        (status = 404, description = "Payment not found"),
        (status = 409, description = "Capture not allowed in the current state"),
        (status = 502, description = "Gateway unavailable or timed out")
    )
)]
async fn capture() {}

/// Refund captured funds
#[utoipa::path(
    post,
    path = "/payments/{id}/refund",
    tag = "payments",
    request_body = RefundRequest,
    params(
        ("id" = PaymentId, Path, description = "Payment ID")
    ),
    responses(
        (status = 200, description = "Refund applied", body = PaymentView),
        (status = 400, description = "Invalid request"),
        (status = 404, description = "Payment not found"),
        (status = 409, description = "Refund not allowed in the current state"),
        (status = 502, description = "Gateway unavailable or timed out")
    )
)]
async fn refund() {}

/// Void an authorization
#[utoipa::path(
    post,
    path = "/payments/{id}/void",
    tag = "payments",
    request_body(content = VoidRequest, description = "Optional idempotency key"),
    params(
        ("id" = PaymentId, Path, description = "Payment ID")
    ),
    responses(
        (status = 200, description = "Authorization voided", body = PaymentView),
        (status = 400, description = "Invalid payment ID"),
        (status = 404, description = "Payment not found"),
        (status = 409, description = "Void not allowed in the current state"),
        (status = 502, description = "Gateway unavailable or timed out")
    )
)]
async fn void() {}

/// Receipt for a payment with settled funds
#[utoipa::path(
    get,
    path = "/payments/{id}/receipt",
    tag = "payments",
    params(
        ("id" = PaymentId, Path, description = "Payment ID")
    ),
    responses(
        (status = 200, description = "Receipt", body = Receipt),
        (status = 400, description = "Receipt only available for completed payments"),
        (status = 404, description = "Payment not found")
    )
)]
async fn receipt() {}

/// OpenAPI documentation for the Payflow API.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Payflow Payments API",
        version = "1.0.0",
        description = "A payment lifecycle engine: authorize, capture, refund, and void payments with idempotency keys and optimistic concurrency.\n\n## Idempotency\n\nAuthorize, capture, and refund require an `idempotency_key` in the request body. Retrying with the same key and payload replays the stored outcome instead of charging again; reusing a key with a different payload is rejected with `409`.",
        license(name = "MIT"),
    ),
    paths(
        root,
        healthz,
        readyz,
        authorize,
        list_payments,
        get_payment,
        capture,
        refund,
        void,
        receipt,
    ),
    components(
        schemas(
            AuthorizeRequest,
            CardDetails,
            CaptureRequest,
            RefundRequest,
            VoidRequest,
            PaymentView,
            Receipt,
            PaymentStatus,
            PaymentMethod,
            Currency,
            PaymentId,
        )
    ),
    tags(
        (name = "health", description = "Health and service info endpoints"),
        (name = "payments", description = "Payment lifecycle operations"),
    )
)]
pub struct ApiDoc;
