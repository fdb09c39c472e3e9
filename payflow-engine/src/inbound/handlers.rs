//! HTTP request handlers.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};

use payflow_core::{
    AuthorizeRequest, CaptureRequest, EngineError, PaymentFilter, PaymentGateway, PaymentId,
    PaymentLedger, RefundRequest, VoidRequest,
};

use crate::PaymentEngine;

/// Application state shared across handlers.
pub struct AppState<L: PaymentLedger, G: PaymentGateway> {
    pub engine: PaymentEngine<L, G>,
}

/// Wrapper to implement IntoResponse for EngineError (orphan rule workaround).
pub struct ApiError(pub EngineError);

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            EngineError::Validation(_) => StatusCode::BAD_REQUEST,
            EngineError::NotFound(_) => StatusCode::NOT_FOUND,
            EngineError::Domain(_)
            | EngineError::IdempotencyConflict
            | EngineError::ConcurrentModification => StatusCode::CONFLICT,
            EngineError::GatewayDeclined { .. } => StatusCode::PAYMENT_REQUIRED,
            EngineError::GatewayTimeout | EngineError::GatewayUnavailable(_) => {
                StatusCode::BAD_GATEWAY
            }
            EngineError::LockTimeout | EngineError::CouldNotDetermineOutcome => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            EngineError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let mut body = serde_json::json!({
            "error": self.0.to_string(),
            "kind": self.0.kind(),
            "code": status.as_u16(),
        });
        if let EngineError::GatewayDeclined { payment_id, .. } = &self.0 {
            body["payment_id"] = serde_json::json!(payment_id);
        }

        (status, Json(body)).into_response()
    }
}

fn parse_payment_id(id: &str) -> Result<PaymentId, ApiError> {
    id.parse()
        .map_err(|_| ApiError(EngineError::Validation("Invalid payment ID".into())))
}

/// Service info for the root route.
pub async fn root() -> impl IntoResponse {
    Json(serde_json::json!({
        "service": "payflow",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Liveness probe.
pub async fn healthz() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Readiness probe.
pub async fn readyz() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ready" }))
}

/// Authorize a new payment.
#[tracing::instrument(skip(state, req), fields(order_id = %req.order_id))]
pub async fn authorize<L: PaymentLedger, G: PaymentGateway>(
    State(state): State<Arc<AppState<L, G>>>,
    Json(req): Json<AuthorizeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let view = state.engine.authorize(req).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

/// Capture part or all of an authorized payment.
#[tracing::instrument(skip(state, req), fields(payment_id = %id, amount = %req.amount))]
pub async fn capture<L: PaymentLedger, G: PaymentGateway>(
    State(state): State<Arc<AppState<L, G>>>,
    Path(id): Path<String>,
    Json(req): Json<CaptureRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_payment_id(&id)?;
    let view = state.engine.capture(&id, req).await?;
    Ok(Json(view))
}

/// Refund captured funds, fully or partially.
#[tracing::instrument(skip(state, req), fields(payment_id = %id))]
pub async fn refund<L: PaymentLedger, G: PaymentGateway>(
    State(state): State<Arc<AppState<L, G>>>,
    Path(id): Path<String>,
    Json(req): Json<RefundRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_payment_id(&id)?;
    let view = state.engine.refund(&id, req).await?;
    Ok(Json(view))
}

/// Void an authorization. The body is optional.
#[tracing::instrument(skip(state, body), fields(payment_id = %id))]
pub async fn void<L: PaymentLedger, G: PaymentGateway>(
    State(state): State<Arc<AppState<L, G>>>,
    Path(id): Path<String>,
    body: Option<Json<VoidRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_payment_id(&id)?;
    let req = body.map(|Json(req)| req).unwrap_or_default();
    let view = state.engine.void(&id, req).await?;
    Ok(Json(view))
}

/// Get payment by ID.
#[tracing::instrument(skip(state), fields(payment_id = %id))]
pub async fn get_payment<L: PaymentLedger, G: PaymentGateway>(
    State(state): State<Arc<AppState<L, G>>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_payment_id(&id)?;
    let view = state.engine.get_payment(&id).await?;
    Ok(Json(view))
}

/// List payments with optional filtering.
#[tracing::instrument(skip(state))]
pub async fn list_payments<L: PaymentLedger, G: PaymentGateway>(
    State(state): State<Arc<AppState<L, G>>>,
    Query(filter): Query<PaymentFilter>,
) -> Result<impl IntoResponse, ApiError> {
    let views = state.engine.list_payments(&filter).await?;
    Ok(Json(views))
}

/// Receipt for a payment with settled funds.
#[tracing::instrument(skip(state), fields(payment_id = %id))]
pub async fn receipt<L: PaymentLedger, G: PaymentGateway>(
    State(state): State<Arc<AppState<L, G>>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_payment_id(&id)?;
    let receipt = state.engine.receipt(&id).await?;
    Ok(Json(receipt))
}
