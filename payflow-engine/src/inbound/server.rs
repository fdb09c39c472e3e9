//! HTTP Server configuration and startup.

use std::sync::Arc;

use axum::{
    Router, middleware,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use payflow_core::{PaymentGateway, PaymentLedger};

use super::context::request_context;
use super::handlers::{self, AppState};
use crate::PaymentEngine;
use crate::openapi::ApiDoc;

/// HTTP Server for the Payflow API.
pub struct HttpServer<L: PaymentLedger, G: PaymentGateway> {
    state: Arc<AppState<L, G>>,
}

impl<L: PaymentLedger, G: PaymentGateway> HttpServer<L, G> {
    /// Creates a new HTTP server around the given engine.
    pub fn new(engine: PaymentEngine<L, G>) -> Self {
        Self {
            state: Arc::new(AppState { engine }),
        }
    }

    /// Shared application state, for background tasks that need the engine.
    pub fn state(&self) -> Arc<AppState<L, G>> {
        self.state.clone()
    }

    /// Builds the Axum router with all routes.
    pub fn router(&self) -> Router {
        Router::new()
            .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
            .route("/", get(handlers::root))
            .route("/healthz", get(handlers::healthz))
            .route("/readyz", get(handlers::readyz))
            .route("/payments/authorize", post(handlers::authorize::<L, G>))
            .route("/payments", get(handlers::list_payments::<L, G>))
            .route("/payments/{id}", get(handlers::get_payment::<L, G>))
            .route("/payments/{id}/capture", post(handlers::capture::<L, G>))
            .route("/payments/{id}/refund", post(handlers::refund::<L, G>))
            .route("/payments/{id}/void", post(handlers::void::<L, G>))
            .route("/payments/{id}/receipt", get(handlers::receipt::<L, G>))
            .layer(middleware::from_fn(request_context))
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Runs the server on the given address with graceful shutdown.
    pub async fn run(self, addr: &str) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!("Server listening on {}", listener.local_addr()?);

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        Ok(())
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown...");
}
