//! # Payflow Client SDK
//!
//! A typed Rust client for the payflow payments API.

use payflow_core::{
    AuthorizeRequest, CaptureRequest, PaymentFilter, PaymentId, PaymentView, Receipt,
    RefundRequest, VoidRequest,
};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;

/// Error type for client operations.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Payflow API client.
pub struct PayflowClient {
    base_url: String,
    http: Client,
}

impl PayflowClient {
    /// Creates a new client.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http: Client::new(),
        }
    }

    /// Checks if the API is healthy.
    pub async fn healthz(&self) -> Result<bool, ClientError> {
        let resp = self
            .http
            .get(format!("{}/healthz", self.base_url))
            .send()
            .await?;
        Ok(resp.status().is_success())
    }

    /// Authorizes a new payment.
    pub async fn authorize(&self, req: &AuthorizeRequest) -> Result<PaymentView, ClientError> {
        self.post("/payments/authorize", req).await
    }

    /// Captures part or all of an authorized payment.
    pub async fn capture(
        &self,
        id: &PaymentId,
        amount: Decimal,
        idempotency_key: &str,
    ) -> Result<PaymentView, ClientError> {
        let req = CaptureRequest {
            amount,
            currency: None,
            idempotency_key: idempotency_key.to_string(),
        };
        self.post(&format!("/payments/{id}/capture"), &req).await
    }

    /// Refunds captured funds. Omitting the amount refunds everything
    /// still refundable.
    pub async fn refund(
        &self,
        id: &PaymentId,
        amount: Option<Decimal>,
        reason: &str,
        idempotency_key: &str,
    ) -> Result<PaymentView, ClientError> {
        let req = RefundRequest {
            amount,
            currency: None,
            reason: reason.to_string(),
            idempotency_key: idempotency_key.to_string(),
        };
        self.post(&format!("/payments/{id}/refund"), &req).await
    }

    /// Voids an authorization.
    pub async fn void(
        &self,
        id: &PaymentId,
        idempotency_key: Option<String>,
    ) -> Result<PaymentView, ClientError> {
        let req = VoidRequest { idempotency_key };
        self.post(&format!("/payments/{id}/void"), &req).await
    }

    /// Gets a payment by ID.
    pub async fn get_payment(&self, id: &PaymentId) -> Result<PaymentView, ClientError> {
        self.get(&format!("/payments/{id}")).await
    }

    /// Lists payments matching the filter.
    pub async fn list_payments(
        &self,
        filter: &PaymentFilter,
    ) -> Result<Vec<PaymentView>, ClientError> {
        let resp = self
            .http
            .get(format!("{}/payments", self.base_url))
            .query(filter)
            .send()
            .await?;
        self.handle_response(resp).await
    }

    /// Fetches the receipt for a payment with settled funds.
    pub async fn receipt(&self, id: &PaymentId) -> Result<Receipt, ClientError> {
        self.get(&format!("/payments/{id}/receipt")).await
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let resp = self
            .http
            .get(format!("{}{}", self.base_url, path))
            .send()
            .await?;
        self.handle_response(resp).await
    }

    async fn post<T: DeserializeOwned, B: serde::Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ClientError> {
        let resp = self
            .http
            .post(format!("{}{}", self.base_url, path))
            .json(body)
            .send()
            .await?;
        self.handle_response(resp).await
    }

    async fn handle_response<T: DeserializeOwned>(
        &self,
        resp: reqwest::Response,
    ) -> Result<T, ClientError> {
        let status = resp.status();
        if status.is_success() {
            let body = resp.text().await?;
            Ok(serde_json::from_str(&body)?)
        } else {
            let body = resp.text().await.unwrap_or_default();
            let message = serde_json::from_str::<serde_json::Value>(&body)
                .ok()
                .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(String::from))
                .unwrap_or(body);
            Err(ClientError::Api {
                status: status.as_u16(),
                message,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = PayflowClient::new("http://localhost:3000");
        assert_eq!(client.base_url, "http://localhost:3000");
    }

    #[test]
    fn test_client_with_trailing_slash() {
        let client = PayflowClient::new("http://localhost:3000/");
        assert_eq!(client.base_url, "http://localhost:3000");
    }
}
