//! Simulated payment gateway for development and testing.
//!
//! Outcomes are steered by the instrument token, so flows can be exercised
//! deterministically without a real processor:
//! - tokens containing `DECLINE` are declined by the issuer
//! - tokens containing `INSUFFICIENT` are declined for insufficient funds
//! - tokens containing `TIMEOUT` stall until the caller's deadline passes
//! - charges above 10,000 major units are declined as over-limit
//!
//! Everything else succeeds and receives a processor-style reference.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sha2::{Digest, Sha256};
use std::time::Duration;
use uuid::Uuid;

use payflow_core::{GatewayCharge, GatewayError, Money, PaymentGateway};

/// Major-unit ceiling above which the simulator declines charges.
const AMOUNT_LIMIT: Decimal = dec!(10000);

/// How long a `TIMEOUT` token stalls. Far beyond any caller deadline.
const STALL: Duration = Duration::from_secs(600);

/// Token-driven gateway simulator.
#[derive(Debug, Clone)]
pub struct SimGateway {
    latency: Option<Duration>,
}

impl SimGateway {
    pub fn new() -> Self {
        Self { latency: None }
    }

    /// Adds a fixed delay before every response.
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency: Some(latency),
        }
    }

    async fn simulate_latency(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

impl Default for SimGateway {
    fn default() -> Self {
        Self::new()
    }
}

/// Issues a processor-style reference: first 8 hex digits of a hashed UUID,
/// uppercased.
fn issue_reference() -> String {
    let digest = Sha256::digest(Uuid::new_v4().as_bytes());
    hex::encode(digest)[..8].to_uppercase()
}

#[async_trait::async_trait]
impl PaymentGateway for SimGateway {
    async fn charge(
        &self,
        amount: &Money,
        instrument: &str,
    ) -> Result<GatewayCharge, GatewayError> {
        self.simulate_latency().await;

        let token = instrument.to_uppercase();
        if token.contains("TIMEOUT") {
            tokio::time::sleep(STALL).await;
            return Err(GatewayError::Timeout);
        }
        if token.contains("DECLINE") {
            return Err(GatewayError::Declined {
                reason: "Card declined by issuer".into(),
            });
        }
        if token.contains("INSUFFICIENT") {
            return Err(GatewayError::Declined {
                reason: "Insufficient funds".into(),
            });
        }
        if amount.amount() > AMOUNT_LIMIT {
            return Err(GatewayError::Declined {
                reason: "Amount exceeds limit".into(),
            });
        }

        Ok(GatewayCharge {
            reference: issue_reference(),
        })
    }

    async fn reverse(&self, reference: &str, _amount: &Money) -> Result<(), GatewayError> {
        self.simulate_latency().await;

        if reference.trim().is_empty() {
            return Err(GatewayError::Unavailable(
                "Missing gateway reference".into(),
            ));
        }
        Ok(())
    }
}
