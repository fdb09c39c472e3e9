//! Payment gateway port trait.
//!
//! The engine talks to the processor exclusively through this port; the
//! orchestration rules (timeouts, write-ahead logging, idempotency) live on
//! the engine side, never in adapters.

use crate::domain::Money;
use crate::error::GatewayError;

/// Successful result of a charge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayCharge {
    /// Processor-issued reference for the charge.
    pub reference: String,
}

/// Outbound port to the payment processor.
#[async_trait::async_trait]
pub trait PaymentGateway: Send + Sync + 'static {
    /// Places a charge (authorization hold or capture) against the
    /// instrument identified by `instrument`.
    async fn charge(&self, amount: &Money, instrument: &str) -> Result<GatewayCharge, GatewayError>;

    /// Reverses part or all of a previous charge.
    async fn reverse(&self, reference: &str, amount: &Money) -> Result<(), GatewayError>;
}
