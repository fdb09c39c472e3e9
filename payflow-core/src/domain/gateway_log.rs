//! Write-ahead log of gateway calls.
//!
//! Every resolved gateway call is recorded before the aggregate is persisted,
//! so money movement can be reconciled even when the subsequent commit fails.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::ids::PaymentId;
use super::money::Money;
use crate::error::DomainError;

/// Which gateway operation was invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatewayOperation {
    Charge,
    Reverse,
}

impl fmt::Display for GatewayOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            GatewayOperation::Charge => "charge",
            GatewayOperation::Reverse => "reverse",
        };
        f.write_str(s)
    }
}

impl FromStr for GatewayOperation {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "charge" => Ok(GatewayOperation::Charge),
            "reverse" => Ok(GatewayOperation::Reverse),
            other => Err(DomainError::ValidationError(format!(
                "Unknown gateway operation: {other}"
            ))),
        }
    }
}

/// How the gateway call resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatewayOutcome {
    Succeeded,
    Declined,
    TimedOut,
    Errored,
}

impl fmt::Display for GatewayOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            GatewayOutcome::Succeeded => "succeeded",
            GatewayOutcome::Declined => "declined",
            GatewayOutcome::TimedOut => "timed_out",
            GatewayOutcome::Errored => "errored",
        };
        f.write_str(s)
    }
}

impl FromStr for GatewayOutcome {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "succeeded" => Ok(GatewayOutcome::Succeeded),
            "declined" => Ok(GatewayOutcome::Declined),
            "timed_out" => Ok(GatewayOutcome::TimedOut),
            "errored" => Ok(GatewayOutcome::Errored),
            other => Err(DomainError::ValidationError(format!(
                "Unknown gateway outcome: {other}"
            ))),
        }
    }
}

/// One resolved gateway call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayLogEntry {
    pub id: Uuid,
    pub payment_id: PaymentId,
    pub operation: GatewayOperation,
    pub amount: Money,
    pub outcome: GatewayOutcome,
    /// Gateway reference, present for successful charges.
    pub reference: Option<String>,
    /// Decline reason or error detail, absent for successes.
    pub detail: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl GatewayLogEntry {
    pub fn succeeded(
        payment_id: PaymentId,
        operation: GatewayOperation,
        amount: Money,
        reference: Option<String>,
    ) -> Self {
        Self::resolved(payment_id, operation, amount, GatewayOutcome::Succeeded, reference, None)
    }

    pub fn declined(
        payment_id: PaymentId,
        operation: GatewayOperation,
        amount: Money,
        reason: String,
    ) -> Self {
        Self::resolved(
            payment_id,
            operation,
            amount,
            GatewayOutcome::Declined,
            None,
            Some(reason),
        )
    }

    pub fn timed_out(payment_id: PaymentId, operation: GatewayOperation, amount: Money) -> Self {
        Self::resolved(payment_id, operation, amount, GatewayOutcome::TimedOut, None, None)
    }

    pub fn errored(
        payment_id: PaymentId,
        operation: GatewayOperation,
        amount: Money,
        detail: String,
    ) -> Self {
        Self::resolved(
            payment_id,
            operation,
            amount,
            GatewayOutcome::Errored,
            None,
            Some(detail),
        )
    }

    fn resolved(
        payment_id: PaymentId,
        operation: GatewayOperation,
        amount: Money,
        outcome: GatewayOutcome,
        reference: Option<String>,
        detail: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            payment_id,
            operation,
            amount,
            outcome,
            reference,
            detail,
            created_at: Utc::now(),
        }
    }
}
