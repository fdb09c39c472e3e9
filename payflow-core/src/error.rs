//! Error types for the payment lifecycle engine.

use rust_decimal::Decimal;

use crate::domain::{Currency, PaymentId, PaymentStatus};

/// Domain-level errors (business logic violations).
#[derive(Debug, thiserror::Error)]
pub enum DomainError {
    #[error("Amount cannot be negative")]
    NegativeAmount,

    #[error("Amount has more than {places} decimal places for {currency}")]
    ExcessPrecision { currency: Currency, places: u8 },

    #[error("Currency mismatch: expected {expected}, got {got}")]
    CurrencyMismatch { expected: Currency, got: Currency },

    #[error("Insufficient balance: available {available}, requested {requested}")]
    Underflow {
        available: Decimal,
        requested: Decimal,
    },

    #[error(
        "Capture exceeds authorization: authorized {authorized}, captured {already_captured}, requested {requested}"
    )]
    CaptureExceedsAuthorization {
        authorized: Decimal,
        already_captured: Decimal,
        requested: Decimal,
    },

    #[error(
        "Refund exceeds captured balance: captured {captured}, refunded {already_refunded}, requested {requested}"
    )]
    RefundExceedsCaptured {
        captured: Decimal,
        already_refunded: Decimal,
        requested: Decimal,
    },

    #[error("Cannot {operation} payment in {from} status")]
    InvalidStateTransition {
        from: PaymentStatus,
        operation: &'static str,
    },

    #[error("Validation error: {0}")]
    ValidationError(String),
}

/// Errors returned by a payment gateway adapter.
///
/// A decline is a definitive no from the processor; a timeout means the
/// outcome is unknown and the caller must not assume either way.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("Declined: {reason}")]
    Declined { reason: String },

    #[error("Gateway call timed out")]
    Timeout,

    #[error("Gateway unavailable: {0}")]
    Unavailable(String),
}

/// Ledger-level errors (data access failures).
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Transaction error: {0}")]
    Transaction(String),

    #[error("Entity not found")]
    NotFound,

    #[error("Version conflict: expected {expected}, found {found}")]
    VersionConflict { expected: i64, found: i64 },
}

/// Engine-level errors (for HTTP responses).
///
/// Maps cleanly to HTTP status codes; `kind` is the stable machine-readable
/// label carried in error response bodies.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error(transparent)]
    Domain(DomainError),

    #[error("Payment declined: {reason}")]
    GatewayDeclined { payment_id: PaymentId, reason: String },

    #[error("Payment gateway timed out before returning an outcome")]
    GatewayTimeout,

    #[error("Payment gateway unavailable: {0}")]
    GatewayUnavailable(String),

    #[error("Idempotency key already used with a different request")]
    IdempotencyConflict,

    #[error("A request with this idempotency key is still in progress")]
    CouldNotDetermineOutcome,

    #[error("Timed out waiting for access to the payment")]
    LockTimeout,

    #[error("Payment was modified concurrently and retries were exhausted")]
    ConcurrentModification,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl EngineError {
    /// Stable machine-readable label for the error envelope.
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::Validation(_) => "VALIDATION_ERROR",
            EngineError::NotFound(_) => "NOT_FOUND",
            EngineError::Domain(DomainError::InvalidStateTransition { .. }) => {
                "INVALID_STATE_TRANSITION"
            }
            EngineError::Domain(DomainError::CaptureExceedsAuthorization { .. }) => {
                "CAPTURE_EXCEEDS_AUTHORIZATION"
            }
            EngineError::Domain(DomainError::RefundExceedsCaptured { .. }) => {
                "REFUND_EXCEEDS_CAPTURED"
            }
            EngineError::Domain(_) => "VALIDATION_ERROR",
            EngineError::GatewayDeclined { .. } => "GATEWAY_DECLINED",
            EngineError::GatewayTimeout => "GATEWAY_TIMEOUT",
            EngineError::GatewayUnavailable(_) => "GATEWAY_UNAVAILABLE",
            EngineError::IdempotencyConflict => "IDEMPOTENCY_CONFLICT",
            EngineError::CouldNotDetermineOutcome => "COULD_NOT_DETERMINE_OUTCOME",
            EngineError::LockTimeout => "LOCK_TIMEOUT",
            EngineError::ConcurrentModification => "CONCURRENT_MODIFICATION",
            EngineError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<DomainError> for EngineError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::InvalidStateTransition { .. }
            | DomainError::CaptureExceedsAuthorization { .. }
            | DomainError::RefundExceedsCaptured { .. } => EngineError::Domain(err),
            other => EngineError::Validation(other.to_string()),
        }
    }
}

impl From<LedgerError> for EngineError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::Domain(e) => e.into(),
            LedgerError::NotFound => EngineError::NotFound("Payment not found".into()),
            LedgerError::Database(e) => EngineError::Internal(e),
            LedgerError::Transaction(e) => EngineError::Internal(e),
            LedgerError::VersionConflict { .. } => EngineError::ConcurrentModification,
        }
    }
}
