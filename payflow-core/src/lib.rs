//! # Payflow Core
//!
//! Domain types and port traits for the payment lifecycle engine.
//! This crate has ZERO external IO dependencies - only data structures,
//! business rules, and trait definitions.
//!
//! ## Architecture
//!
//! This crate represents the **innermost core** of the hexagonal architecture:
//! - `domain/` - Pure domain types (Money, Payment, idempotency records)
//! - `ports/` - Trait definitions that adapters must implement
//! - `dto/` - Data Transfer Objects for API boundaries
//! - `error/` - Domain, gateway, ledger and engine error types

pub mod domain;
pub mod dto;
pub mod error;
pub mod ports;

// Re-export commonly used types
pub use domain::{
    Capture, CaptureId, Currency, GatewayLogEntry, GatewayOperation, GatewayOutcome,
    IdempotencyRecord, Money, Payment, PaymentId, PaymentMethod, PaymentStatus, Refund, RefundId,
    StoredOutcome, request_fingerprint,
};
pub use dto::*;
pub use error::{DomainError, EngineError, GatewayError, LedgerError};
pub use ports::{GatewayCharge, LedgerEntry, PaymentGateway, PaymentLedger};
