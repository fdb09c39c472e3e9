//! # payflow-engine
//!
//! Payment lifecycle orchestration and HTTP adapter.
//!
//! ## Architecture
//!
//! - `service` - the [`PaymentEngine`]: idempotency, locking, gateway calls,
//!   optimistic ledger commits
//! - `inbound` - HTTP adapter (Axum server)
//!
//! The engine is generic over `L: PaymentLedger` and `G: PaymentGateway`,
//! allowing different ledger and gateway implementations to be injected.

pub mod inbound;
pub mod service;

mod idempotency;
mod locks;
mod openapi;


pub use service::{EngineConfig, PaymentEngine};
