//! Port traits for the hexagonal architecture.

pub mod gateway;
pub mod ledger;

pub use gateway::{GatewayCharge, PaymentGateway};
pub use ledger::{LedgerEntry, PaymentLedger};
