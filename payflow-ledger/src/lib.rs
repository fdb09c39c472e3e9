//! # payflow-ledger
//!
//! Ledger adapters for the payment lifecycle engine.
//!
//! Implements the [`PaymentLedger`] port from `payflow-core` for:
//! - **In-memory** — always available, used by tests and ephemeral deployments
//! - **SQLite** — `sqlite` feature (default)
//!
//! Use [`build_ledger`] to pick an adapter from a database URL at runtime.

pub mod memory;

#[cfg(feature = "sqlite")]
mod types;

#[cfg(feature = "sqlite")]
pub mod sqlite;


pub use memory::MemoryLedger;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteLedger;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use payflow_core::{
    Capture, GatewayLogEntry, IdempotencyRecord, LedgerEntry, LedgerError, Payment, PaymentFilter,
    PaymentId, PaymentLedger, Refund,
};

// ─────────────────────────────────────────────────────────────────────────────
// Runtime ledger selection
// ─────────────────────────────────────────────────────────────────────────────

/// Ledger adapter selected from the database URL at startup.
pub enum Ledger {
    Memory(MemoryLedger),
    #[cfg(feature = "sqlite")]
    Sqlite(SqliteLedger),
}

/// Builds a ledger from a database URL.
///
/// - `memory` — in-memory ledger, contents lost on shutdown
/// - `sqlite://path/to.db` or `sqlite::memory:` — SQLite (requires the
///   `sqlite` feature)
pub async fn build_ledger(database_url: &str) -> anyhow::Result<Ledger> {
    if database_url == "memory" {
        return Ok(Ledger::Memory(MemoryLedger::new()));
    }

    #[cfg(feature = "sqlite")]
    if database_url.starts_with("sqlite:") {
        return Ok(Ledger::Sqlite(SqliteLedger::new(database_url).await?));
    }

    anyhow::bail!("Unsupported database URL: {database_url}")
}

#[async_trait]
impl PaymentLedger for Ledger {
    async fn insert_payment(
        &self,
        payment: &Payment,
        record: Option<&IdempotencyRecord>,
    ) -> Result<(), LedgerError> {
        match self {
            Ledger::Memory(ledger) => ledger.insert_payment(payment, record).await,
            #[cfg(feature = "sqlite")]
            Ledger::Sqlite(ledger) => ledger.insert_payment(payment, record).await,
        }
    }

    async fn load_payment(&self, id: &PaymentId) -> Result<Option<Payment>, LedgerError> {
        match self {
            Ledger::Memory(ledger) => ledger.load_payment(id).await,
            #[cfg(feature = "sqlite")]
            Ledger::Sqlite(ledger) => ledger.load_payment(id).await,
        }
    }

    async fn list_payments(&self, filter: &PaymentFilter) -> Result<Vec<Payment>, LedgerError> {
        match self {
            Ledger::Memory(ledger) => ledger.list_payments(filter).await,
            #[cfg(feature = "sqlite")]
            Ledger::Sqlite(ledger) => ledger.list_payments(filter).await,
        }
    }

    async fn commit_if_version_matches(
        &self,
        payment: &Payment,
        expected_version: i64,
        entry: Option<&LedgerEntry>,
        record: Option<&IdempotencyRecord>,
    ) -> Result<(), LedgerError> {
        match self {
            Ledger::Memory(ledger) => {
                ledger
                    .commit_if_version_matches(payment, expected_version, entry, record)
                    .await
            }
            #[cfg(feature = "sqlite")]
            Ledger::Sqlite(ledger) => {
                ledger
                    .commit_if_version_matches(payment, expected_version, entry, record)
                    .await
            }
        }
    }

    async fn list_captures(&self, id: &PaymentId) -> Result<Vec<Capture>, LedgerError> {
        match self {
            Ledger::Memory(ledger) => ledger.list_captures(id).await,
            #[cfg(feature = "sqlite")]
            Ledger::Sqlite(ledger) => ledger.list_captures(id).await,
        }
    }

    async fn list_refunds(&self, id: &PaymentId) -> Result<Vec<Refund>, LedgerError> {
        match self {
            Ledger::Memory(ledger) => ledger.list_refunds(id).await,
            #[cfg(feature = "sqlite")]
            Ledger::Sqlite(ledger) => ledger.list_refunds(id).await,
        }
    }

    async fn append_gateway_log(&self, entry: &GatewayLogEntry) -> Result<(), LedgerError> {
        match self {
            Ledger::Memory(ledger) => ledger.append_gateway_log(entry).await,
            #[cfg(feature = "sqlite")]
            Ledger::Sqlite(ledger) => ledger.append_gateway_log(entry).await,
        }
    }

    async fn find_idempotency_record(
        &self,
        key: &str,
    ) -> Result<Option<IdempotencyRecord>, LedgerError> {
        match self {
            Ledger::Memory(ledger) => ledger.find_idempotency_record(key).await,
            #[cfg(feature = "sqlite")]
            Ledger::Sqlite(ledger) => ledger.find_idempotency_record(key).await,
        }
    }

    async fn purge_idempotency_records(
        &self,
        older_than: DateTime<Utc>,
    ) -> Result<u64, LedgerError> {
        match self {
            Ledger::Memory(ledger) => ledger.purge_idempotency_records(older_than).await,
            #[cfg(feature = "sqlite")]
            Ledger::Sqlite(ledger) => ledger.purge_idempotency_records(older_than).await,
        }
    }
}
