//! Payment ledger port trait.
//!
//! This is the persistence port in our hexagonal architecture.
//! Adapters (SQLite, InMemory) implement this trait.

use chrono::{DateTime, Utc};

use crate::domain::{
    Capture, GatewayLogEntry, IdempotencyRecord, Payment, PaymentId, Refund,
};
use crate::dto::PaymentFilter;
use crate::error::LedgerError;

/// Capture or refund row committed alongside an aggregate update.
#[derive(Debug, Clone)]
pub enum LedgerEntry {
    Capture(Capture),
    Refund(Refund),
}

/// The payment ledger port.
///
/// Aggregate writes are versioned: `commit_if_version_matches` MUST apply the
/// update, the associated entry and the idempotency record in one atomic
/// transaction, and MUST refuse the write when the stored version no longer
/// matches the version the caller loaded.
#[async_trait::async_trait]
pub trait PaymentLedger: Send + Sync + 'static {
    // ─────────────────────────────────────────────────────────────────────────────
    // Payment Aggregate
    // ─────────────────────────────────────────────────────────────────────────────

    /// Inserts a freshly authorized (or declined) payment, together with the
    /// idempotency record that finalizes the originating request.
    async fn insert_payment(
        &self,
        payment: &Payment,
        record: Option<&IdempotencyRecord>,
    ) -> Result<(), LedgerError>;

    /// Loads a payment with its current version.
    async fn load_payment(&self, id: &PaymentId) -> Result<Option<Payment>, LedgerError>;

    /// Lists payments matching the filter, newest first.
    async fn list_payments(&self, filter: &PaymentFilter) -> Result<Vec<Payment>, LedgerError>;

    /// Commits a mutated aggregate if the stored version still equals
    /// `expected_version`, otherwise fails with `VersionConflict`.
    async fn commit_if_version_matches(
        &self,
        payment: &Payment,
        expected_version: i64,
        entry: Option<&LedgerEntry>,
        record: Option<&IdempotencyRecord>,
    ) -> Result<(), LedgerError>;

    // ─────────────────────────────────────────────────────────────────────────────
    // Entries & Gateway Log
    // ─────────────────────────────────────────────────────────────────────────────

    /// Lists captures recorded for a payment, oldest first.
    async fn list_captures(&self, id: &PaymentId) -> Result<Vec<Capture>, LedgerError>;

    /// Lists refunds recorded for a payment, oldest first.
    async fn list_refunds(&self, id: &PaymentId) -> Result<Vec<Refund>, LedgerError>;

    /// Appends one resolved gateway call to the write-ahead log.
    async fn append_gateway_log(&self, entry: &GatewayLogEntry) -> Result<(), LedgerError>;

    // ─────────────────────────────────────────────────────────────────────────────
    // Idempotency
    // ─────────────────────────────────────────────────────────────────────────────

    /// Finds the finalized record for an idempotency key.
    async fn find_idempotency_record(
        &self,
        key: &str,
    ) -> Result<Option<IdempotencyRecord>, LedgerError>;

    /// Deletes idempotency records created before the cutoff. Returns how
    /// many were removed.
    async fn purge_idempotency_records(
        &self,
        older_than: DateTime<Utc>,
    ) -> Result<u64, LedgerError>;
}
