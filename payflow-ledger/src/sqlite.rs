//! SQLite ledger adapter.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use sqlx::sqlite::SqliteConnectOptions;
use std::str::FromStr;

use payflow_core::{
    Capture, GatewayLogEntry, IdempotencyRecord, LedgerEntry, LedgerError, Payment, PaymentFilter,
    PaymentId, PaymentLedger, Refund,
};

use crate::types::{DbCapture, DbIdempotencyRecord, DbPayment, DbRefund, DbVersion};

// ─────────────────────────────────────────────────────────────────────────────
// SQLite Ledger
// ─────────────────────────────────────────────────────────────────────────────

/// SQLite ledger implementation.
pub struct SqliteLedger {
    pool: SqlitePool,
}

impl SqliteLedger {
    /// Creates a new SQLite ledger with automatic migration.
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        // Ensure on-disk SQLite target directory exists (no-op for in-memory).
        if let Some(path) = database_url.strip_prefix("sqlite://") {
            // Remove query parameters
            let path = path.split('?').next().unwrap_or(path);
            if path != ":memory:" {
                let p = std::path::Path::new(path);
                if let Some(parent) = p.parent() {
                    if !parent.as_os_str().is_empty() {
                        tokio::fs::create_dir_all(parent).await?;
                    }
                }
            }
        }

        tracing::debug!("Opening SQLite ledger at {database_url}");
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePool::connect_with(options).await?;

        // Run migrations from migration files
        let ddl = include_str!("../migrations/0001_create_tables.sql");
        sqlx::query(ddl).execute(&pool).await?;

        let ddl_idempotency = include_str!("../migrations/0002_create_idempotency.sql");
        sqlx::query(ddl_idempotency).execute(&pool).await?;

        Ok(Self { pool })
    }
}

/// Inserts the idempotency record inside the caller's transaction.
async fn insert_idempotency_record(
    db_tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    record: &IdempotencyRecord,
) -> Result<(), LedgerError> {
    let outcome = serde_json::to_string(&record.outcome)
        .map_err(|e| LedgerError::Database(format!("Serialize stored outcome: {e}")))?;

    sqlx::query(
        r#"INSERT INTO idempotency_records (key, fingerprint, outcome, created_at)
           VALUES (?, ?, ?, ?)"#,
    )
    .bind(&record.key)
    .bind(&record.fingerprint)
    .bind(&outcome)
    .bind(record.created_at.to_rfc3339())
    .execute(&mut **db_tx)
    .await
    .map_err(|e| LedgerError::Database(e.to_string()))?;

    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Ledger implementation
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl PaymentLedger for SqliteLedger {
    async fn insert_payment(
        &self,
        payment: &Payment,
        record: Option<&IdempotencyRecord>,
    ) -> Result<(), LedgerError> {
        let mut db_tx = self
            .pool
            .begin()
            .await
            .map_err(|e| LedgerError::Transaction(e.to_string()))?;

        sqlx::query(
            r#"INSERT INTO payments (id, order_id, customer_id, payment_method, method_token,
                   card_last_four, card_brand, authorized_amount, captured_total, refunded_total,
                   currency, gateway_reference, decline_reason, created_at, updated_at,
                   captured_at, refunded_at, voided_at, version)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(payment.id.as_str())
        .bind(&payment.order_id)
        .bind(&payment.customer_id)
        .bind(payment.payment_method.to_string())
        .bind(&payment.method_token)
        .bind(&payment.card_last_four)
        .bind(&payment.card_brand)
        .bind(payment.authorized_amount.amount().to_string())
        .bind(payment.captured_total.amount().to_string())
        .bind(payment.refunded_total.amount().to_string())
        .bind(payment.authorized_amount.currency().to_string())
        .bind(&payment.gateway_reference)
        .bind(&payment.decline_reason)
        .bind(payment.created_at.to_rfc3339())
        .bind(payment.updated_at.to_rfc3339())
        .bind(payment.captured_at.map(|t| t.to_rfc3339()))
        .bind(payment.refunded_at.map(|t| t.to_rfc3339()))
        .bind(payment.voided_at.map(|t| t.to_rfc3339()))
        .bind(payment.version)
        .execute(&mut *db_tx)
        .await
        .map_err(|e| LedgerError::Database(e.to_string()))?;

        if let Some(record) = record {
            insert_idempotency_record(&mut db_tx, record).await?;
        }

        db_tx
            .commit()
            .await
            .map_err(|e| LedgerError::Transaction(e.to_string()))?;

        Ok(())
    }

    async fn load_payment(&self, id: &PaymentId) -> Result<Option<Payment>, LedgerError> {
        let row: Option<DbPayment> = sqlx::query_as(
            r#"SELECT id, order_id, customer_id, payment_method, method_token, card_last_four,
                      card_brand, authorized_amount, captured_total, refunded_total, currency,
                      gateway_reference, decline_reason, created_at, updated_at, captured_at,
                      refunded_at, voided_at, version
               FROM payments WHERE id = ?"#,
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| LedgerError::Database(e.to_string()))?;

        row.map(DbPayment::into_domain).transpose()
    }

    async fn list_payments(&self, filter: &PaymentFilter) -> Result<Vec<Payment>, LedgerError> {
        // Status is a derived projection, so it filters after load;
        // order and customer use the indexed columns.
        let rows: Vec<DbPayment> = sqlx::query_as(
            r#"SELECT id, order_id, customer_id, payment_method, method_token, card_last_four,
                      card_brand, authorized_amount, captured_total, refunded_total, currency,
                      gateway_reference, decline_reason, created_at, updated_at, captured_at,
                      refunded_at, voided_at, version
               FROM payments
               WHERE (? IS NULL OR order_id = ?)
                 AND (? IS NULL OR customer_id = ?)
               ORDER BY created_at DESC"#,
        )
        .bind(&filter.order_id)
        .bind(&filter.order_id)
        .bind(&filter.customer_id)
        .bind(&filter.customer_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| LedgerError::Database(e.to_string()))?;

        let mut payments = rows
            .into_iter()
            .map(DbPayment::into_domain)
            .collect::<Result<Vec<_>, _>>()?;
        payments.retain(|payment| filter.matches(payment));
        payments.truncate(filter.effective_limit());
        Ok(payments)
    }

    async fn commit_if_version_matches(
        &self,
        payment: &Payment,
        expected_version: i64,
        entry: Option<&LedgerEntry>,
        record: Option<&IdempotencyRecord>,
    ) -> Result<(), LedgerError> {
        let mut db_tx = self
            .pool
            .begin()
            .await
            .map_err(|e| LedgerError::Transaction(e.to_string()))?;

        let result = sqlx::query(
            r#"UPDATE payments
               SET captured_total = ?, refunded_total = ?, gateway_reference = ?,
                   decline_reason = ?, updated_at = ?, captured_at = ?, refunded_at = ?,
                   voided_at = ?, version = ?
               WHERE id = ? AND version = ?"#,
        )
        .bind(payment.captured_total.amount().to_string())
        .bind(payment.refunded_total.amount().to_string())
        .bind(&payment.gateway_reference)
        .bind(&payment.decline_reason)
        .bind(payment.updated_at.to_rfc3339())
        .bind(payment.captured_at.map(|t| t.to_rfc3339()))
        .bind(payment.refunded_at.map(|t| t.to_rfc3339()))
        .bind(payment.voided_at.map(|t| t.to_rfc3339()))
        .bind(payment.version)
        .bind(payment.id.as_str())
        .bind(expected_version)
        .execute(&mut *db_tx)
        .await
        .map_err(|e| LedgerError::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            let found: Option<DbVersion> =
                sqlx::query_as(r#"SELECT version FROM payments WHERE id = ?"#)
                    .bind(payment.id.as_str())
                    .fetch_optional(&mut *db_tx)
                    .await
                    .map_err(|e| LedgerError::Database(e.to_string()))?;

            return match found {
                None => Err(LedgerError::NotFound),
                Some(row) => Err(LedgerError::VersionConflict {
                    expected: expected_version,
                    found: row.version,
                }),
            };
        }

        match entry {
            Some(LedgerEntry::Capture(capture)) => {
                sqlx::query(
                    r#"INSERT INTO captures (id, payment_id, amount, currency, gateway_reference, created_at)
                       VALUES (?, ?, ?, ?, ?, ?)"#,
                )
                .bind(capture.id.as_str())
                .bind(capture.payment_id.as_str())
                .bind(capture.amount.amount().to_string())
                .bind(capture.amount.currency().to_string())
                .bind(&capture.gateway_reference)
                .bind(capture.created_at.to_rfc3339())
                .execute(&mut *db_tx)
                .await
                .map_err(|e| LedgerError::Database(e.to_string()))?;
            }
            Some(LedgerEntry::Refund(refund)) => {
                sqlx::query(
                    r#"INSERT INTO refunds (id, payment_id, amount, currency, gateway_reference, reason, created_at)
                       VALUES (?, ?, ?, ?, ?, ?, ?)"#,
                )
                .bind(refund.id.as_str())
                .bind(refund.payment_id.as_str())
                .bind(refund.amount.amount().to_string())
                .bind(refund.amount.currency().to_string())
                .bind(&refund.gateway_reference)
                .bind(&refund.reason)
                .bind(refund.created_at.to_rfc3339())
                .execute(&mut *db_tx)
                .await
                .map_err(|e| LedgerError::Database(e.to_string()))?;
            }
            None => {}
        }

        if let Some(record) = record {
            insert_idempotency_record(&mut db_tx, record).await?;
        }

        db_tx
            .commit()
            .await
            .map_err(|e| LedgerError::Transaction(e.to_string()))?;

        Ok(())
    }

    async fn list_captures(&self, id: &PaymentId) -> Result<Vec<Capture>, LedgerError> {
        let rows: Vec<DbCapture> = sqlx::query_as(
            r#"SELECT id, payment_id, amount, currency, gateway_reference, created_at
               FROM captures WHERE payment_id = ? ORDER BY created_at ASC"#,
        )
        .bind(id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| LedgerError::Database(e.to_string()))?;

        rows.into_iter().map(DbCapture::into_domain).collect()
    }

    async fn list_refunds(&self, id: &PaymentId) -> Result<Vec<Refund>, LedgerError> {
        let rows: Vec<DbRefund> = sqlx::query_as(
            r#"SELECT id, payment_id, amount, currency, gateway_reference, reason, created_at
               FROM refunds WHERE payment_id = ? ORDER BY created_at ASC"#,
        )
        .bind(id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| LedgerError::Database(e.to_string()))?;

        rows.into_iter().map(DbRefund::into_domain).collect()
    }

    async fn append_gateway_log(&self, entry: &GatewayLogEntry) -> Result<(), LedgerError> {
        sqlx::query(
            r#"INSERT INTO gateway_log (id, payment_id, operation, amount, currency, outcome,
                   reference, detail, created_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(entry.id.to_string())
        .bind(entry.payment_id.as_str())
        .bind(entry.operation.to_string())
        .bind(entry.amount.amount().to_string())
        .bind(entry.amount.currency().to_string())
        .bind(entry.outcome.to_string())
        .bind(&entry.reference)
        .bind(&entry.detail)
        .bind(entry.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| LedgerError::Database(e.to_string()))?;

        Ok(())
    }

    async fn find_idempotency_record(
        &self,
        key: &str,
    ) -> Result<Option<IdempotencyRecord>, LedgerError> {
        let row: Option<DbIdempotencyRecord> = sqlx::query_as(
            r#"SELECT key, fingerprint, outcome, created_at
               FROM idempotency_records WHERE key = ?"#,
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| LedgerError::Database(e.to_string()))?;

        row.map(DbIdempotencyRecord::into_domain).transpose()
    }

    async fn purge_idempotency_records(
        &self,
        older_than: DateTime<Utc>,
    ) -> Result<u64, LedgerError> {
        let result = sqlx::query(r#"DELETE FROM idempotency_records WHERE created_at < ?"#)
            .bind(older_than.to_rfc3339())
            .execute(&self.pool)
            .await
            .map_err(|e| LedgerError::Database(e.to_string()))?;

        Ok(result.rows_affected())
    }
}
