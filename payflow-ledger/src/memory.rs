//! In-memory ledger adapter.
//!
//! The default adapter for development and tests. Aggregate commits serialize
//! on the payment's map entry, so the version check and the dependent writes
//! behave atomically within one process.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Mutex;

use payflow_core::{
    Capture, GatewayLogEntry, IdempotencyRecord, LedgerEntry, LedgerError, Payment, PaymentFilter,
    PaymentId, PaymentLedger, Refund,
};

/// In-memory ledger backed by concurrent maps.
#[derive(Default)]
pub struct MemoryLedger {
    payments: DashMap<PaymentId, Payment>,
    captures: DashMap<PaymentId, Vec<Capture>>,
    refunds: DashMap<PaymentId, Vec<Refund>>,
    records: DashMap<String, IdempotencyRecord>,
    gateway_log: Mutex<Vec<GatewayLogEntry>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of gateway log entries recorded so far.
    pub fn gateway_log_len(&self) -> usize {
        self.gateway_log
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    /// Snapshot of the gateway write-ahead log, oldest first.
    pub fn gateway_log_entries(&self) -> Vec<GatewayLogEntry> {
        self.gateway_log
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn store_record(&self, record: &IdempotencyRecord) {
        self.records.insert(record.key.clone(), record.clone());
    }
}

#[async_trait]
impl PaymentLedger for MemoryLedger {
    async fn insert_payment(
        &self,
        payment: &Payment,
        record: Option<&IdempotencyRecord>,
    ) -> Result<(), LedgerError> {
        match self.payments.entry(payment.id.clone()) {
            Entry::Occupied(_) => {
                return Err(LedgerError::Database(format!(
                    "Duplicate payment id: {}",
                    payment.id
                )));
            }
            Entry::Vacant(slot) => {
                slot.insert(payment.clone());
            }
        }
        if let Some(record) = record {
            self.store_record(record);
        }
        Ok(())
    }

    async fn load_payment(&self, id: &PaymentId) -> Result<Option<Payment>, LedgerError> {
        Ok(self.payments.get(id).map(|entry| entry.clone()))
    }

    async fn list_payments(&self, filter: &PaymentFilter) -> Result<Vec<Payment>, LedgerError> {
        let mut payments: Vec<Payment> = self
            .payments
            .iter()
            .filter(|entry| filter.matches(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();
        payments.sort_by(|a, b| b.created_at.cmp(&a.created_at));
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
        let mut stored = self
            .payments
            .get_mut(&payment.id)
            .ok_or(LedgerError::NotFound)?;
        if stored.version != expected_version {
            return Err(LedgerError::VersionConflict {
                expected: expected_version,
                found: stored.version,
            });
        }
        *stored = payment.clone();

        match entry {
            Some(LedgerEntry::Capture(capture)) => {
                self.captures
                    .entry(payment.id.clone())
                    .or_default()
                    .push(capture.clone());
            }
            Some(LedgerEntry::Refund(refund)) => {
                self.refunds
                    .entry(payment.id.clone())
                    .or_default()
                    .push(refund.clone());
            }
            None => {}
        }
        if let Some(record) = record {
            self.store_record(record);
        }
        Ok(())
    }

    async fn list_captures(&self, id: &PaymentId) -> Result<Vec<Capture>, LedgerError> {
        Ok(self
            .captures
            .get(id)
            .map(|entry| entry.clone())
            .unwrap_or_default())
    }

    async fn list_refunds(&self, id: &PaymentId) -> Result<Vec<Refund>, LedgerError> {
        Ok(self
            .refunds
            .get(id)
            .map(|entry| entry.clone())
            .unwrap_or_default())
    }

    async fn append_gateway_log(&self, entry: &GatewayLogEntry) -> Result<(), LedgerError> {
        self.gateway_log
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(entry.clone());
        Ok(())
    }

    async fn find_idempotency_record(
        &self,
        key: &str,
    ) -> Result<Option<IdempotencyRecord>, LedgerError> {
        Ok(self.records.get(key).map(|entry| entry.clone()))
    }

    async fn purge_idempotency_records(
        &self,
        older_than: DateTime<Utc>,
    ) -> Result<u64, LedgerError> {
        let before = self.records.len();
        self.records.retain(|_, record| record.created_at >= older_than);
        Ok(before.saturating_sub(self.records.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use payflow_core::{Currency, Money, PaymentMethod, PaymentStatus, StoredOutcome};
    use rust_decimal_macros::dec;

    fn sample_payment() -> Payment {
        Payment::authorized(
            PaymentId::new(),
            "ORD-1001".into(),
            "CUST-2002".into(),
            PaymentMethod::CreditCard,
            "tok_visa".into(),
            Some("4242".into()),
            Some("visa".into()),
            Money::new(dec!(100.00), Currency::USD).unwrap(),
            "AUTHREF1".into(),
        )
    }

    #[tokio::test]
    async fn test_insert_and_load_round_trip() {
        let ledger = MemoryLedger::new();
        let payment = sample_payment();
        ledger.insert_payment(&payment, None).await.unwrap();

        let loaded = ledger.load_payment(&payment.id).await.unwrap().unwrap();
        assert_eq!(loaded, payment);
        assert_eq!(loaded.status(), PaymentStatus::Authorized);
    }

    #[tokio::test]
    async fn test_duplicate_insert_fails() {
        let ledger = MemoryLedger::new();
        let payment = sample_payment();
        ledger.insert_payment(&payment, None).await.unwrap();
        assert!(matches!(
            ledger.insert_payment(&payment, None).await,
            Err(LedgerError::Database(_))
        ));
    }

    #[tokio::test]
    async fn test_commit_rejects_stale_version() {
        let ledger = MemoryLedger::new();
        let mut payment = sample_payment();
        ledger.insert_payment(&payment, None).await.unwrap();

        let capture = Capture::new(
            payment.id.clone(),
            Money::new(dec!(40.00), Currency::USD).unwrap(),
            "CAPREF1".into(),
        );
        payment.record_capture(&capture).unwrap();
        ledger
            .commit_if_version_matches(&payment, 1, Some(&LedgerEntry::Capture(capture.clone())), None)
            .await
            .unwrap();

        // Committing against the already-consumed version must conflict.
        let result = ledger
            .commit_if_version_matches(&payment, 1, Some(&LedgerEntry::Capture(capture)), None)
            .await;
        assert!(matches!(
            result,
            Err(LedgerError::VersionConflict {
                expected: 1,
                found: 2
            })
        ));
    }

    #[tokio::test]
    async fn test_commit_records_entry_and_idempotency() {
        let ledger = MemoryLedger::new();
        let mut payment = sample_payment();
        ledger.insert_payment(&payment, None).await.unwrap();

        let capture = Capture::new(
            payment.id.clone(),
            Money::new(dec!(25.00), Currency::USD).unwrap(),
            "CAPREF1".into(),
        );
        payment.record_capture(&capture).unwrap();
        let record = IdempotencyRecord::new(
            "cap-key".into(),
            "fp".into(),
            StoredOutcome::Completed(payment.clone()),
        );
        ledger
            .commit_if_version_matches(
                &payment,
                1,
                Some(&LedgerEntry::Capture(capture.clone())),
                Some(&record),
            )
            .await
            .unwrap();

        let captures = ledger.list_captures(&payment.id).await.unwrap();
        assert_eq!(captures.len(), 1);
        assert_eq!(captures[0].id, capture.id);
        let found = ledger.find_idempotency_record("cap-key").await.unwrap();
        assert!(found.is_some());
    }

    #[tokio::test]
    async fn test_list_payments_filters_and_limits() {
        let ledger = MemoryLedger::new();
        for i in 0..5 {
            let mut payment = sample_payment();
            payment.order_id = format!("ORD-{i}");
            ledger.insert_payment(&payment, None).await.unwrap();
        }

        let all = ledger
            .list_payments(&PaymentFilter::default())
            .await
            .unwrap();
        assert_eq!(all.len(), 5);

        let filter = PaymentFilter {
            order_id: Some("ORD-3".into()),
            ..Default::default()
        };
        let matching = ledger.list_payments(&filter).await.unwrap();
        assert_eq!(matching.len(), 1);
        assert_eq!(matching[0].order_id, "ORD-3");

        let limited = ledger
            .list_payments(&PaymentFilter {
                limit: Some(2),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(limited.len(), 2);
    }

    #[tokio::test]
    async fn test_purge_removes_only_expired_records() {
        let ledger = MemoryLedger::new();
        let payment = sample_payment();

        let mut old = IdempotencyRecord::new(
            "old-key".into(),
            "fp".into(),
            StoredOutcome::Completed(payment.clone()),
        );
        old.created_at = Utc::now() - Duration::hours(48);
        ledger.store_record(&old);

        let fresh = IdempotencyRecord::new(
            "fresh-key".into(),
            "fp".into(),
            StoredOutcome::Completed(payment),
        );
        ledger.store_record(&fresh);

        let cutoff = Utc::now() - Duration::hours(24);
        let purged = ledger.purge_idempotency_records(cutoff).await.unwrap();
        assert_eq!(purged, 1);
        assert!(
            ledger
                .find_idempotency_record("old-key")
                .await
                .unwrap()
                .is_none()
        );
        assert!(
            ledger
                .find_idempotency_record("fresh-key")
                .await
                .unwrap()
                .is_some()
        );
    }
}
