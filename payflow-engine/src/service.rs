//! Payment lifecycle engine.
//!
//! Orchestrates validation, idempotency, per-payment locking, gateway calls
//! and ledger commits. Contains no HTTP or storage specifics; both sides are
//! injected through the `payflow-core` ports.

use std::time::Duration;

use chrono::Utc;
use rust_decimal::Decimal;

use payflow_core::{
    AuthorizeRequest, Capture, CaptureRequest, Currency, DomainError, EngineError, GatewayCharge,
    GatewayError, GatewayLogEntry, GatewayOperation, IdempotencyRecord, LedgerEntry, LedgerError,
    Money, Payment, PaymentFilter, PaymentGateway, PaymentId, PaymentLedger, PaymentView, Receipt,
    Refund, RefundRequest, StoredOutcome, VoidRequest, request_fingerprint,
};

use crate::idempotency::{Admission, IdempotencyGate};
use crate::locks::PaymentLocks;

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Timeouts and retry limits for the engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Deadline for a single gateway call.
    pub gateway_timeout: Duration,
    /// How long a mutation waits for the per-payment lock.
    pub lock_timeout: Duration,
    /// How long a keyed request waits for an in-flight twin to settle.
    pub pending_wait: Duration,
    /// Total optimistic-commit attempts before giving up.
    pub commit_retries: u32,
    /// Retention for stored idempotency outcomes.
    pub idempotency_ttl: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            gateway_timeout: Duration::from_secs(5),
            lock_timeout: Duration::from_secs(5),
            pending_wait: Duration::from_secs(10),
            commit_retries: 3,
            idempotency_ttl: Duration::from_secs(24 * 60 * 60),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Engine
// ─────────────────────────────────────────────────────────────────────────────

/// Payment lifecycle engine.
///
/// Generic over `L: PaymentLedger` and `G: PaymentGateway` - both adapters
/// are injected at compile time, so tests run against the in-memory ledger
/// and a scripted gateway.
pub struct PaymentEngine<L: PaymentLedger, G: PaymentGateway> {
    ledger: L,
    gateway: G,
    gate: IdempotencyGate,
    locks: PaymentLocks,
    config: EngineConfig,
}

impl<L: PaymentLedger, G: PaymentGateway> PaymentEngine<L, G> {
    /// Creates an engine with default timeouts.
    pub fn new(ledger: L, gateway: G) -> Self {
        Self::with_config(ledger, gateway, EngineConfig::default())
    }

    pub fn with_config(ledger: L, gateway: G, config: EngineConfig) -> Self {
        Self {
            ledger,
            gateway,
            gate: IdempotencyGate::new(),
            locks: PaymentLocks::new(),
            config,
        }
    }

    /// Returns a reference to the underlying ledger.
    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Authorize
    // ─────────────────────────────────────────────────────────────────────────

    /// Authorizes a new payment: places a hold with the gateway and records
    /// the aggregate. A decline records a failed payment and surfaces as
    /// [`EngineError::GatewayDeclined`]; a keyed retry replays that decline.
    pub async fn authorize(&self, req: AuthorizeRequest) -> Result<PaymentView, EngineError> {
        let key = required_key(&req.idempotency_key)?;
        if req.order_id.trim().is_empty() {
            return Err(EngineError::Validation("Order id is required".into()));
        }
        if req.customer_id.trim().is_empty() {
            return Err(EngineError::Validation("Customer id is required".into()));
        }
        let amount = positive_money(req.amount, req.currency)?;

        // Resolve the gateway instrument and the card summary kept on file.
        let (method_token, card_last_four, card_brand) = if req.payment_method.is_card() {
            let card = req.card_details.as_ref().ok_or_else(|| {
                EngineError::Validation("Card details required for card payments".into())
            })?;
            card.validate(Utc::now())?;
            (
                card.card_token.clone(),
                Some(card.last_four.clone()),
                Some(card.brand.clone()),
            )
        } else {
            ("WALLET".to_string(), None, None)
        };

        let amount_field = req.amount.normalize().to_string();
        let method_field = req.payment_method.to_string();
        let fingerprint = request_fingerprint(
            "authorize",
            &req.order_id,
            &[
                &req.customer_id,
                &amount_field,
                req.currency.code(),
                &method_field,
                &method_token,
            ],
        );

        if let Some(outcome) = self.admit(&key, &fingerprint).await? {
            return replay(outcome);
        }

        let result = self
            .authorize_fresh(
                req,
                amount,
                method_token,
                card_last_four,
                card_brand,
                &key,
                &fingerprint,
            )
            .await;
        if !matches!(result, Ok(_) | Err(EngineError::GatewayDeclined { .. })) {
            // Indeterminate or internal failure: release the key so a retry
            // re-executes instead of replaying a half-finished outcome.
            self.gate.abandon(&key);
        }
        result
    }

    #[allow(clippy::too_many_arguments)]
    async fn authorize_fresh(
        &self,
        req: AuthorizeRequest,
        amount: Money,
        method_token: String,
        card_last_four: Option<String>,
        card_brand: Option<String>,
        key: &str,
        fingerprint: &str,
    ) -> Result<PaymentView, EngineError> {
        // Generated before the charge so the gateway log can reference it.
        let id = PaymentId::new();

        match self.gateway_charge(&id, &amount, &method_token).await {
            Ok(charge) => {
                let payment = Payment::authorized(
                    id,
                    req.order_id,
                    req.customer_id,
                    req.payment_method,
                    method_token,
                    card_last_four,
                    card_brand,
                    amount,
                    charge.reference,
                );
                let record = IdempotencyRecord::new(
                    key.to_string(),
                    fingerprint.to_string(),
                    StoredOutcome::Completed(payment.clone()),
                );
                self.ledger.insert_payment(&payment, Some(&record)).await?;
                self.gate.finalize(key, record.outcome);
                tracing::info!(payment_id = %payment.id, order_id = %payment.order_id, "Payment authorized");
                Ok(PaymentView::from(&payment))
            }
            Err(EngineError::GatewayDeclined { reason, .. }) => {
                // A decline is a definite outcome: persist the failed payment
                // for audit and replay the same decline on retries.
                let payment = Payment::declined(
                    id,
                    req.order_id,
                    req.customer_id,
                    req.payment_method,
                    method_token,
                    card_last_four,
                    card_brand,
                    amount,
                    reason.clone(),
                );
                let outcome = StoredOutcome::Declined {
                    payment_id: payment.id.clone(),
                    reason: reason.clone(),
                };
                let record = IdempotencyRecord::new(
                    key.to_string(),
                    fingerprint.to_string(),
                    outcome.clone(),
                );
                self.ledger.insert_payment(&payment, Some(&record)).await?;
                self.gate.finalize(key, outcome);
                tracing::info!(payment_id = %payment.id, %reason, "Payment declined");
                Err(EngineError::GatewayDeclined {
                    payment_id: payment.id,
                    reason,
                })
            }
            Err(other) => Err(other),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Capture
    // ─────────────────────────────────────────────────────────────────────────

    /// Captures part or all of an authorized amount.
    pub async fn capture(
        &self,
        id: &PaymentId,
        req: CaptureRequest,
    ) -> Result<PaymentView, EngineError> {
        let key = required_key(&req.idempotency_key)?;
        if req.amount <= Decimal::ZERO {
            return Err(EngineError::Validation("Amount must be positive".into()));
        }

        let amount_field = req.amount.normalize().to_string();
        let currency_field = req.currency.map(|c| c.code()).unwrap_or_default();
        let fingerprint =
            request_fingerprint("capture", id.as_str(), &[&amount_field, currency_field]);

        if let Some(outcome) = self.admit(&key, &fingerprint).await? {
            return replay(outcome);
        }

        let result = self.capture_fresh(id, req, &key, &fingerprint).await;
        if result.is_err() {
            self.gate.abandon(&key);
        }
        result
    }

    async fn capture_fresh(
        &self,
        id: &PaymentId,
        req: CaptureRequest,
        key: &str,
        fingerprint: &str,
    ) -> Result<PaymentView, EngineError> {
        let _guard = self
            .locks
            .acquire(id, self.config.lock_timeout)
            .await
            .ok_or(EngineError::LockTimeout)?;

        let payment = self.load_required(id).await?;
        let currency = req
            .currency
            .unwrap_or_else(|| payment.authorized_amount.currency());
        let amount = Money::new(req.amount, currency)?;

        // State-machine check before any money moves.
        payment.ensure_can_capture(&amount)?;

        let charge = self
            .gateway_charge(id, &amount, &payment.method_token)
            .await?;
        let capture = Capture::new(id.clone(), amount, charge.reference);

        let updated = self
            .commit_with_retry(
                id,
                payment,
                Some(LedgerEntry::Capture(capture.clone())),
                Some(key),
                fingerprint,
                |p| p.record_capture(&capture),
            )
            .await?;

        self.gate
            .finalize(key, StoredOutcome::Completed(updated.clone()));
        tracing::info!(payment_id = %id, capture_id = %capture.id, amount = %amount, "Capture settled");
        Ok(PaymentView::from(&updated))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Refund
    // ─────────────────────────────────────────────────────────────────────────

    /// Refunds captured funds, fully (no amount) or partially.
    pub async fn refund(
        &self,
        id: &PaymentId,
        req: RefundRequest,
    ) -> Result<PaymentView, EngineError> {
        let key = required_key(&req.idempotency_key)?;
        if let Some(amount) = req.amount {
            if amount <= Decimal::ZERO {
                return Err(EngineError::Validation("Amount must be positive".into()));
            }
        }

        let amount_field = req
            .amount
            .map(|amount| amount.normalize().to_string())
            .unwrap_or_default();
        let currency_field = req.currency.map(|c| c.code()).unwrap_or_default();
        let fingerprint = request_fingerprint(
            "refund",
            id.as_str(),
            &[&amount_field, currency_field, &req.reason],
        );

        if let Some(outcome) = self.admit(&key, &fingerprint).await? {
            return replay(outcome);
        }

        let result = self.refund_fresh(id, req, &key, &fingerprint).await;
        if result.is_err() {
            self.gate.abandon(&key);
        }
        result
    }

    async fn refund_fresh(
        &self,
        id: &PaymentId,
        req: RefundRequest,
        key: &str,
        fingerprint: &str,
    ) -> Result<PaymentView, EngineError> {
        let _guard = self
            .locks
            .acquire(id, self.config.lock_timeout)
            .await
            .ok_or(EngineError::LockTimeout)?;

        let payment = self.load_required(id).await?;
        let currency = req
            .currency
            .unwrap_or_else(|| payment.authorized_amount.currency());
        let amount = match req.amount {
            Some(amount) => Money::new(amount, currency)?,
            // No amount means "everything still refundable".
            None => payment.remaining_captured()?,
        };
        if !amount.is_positive() {
            return Err(EngineError::Validation("Nothing left to refund".into()));
        }

        payment.ensure_can_refund(&amount)?;

        let reference = payment.gateway_reference.clone().ok_or_else(|| {
            EngineError::Internal("Capturable payment has no gateway reference".into())
        })?;
        self.gateway_reverse(id, &reference, &amount).await?;

        let refund = Refund::new(id.clone(), amount, reference, req.reason.clone());
        let updated = self
            .commit_with_retry(
                id,
                payment,
                Some(LedgerEntry::Refund(refund.clone())),
                Some(key),
                fingerprint,
                |p| p.record_refund(&refund),
            )
            .await?;

        self.gate
            .finalize(key, StoredOutcome::Completed(updated.clone()));
        tracing::info!(payment_id = %id, refund_id = %refund.id, amount = %amount, reason = %refund.reason, "Refund settled");
        Ok(PaymentView::from(&updated))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Void
    // ─────────────────────────────────────────────────────────────────────────

    /// Voids an authorization, releasing the full hold. The idempotency key
    /// is optional here: a keyless second void fails the state check instead.
    pub async fn void(&self, id: &PaymentId, req: VoidRequest) -> Result<PaymentView, EngineError> {
        let key = req
            .idempotency_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .map(str::to_string);

        let fingerprint = request_fingerprint("void", id.as_str(), &[]);
        if let Some(key) = &key {
            if let Some(outcome) = self.admit(key, &fingerprint).await? {
                return replay(outcome);
            }
        }

        let result = self.void_fresh(id, key.as_deref(), &fingerprint).await;
        if result.is_err() {
            if let Some(key) = &key {
                self.gate.abandon(key);
            }
        }
        result
    }

    async fn void_fresh(
        &self,
        id: &PaymentId,
        key: Option<&str>,
        fingerprint: &str,
    ) -> Result<PaymentView, EngineError> {
        let _guard = self
            .locks
            .acquire(id, self.config.lock_timeout)
            .await
            .ok_or(EngineError::LockTimeout)?;

        let payment = self.load_required(id).await?;
        payment.ensure_can_void()?;

        let reference = payment.gateway_reference.clone().ok_or_else(|| {
            EngineError::Internal("Authorized payment has no gateway reference".into())
        })?;
        let amount = payment.authorized_amount;
        self.gateway_reverse(id, &reference, &amount).await?;

        let voided_at = Utc::now();
        let updated = self
            .commit_with_retry(id, payment, None, key, fingerprint, move |p| {
                p.record_void(voided_at)
            })
            .await?;

        if let Some(key) = key {
            self.gate
                .finalize(key, StoredOutcome::Completed(updated.clone()));
        }
        tracing::info!(payment_id = %id, "Authorization voided");
        Ok(PaymentView::from(&updated))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Reads
    // ─────────────────────────────────────────────────────────────────────────

    pub async fn get_payment(&self, id: &PaymentId) -> Result<PaymentView, EngineError> {
        let payment = self.load_required(id).await?;
        Ok(PaymentView::from(&payment))
    }

    pub async fn list_payments(
        &self,
        filter: &PaymentFilter,
    ) -> Result<Vec<PaymentView>, EngineError> {
        let payments = self.ledger.list_payments(filter).await?;
        Ok(payments.iter().map(PaymentView::from).collect())
    }

    /// Builds a receipt for a payment that has settled funds.
    pub async fn receipt(&self, id: &PaymentId) -> Result<Receipt, EngineError> {
        let payment = self.load_required(id).await?;
        if !payment.status().has_settled_funds() {
            return Err(EngineError::Validation(
                "Receipt only available for completed payments".into(),
            ));
        }
        Ok(Receipt::from(&payment))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Maintenance
    // ─────────────────────────────────────────────────────────────────────────

    /// Drops idempotency outcomes older than the configured TTL, both from
    /// the in-process gate and the durable ledger records.
    pub async fn purge_expired(&self) -> Result<u64, EngineError> {
        let ttl = chrono::Duration::from_std(self.config.idempotency_ttl)
            .unwrap_or_else(|_| chrono::Duration::days(1));
        let Some(cutoff) = Utc::now().checked_sub_signed(ttl) else {
            return Ok(0);
        };

        let dropped = self.gate.purge_finalized(cutoff);
        let purged = self.ledger.purge_idempotency_records(cutoff).await?;
        if dropped > 0 || purged > 0 {
            tracing::debug!(in_process = dropped, durable = purged, "Purged expired idempotency records");
        }
        Ok(purged)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Internals
    // ─────────────────────────────────────────────────────────────────────────

    /// Runs the keyed request through the in-process gate, then the durable
    /// records. `Some(outcome)` means replay; `None` means this caller owns
    /// the reservation and must finalize or abandon it.
    async fn admit(
        &self,
        key: &str,
        fingerprint: &str,
    ) -> Result<Option<StoredOutcome>, EngineError> {
        match self
            .gate
            .begin(key, fingerprint, self.config.pending_wait)
            .await?
        {
            Admission::Replay(outcome) => Ok(Some(outcome)),
            Admission::Fresh => {
                // The in-process entry is lost on restart; the record inside
                // the ledger survives it.
                let durable = match self.ledger.find_idempotency_record(key).await {
                    Ok(found) => found,
                    Err(e) => {
                        self.gate.abandon(key);
                        return Err(e.into());
                    }
                };
                match durable {
                    Some(record) if record.fingerprint == fingerprint => {
                        self.gate.finalize(key, record.outcome.clone());
                        Ok(Some(record.outcome))
                    }
                    Some(_) => {
                        self.gate.abandon(key);
                        Err(EngineError::IdempotencyConflict)
                    }
                    None => Ok(None),
                }
            }
        }
    }

    async fn load_required(&self, id: &PaymentId) -> Result<Payment, EngineError> {
        self.ledger
            .load_payment(id)
            .await?
            .ok_or_else(|| EngineError::NotFound("Payment not found".into()))
    }

    /// Calls `gateway.charge` under the configured deadline and appends the
    /// gateway log entry for whatever outcome came back.
    async fn gateway_charge(
        &self,
        payment_id: &PaymentId,
        amount: &Money,
        instrument: &str,
    ) -> Result<GatewayCharge, EngineError> {
        let outcome = tokio::time::timeout(
            self.config.gateway_timeout,
            self.gateway.charge(amount, instrument),
        )
        .await;

        match outcome {
            Ok(Ok(charge)) => {
                let entry = GatewayLogEntry::succeeded(
                    payment_id.clone(),
                    GatewayOperation::Charge,
                    *amount,
                    Some(charge.reference.clone()),
                );
                self.ledger.append_gateway_log(&entry).await?;
                Ok(charge)
            }
            Ok(Err(GatewayError::Declined { reason })) => {
                let entry = GatewayLogEntry::declined(
                    payment_id.clone(),
                    GatewayOperation::Charge,
                    *amount,
                    reason.clone(),
                );
                self.log_gateway_failure(&entry).await;
                Err(EngineError::GatewayDeclined {
                    payment_id: payment_id.clone(),
                    reason,
                })
            }
            Ok(Err(GatewayError::Unavailable(detail))) => {
                let entry = GatewayLogEntry::errored(
                    payment_id.clone(),
                    GatewayOperation::Charge,
                    *amount,
                    detail.clone(),
                );
                self.log_gateway_failure(&entry).await;
                Err(EngineError::GatewayUnavailable(detail))
            }
            Ok(Err(GatewayError::Timeout)) | Err(_) => {
                let entry = GatewayLogEntry::timed_out(
                    payment_id.clone(),
                    GatewayOperation::Charge,
                    *amount,
                );
                self.log_gateway_failure(&entry).await;
                tracing::warn!(payment_id = %payment_id, "Gateway charge timed out; outcome indeterminate");
                Err(EngineError::GatewayTimeout)
            }
        }
    }

    /// Calls `gateway.reverse` under the configured deadline, logging like
    /// [`Self::gateway_charge`].
    async fn gateway_reverse(
        &self,
        payment_id: &PaymentId,
        reference: &str,
        amount: &Money,
    ) -> Result<(), EngineError> {
        let outcome = tokio::time::timeout(
            self.config.gateway_timeout,
            self.gateway.reverse(reference, amount),
        )
        .await;

        match outcome {
            Ok(Ok(())) => {
                let entry = GatewayLogEntry::succeeded(
                    payment_id.clone(),
                    GatewayOperation::Reverse,
                    *amount,
                    Some(reference.to_string()),
                );
                self.ledger.append_gateway_log(&entry).await?;
                Ok(())
            }
            Ok(Err(GatewayError::Declined { reason })) => {
                let entry = GatewayLogEntry::declined(
                    payment_id.clone(),
                    GatewayOperation::Reverse,
                    *amount,
                    reason.clone(),
                );
                self.log_gateway_failure(&entry).await;
                Err(EngineError::GatewayDeclined {
                    payment_id: payment_id.clone(),
                    reason,
                })
            }
            Ok(Err(GatewayError::Unavailable(detail))) => {
                let entry = GatewayLogEntry::errored(
                    payment_id.clone(),
                    GatewayOperation::Reverse,
                    *amount,
                    detail.clone(),
                );
                self.log_gateway_failure(&entry).await;
                Err(EngineError::GatewayUnavailable(detail))
            }
            Ok(Err(GatewayError::Timeout)) | Err(_) => {
                let entry = GatewayLogEntry::timed_out(
                    payment_id.clone(),
                    GatewayOperation::Reverse,
                    *amount,
                );
                self.log_gateway_failure(&entry).await;
                tracing::warn!(payment_id = %payment_id, "Gateway reversal timed out; outcome indeterminate");
                Err(EngineError::GatewayTimeout)
            }
        }
    }

    /// Appends a failure entry to the gateway log. The primary error is
    /// already decided here, so a log write failure is only traced.
    async fn log_gateway_failure(&self, entry: &GatewayLogEntry) {
        if let Err(e) = self.ledger.append_gateway_log(entry).await {
            tracing::error!(payment_id = %entry.payment_id, error = %e, "Failed to append gateway log entry");
        }
    }

    /// Applies `apply` to the loaded aggregate and commits with version
    /// checking. On a conflict the aggregate is reloaded and re-validated;
    /// the gateway result already in hand is reused, never re-charged.
    async fn commit_with_retry<F>(
        &self,
        id: &PaymentId,
        mut current: Payment,
        entry: Option<LedgerEntry>,
        key: Option<&str>,
        fingerprint: &str,
        apply: F,
    ) -> Result<Payment, EngineError>
    where
        F: Fn(&mut Payment) -> Result<(), DomainError>,
    {
        for attempt in 1..=self.config.commit_retries {
            let mut updated = current.clone();
            apply(&mut updated)?;

            let record = key.map(|key| {
                IdempotencyRecord::new(
                    key.to_string(),
                    fingerprint.to_string(),
                    StoredOutcome::Completed(updated.clone()),
                )
            });

            match self
                .ledger
                .commit_if_version_matches(&updated, current.version, entry.as_ref(), record.as_ref())
                .await
            {
                Ok(()) => return Ok(updated),
                Err(LedgerError::VersionConflict { expected, found }) => {
                    if attempt == self.config.commit_retries {
                        break;
                    }
                    tracing::warn!(
                        payment_id = %id,
                        attempt,
                        expected,
                        found,
                        "Ledger version moved underneath commit, reloading"
                    );
                    current = self.load_required(id).await?;
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(EngineError::ConcurrentModification)
    }
}

fn required_key(key: &str) -> Result<String, EngineError> {
    let key = key.trim();
    if key.is_empty() {
        return Err(EngineError::Validation("Idempotency key is required".into()));
    }
    Ok(key.to_string())
}

fn positive_money(amount: Decimal, currency: Currency) -> Result<Money, EngineError> {
    let money = Money::new(amount, currency)?;
    if !money.is_positive() {
        return Err(EngineError::Validation("Amount must be positive".into()));
    }
    Ok(money)
}

fn replay(outcome: StoredOutcome) -> Result<PaymentView, EngineError> {
    match outcome {
        StoredOutcome::Completed(payment) => Ok(PaymentView::from(&payment)),
        StoredOutcome::Declined { payment_id, reason } => {
            Err(EngineError::GatewayDeclined { payment_id, reason })
        }
    }
}
