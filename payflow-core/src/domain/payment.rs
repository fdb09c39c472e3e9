//! Payment aggregate and its lifecycle rules.
//!
//! A payment starts as an authorization (a hold on the customer's
//! instrument) and moves money only through captures. Status is never stored:
//! it is derived from the recorded facts (`decline_reason`, `voided_at`, the
//! captured and refunded totals), so the aggregate cannot disagree with
//! itself.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::ids::{CaptureId, PaymentId, RefundId};
use super::money::Money;
use crate::error::DomainError;

/// How the customer is paying.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    CreditCard,
    DebitCard,
    BankTransfer,
    DigitalWallet,
}

impl PaymentMethod {
    /// Returns true for methods that require card details.
    pub fn is_card(&self) -> bool {
        matches!(self, PaymentMethod::CreditCard | PaymentMethod::DebitCard)
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PaymentMethod::CreditCard => "credit_card",
            PaymentMethod::DebitCard => "debit_card",
            PaymentMethod::BankTransfer => "bank_transfer",
            PaymentMethod::DigitalWallet => "digital_wallet",
        };
        f.write_str(s)
    }
}

impl FromStr for PaymentMethod {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "credit_card" => Ok(PaymentMethod::CreditCard),
            "debit_card" => Ok(PaymentMethod::DebitCard),
            "bank_transfer" => Ok(PaymentMethod::BankTransfer),
            "digital_wallet" => Ok(PaymentMethod::DigitalWallet),
            other => Err(DomainError::ValidationError(format!(
                "Unknown payment method: {other}"
            ))),
        }
    }
}

/// Lifecycle state of a payment, derived from the aggregate's facts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Authorized,
    PartiallyCaptured,
    Captured,
    PartiallyRefunded,
    Refunded,
    Voided,
    Failed,
}

impl PaymentStatus {
    /// Returns true once no further operation can succeed.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PaymentStatus::Refunded | PaymentStatus::Voided | PaymentStatus::Failed
        )
    }

    /// Returns true once at least one capture has settled funds.
    pub fn has_settled_funds(&self) -> bool {
        matches!(
            self,
            PaymentStatus::PartiallyCaptured
                | PaymentStatus::Captured
                | PaymentStatus::PartiallyRefunded
                | PaymentStatus::Refunded
        )
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PaymentStatus::Authorized => "authorized",
            PaymentStatus::PartiallyCaptured => "partially_captured",
            PaymentStatus::Captured => "captured",
            PaymentStatus::PartiallyRefunded => "partially_refunded",
            PaymentStatus::Refunded => "refunded",
            PaymentStatus::Voided => "voided",
            PaymentStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

impl FromStr for PaymentStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "authorized" => Ok(PaymentStatus::Authorized),
            "partially_captured" => Ok(PaymentStatus::PartiallyCaptured),
            "captured" => Ok(PaymentStatus::Captured),
            "partially_refunded" => Ok(PaymentStatus::PartiallyRefunded),
            "refunded" => Ok(PaymentStatus::Refunded),
            "voided" => Ok(PaymentStatus::Voided),
            "failed" => Ok(PaymentStatus::Failed),
            other => Err(DomainError::ValidationError(format!(
                "Unknown payment status: {other}"
            ))),
        }
    }
}

/// A single settled capture against a payment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Capture {
    pub id: CaptureId,
    pub payment_id: PaymentId,
    pub amount: Money,
    /// Reference returned by the gateway for this capture charge.
    pub gateway_reference: String,
    pub created_at: DateTime<Utc>,
}

impl Capture {
    pub fn new(payment_id: PaymentId, amount: Money, gateway_reference: String) -> Self {
        Self {
            id: CaptureId::new(),
            payment_id,
            amount,
            gateway_reference,
            created_at: Utc::now(),
        }
    }
}

/// A single settled refund against a payment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Refund {
    pub id: RefundId,
    pub payment_id: PaymentId,
    pub amount: Money,
    /// Reference of the gateway reversal this refund rode on.
    pub gateway_reference: String,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

impl Refund {
    pub fn new(
        payment_id: PaymentId,
        amount: Money,
        gateway_reference: String,
        reason: String,
    ) -> Self {
        Self {
            id: RefundId::new(),
            payment_id,
            amount,
            gateway_reference,
            reason,
            created_at: Utc::now(),
        }
    }
}

/// The payment aggregate.
///
/// `version` increments on every mutation and backs the compare-and-swap
/// commit in the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    /// Unique payment identifier.
    pub id: PaymentId,
    /// Merchant order this payment belongs to.
    pub order_id: String,
    /// Customer who is paying.
    pub customer_id: String,
    /// How the customer is paying.
    pub payment_method: PaymentMethod,
    /// Opaque instrument token forwarded to the gateway.
    pub method_token: String,
    /// Last four digits of the card, when paying by card.
    pub card_last_four: Option<String>,
    /// Card brand, when paying by card.
    pub card_brand: Option<String>,
    /// Amount placed on hold at authorization.
    pub authorized_amount: Money,
    /// Sum of all captures so far.
    pub captured_total: Money,
    /// Sum of all refunds so far.
    pub refunded_total: Money,
    /// Reference the gateway returned for the authorization hold.
    pub gateway_reference: Option<String>,
    /// Reason the gateway declined, for failed authorizations.
    pub decline_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// When the most recent capture settled.
    pub captured_at: Option<DateTime<Utc>>,
    /// When the most recent refund settled.
    pub refunded_at: Option<DateTime<Utc>>,
    /// When the authorization was voided.
    pub voided_at: Option<DateTime<Utc>>,
    /// Optimistic concurrency version.
    pub version: i64,
}

impl Payment {
    /// Creates a payment for a successful authorization.
    #[allow(clippy::too_many_arguments)]
    pub fn authorized(
        id: PaymentId,
        order_id: String,
        customer_id: String,
        payment_method: PaymentMethod,
        method_token: String,
        card_last_four: Option<String>,
        card_brand: Option<String>,
        amount: Money,
        gateway_reference: String,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            order_id,
            customer_id,
            payment_method,
            method_token,
            card_last_four,
            card_brand,
            authorized_amount: amount,
            captured_total: Money::zero(amount.currency()),
            refunded_total: Money::zero(amount.currency()),
            gateway_reference: Some(gateway_reference),
            decline_reason: None,
            created_at: now,
            updated_at: now,
            captured_at: None,
            refunded_at: None,
            voided_at: None,
            version: 1,
        }
    }

    /// Creates the permanent record of a declined authorization.
    #[allow(clippy::too_many_arguments)]
    pub fn declined(
        id: PaymentId,
        order_id: String,
        customer_id: String,
        payment_method: PaymentMethod,
        method_token: String,
        card_last_four: Option<String>,
        card_brand: Option<String>,
        amount: Money,
        decline_reason: String,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            order_id,
            customer_id,
            payment_method,
            method_token,
            card_last_four,
            card_brand,
            authorized_amount: amount,
            captured_total: Money::zero(amount.currency()),
            refunded_total: Money::zero(amount.currency()),
            gateway_reference: None,
            decline_reason: Some(decline_reason),
            created_at: now,
            updated_at: now,
            captured_at: None,
            refunded_at: None,
            voided_at: None,
            version: 1,
        }
    }

    /// Derives the lifecycle status from the recorded facts.
    pub fn status(&self) -> PaymentStatus {
        if self.decline_reason.is_some() {
            return PaymentStatus::Failed;
        }
        if self.voided_at.is_some() {
            return PaymentStatus::Voided;
        }
        if !self.refunded_total.is_zero() {
            if self.refunded_total == self.captured_total {
                return PaymentStatus::Refunded;
            }
            return PaymentStatus::PartiallyRefunded;
        }
        if self.captured_total.is_zero() {
            PaymentStatus::Authorized
        } else if self.captured_total == self.authorized_amount {
            PaymentStatus::Captured
        } else {
            PaymentStatus::PartiallyCaptured
        }
    }

    /// Authorization still available to capture.
    pub fn remaining_authorized(&self) -> Result<Money, DomainError> {
        self.authorized_amount.checked_sub(self.captured_total)
    }

    /// Captured funds still available to refund.
    pub fn remaining_captured(&self) -> Result<Money, DomainError> {
        self.captured_total.checked_sub(self.refunded_total)
    }

    /// Checks that a capture of `amount` is allowed right now.
    pub fn ensure_can_capture(&self, amount: &Money) -> Result<(), DomainError> {
        match self.status() {
            PaymentStatus::Authorized | PaymentStatus::PartiallyCaptured => {}
            status => {
                return Err(DomainError::InvalidStateTransition {
                    from: status,
                    operation: "capture",
                });
            }
        }
        let new_total = self.captured_total.checked_add(*amount)?;
        if !self.authorized_amount.gte(&new_total) {
            return Err(DomainError::CaptureExceedsAuthorization {
                authorized: self.authorized_amount.amount(),
                already_captured: self.captured_total.amount(),
                requested: amount.amount(),
            });
        }
        Ok(())
    }

    /// Checks that a refund of `amount` is allowed right now.
    ///
    /// Fully refunded payments pass the state gate so that one refund too
    /// many reports the balance problem, not a state problem.
    pub fn ensure_can_refund(&self, amount: &Money) -> Result<(), DomainError> {
        match self.status() {
            PaymentStatus::PartiallyCaptured
            | PaymentStatus::Captured
            | PaymentStatus::PartiallyRefunded
            | PaymentStatus::Refunded => {}
            status => {
                return Err(DomainError::InvalidStateTransition {
                    from: status,
                    operation: "refund",
                });
            }
        }
        let new_total = self.refunded_total.checked_add(*amount)?;
        if !self.captured_total.gte(&new_total) {
            return Err(DomainError::RefundExceedsCaptured {
                captured: self.captured_total.amount(),
                already_refunded: self.refunded_total.amount(),
                requested: amount.amount(),
            });
        }
        Ok(())
    }

    /// Checks that the authorization can still be voided.
    pub fn ensure_can_void(&self) -> Result<(), DomainError> {
        match self.status() {
            PaymentStatus::Authorized => Ok(()),
            status => Err(DomainError::InvalidStateTransition {
                from: status,
                operation: "void",
            }),
        }
    }

    /// Applies a capture to the aggregate.
    pub fn record_capture(&mut self, capture: &Capture) -> Result<(), DomainError> {
        self.ensure_can_capture(&capture.amount)?;
        self.captured_total = self.captured_total.checked_add(capture.amount)?;
        self.captured_at = Some(capture.created_at);
        self.touch();
        Ok(())
    }

    /// Applies a refund to the aggregate.
    pub fn record_refund(&mut self, refund: &Refund) -> Result<(), DomainError> {
        self.ensure_can_refund(&refund.amount)?;
        self.refunded_total = self.refunded_total.checked_add(refund.amount)?;
        self.refunded_at = Some(refund.created_at);
        self.touch();
        Ok(())
    }

    /// Voids the authorization.
    pub fn record_void(&mut self, at: DateTime<Utc>) -> Result<(), DomainError> {
        self.ensure_can_void()?;
        self.voided_at = Some(at);
        self.touch();
        Ok(())
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
        self.version += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::money::Currency;
    use rust_decimal_macros::dec;

    fn usd(amount: rust_decimal::Decimal) -> Money {
        Money::new(amount, Currency::USD).unwrap()
    }

    fn authorized_payment(amount: rust_decimal::Decimal) -> Payment {
        Payment::authorized(
            PaymentId::new(),
            "ORD-1001".into(),
            "CUST-2002".into(),
            PaymentMethod::CreditCard,
            "tok_visa".into(),
            Some("4242".into()),
            Some("visa".into()),
            usd(amount),
            "AUTHREF1".into(),
        )
    }

    #[test]
    fn test_new_authorization_is_authorized() {
        let payment = authorized_payment(dec!(100.00));
        assert_eq!(payment.status(), PaymentStatus::Authorized);
        assert_eq!(payment.version, 1);
    }

    #[test]
    fn test_declined_record_is_failed() {
        let payment = Payment::declined(
            PaymentId::new(),
            "ORD-1001".into(),
            "CUST-2002".into(),
            PaymentMethod::CreditCard,
            "tok_decline".into(),
            Some("0002".into()),
            Some("visa".into()),
            usd(dec!(50.00)),
            "Card declined by issuer".into(),
        );
        assert_eq!(payment.status(), PaymentStatus::Failed);
        assert!(payment.gateway_reference.is_none());
    }

    #[test]
    fn test_partial_then_full_capture() {
        let mut payment = authorized_payment(dec!(100.00));

        let first = Capture::new(payment.id.clone(), usd(dec!(40.00)), "CAPREF1".into());
        payment.record_capture(&first).unwrap();
        assert_eq!(payment.status(), PaymentStatus::PartiallyCaptured);
        assert_eq!(payment.version, 2);

        let second = Capture::new(payment.id.clone(), usd(dec!(60.00)), "CAPREF2".into());
        payment.record_capture(&second).unwrap();
        assert_eq!(payment.status(), PaymentStatus::Captured);
        assert_eq!(payment.captured_total.amount(), dec!(100.00));
    }

    #[test]
    fn test_capture_exceeding_authorization_fails() {
        let mut payment = authorized_payment(dec!(100.00));
        let capture = Capture::new(payment.id.clone(), usd(dec!(100.01)), "CAPREF1".into());
        let result = payment.record_capture(&capture);
        assert!(matches!(
            result,
            Err(DomainError::CaptureExceedsAuthorization { .. })
        ));
        assert_eq!(payment.status(), PaymentStatus::Authorized);
        assert_eq!(payment.version, 1);
    }

    #[test]
    fn test_capture_after_void_fails() {
        let mut payment = authorized_payment(dec!(100.00));
        payment.record_void(Utc::now()).unwrap();
        let capture = Capture::new(payment.id.clone(), usd(dec!(10.00)), "CAPREF1".into());
        let result = payment.record_capture(&capture);
        assert!(matches!(
            result,
            Err(DomainError::InvalidStateTransition {
                from: PaymentStatus::Voided,
                ..
            })
        ));
    }

    #[test]
    fn test_void_after_capture_fails() {
        let mut payment = authorized_payment(dec!(100.00));
        let capture = Capture::new(payment.id.clone(), usd(dec!(10.00)), "CAPREF1".into());
        payment.record_capture(&capture).unwrap();
        assert!(matches!(
            payment.record_void(Utc::now()),
            Err(DomainError::InvalidStateTransition { .. })
        ));
    }

    #[test]
    fn test_refund_before_capture_fails() {
        let mut payment = authorized_payment(dec!(100.00));
        let refund = Refund::new(
            payment.id.clone(),
            usd(dec!(10.00)),
            "AUTHREF1".into(),
            "customer_request".into(),
        );
        assert!(matches!(
            payment.record_refund(&refund),
            Err(DomainError::InvalidStateTransition {
                from: PaymentStatus::Authorized,
                ..
            })
        ));
    }

    #[test]
    fn test_partial_then_full_refund() {
        let mut payment = authorized_payment(dec!(100.00));
        let capture = Capture::new(payment.id.clone(), usd(dec!(80.00)), "CAPREF1".into());
        payment.record_capture(&capture).unwrap();

        let first = Refund::new(
            payment.id.clone(),
            usd(dec!(30.00)),
            "AUTHREF1".into(),
            "customer_request".into(),
        );
        payment.record_refund(&first).unwrap();
        assert_eq!(payment.status(), PaymentStatus::PartiallyRefunded);

        let second = Refund::new(
            payment.id.clone(),
            usd(dec!(50.00)),
            "AUTHREF1".into(),
            "customer_request".into(),
        );
        payment.record_refund(&second).unwrap();
        assert_eq!(payment.status(), PaymentStatus::Refunded);
    }

    #[test]
    fn test_refund_exceeding_captured_fails() {
        let mut payment = authorized_payment(dec!(100.00));
        let capture = Capture::new(payment.id.clone(), usd(dec!(50.00)), "CAPREF1".into());
        payment.record_capture(&capture).unwrap();

        let refund = Refund::new(
            payment.id.clone(),
            usd(dec!(50.01)),
            "AUTHREF1".into(),
            "customer_request".into(),
        );
        assert!(matches!(
            payment.record_refund(&refund),
            Err(DomainError::RefundExceedsCaptured { .. })
        ));
    }

    #[test]
    fn test_refund_after_full_refund_reports_balance_not_state() {
        let mut payment = authorized_payment(dec!(100.00));
        let capture = Capture::new(payment.id.clone(), usd(dec!(100.00)), "CAPREF1".into());
        payment.record_capture(&capture).unwrap();
        let full = Refund::new(
            payment.id.clone(),
            usd(dec!(100.00)),
            "AUTHREF1".into(),
            "customer_request".into(),
        );
        payment.record_refund(&full).unwrap();
        assert_eq!(payment.status(), PaymentStatus::Refunded);

        let extra = Refund::new(
            payment.id.clone(),
            usd(dec!(1.00)),
            "AUTHREF1".into(),
            "customer_request".into(),
        );
        assert!(matches!(
            payment.record_refund(&extra),
            Err(DomainError::RefundExceedsCaptured { .. })
        ));
    }

    #[test]
    fn test_version_increments_on_each_mutation() {
        let mut payment = authorized_payment(dec!(100.00));
        let capture = Capture::new(payment.id.clone(), usd(dec!(20.00)), "CAPREF1".into());
        payment.record_capture(&capture).unwrap();
        let refund = Refund::new(
            payment.id.clone(),
            usd(dec!(20.00)),
            "AUTHREF1".into(),
            "customer_request".into(),
        );
        payment.record_refund(&refund).unwrap();
        assert_eq!(payment.version, 3);
    }
}
