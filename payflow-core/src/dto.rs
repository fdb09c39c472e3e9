//! Data Transfer Objects (DTOs) for requests and responses.

use chrono::{DateTime, Datelike, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::{Currency, Payment, PaymentId, PaymentMethod, PaymentStatus};
use crate::error::DomainError;

/// Default page size for payment listings.
pub const DEFAULT_LIST_LIMIT: usize = 50;

// ─────────────────────────────────────────────────────────────────────────────
// Authorize DTOs
// ─────────────────────────────────────────────────────────────────────────────

/// Card details accompanying card-based payment methods.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CardDetails {
    /// Tokenized card, as issued by the vault
    #[schema(example = "tok_visa_4242")]
    pub card_token: String,
    /// Last four digits of the card number
    #[schema(example = "4242")]
    pub last_four: String,
    /// Card brand
    #[schema(example = "visa")]
    pub brand: String,
    /// Expiration month (1-12)
    #[schema(example = 12)]
    pub exp_month: u32,
    /// Expiration year
    #[schema(example = 2028)]
    pub exp_year: i32,
}

impl CardDetails {
    /// Validates the card details against the given current time.
    pub fn validate(&self, now: DateTime<Utc>) -> Result<(), DomainError> {
        if self.card_token.trim().is_empty() {
            return Err(DomainError::ValidationError("Card token is required".into()));
        }
        if self.last_four.len() != 4 || !self.last_four.chars().all(|c| c.is_ascii_digit()) {
            return Err(DomainError::ValidationError(
                "Card last four must be exactly 4 digits".into(),
            ));
        }
        if self.brand.trim().is_empty() {
            return Err(DomainError::ValidationError("Card brand is required".into()));
        }
        if !(1..=12).contains(&self.exp_month) {
            return Err(DomainError::ValidationError(
                "Card expiration month must be between 1 and 12".into(),
            ));
        }
        if (self.exp_year, self.exp_month) < (now.year(), now.month()) {
            return Err(DomainError::ValidationError("Card is expired".into()));
        }
        Ok(())
    }
}

/// Request to authorize a new payment.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuthorizeRequest {
    /// Merchant order the payment belongs to
    #[schema(example = "ORD-1001")]
    pub order_id: String,
    /// Customer making the payment
    #[schema(example = "CUST-2002")]
    pub customer_id: String,
    /// Amount to place on hold
    #[schema(example = "100.50")]
    pub amount: Decimal,
    #[serde(default = "default_currency")]
    pub currency: Currency,
    pub payment_method: PaymentMethod,
    /// Required for card payment methods
    #[serde(skip_serializing_if = "Option::is_none")]
    pub card_details: Option<CardDetails>,
    /// Idempotency key protecting this authorization
    #[schema(example = "order-1001-auth")]
    pub idempotency_key: String,
}

fn default_currency() -> Currency {
    Currency::USD
}

// ─────────────────────────────────────────────────────────────────────────────
// Capture / Refund / Void DTOs
// ─────────────────────────────────────────────────────────────────────────────

/// Request to capture part or all of an authorization.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CaptureRequest {
    /// Amount to capture
    #[schema(example = "40.00")]
    pub amount: Decimal,
    /// Must match the payment currency when present
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<Currency>,
    /// Idempotency key protecting this capture
    #[schema(example = "order-1001-cap-1")]
    pub idempotency_key: String,
}

/// Request to refund captured funds.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RefundRequest {
    /// Amount to refund; omit to refund the full captured balance
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(example = "25.00")]
    pub amount: Option<Decimal>,
    /// Must match the payment currency when present
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<Currency>,
    /// Reason recorded with the refund
    #[serde(default = "default_refund_reason")]
    #[schema(example = "customer_request")]
    pub reason: String,
    /// Idempotency key protecting this refund
    #[schema(example = "order-1001-ref-1")]
    pub idempotency_key: String,
}

fn default_refund_reason() -> String {
    "customer_request".into()
}

/// Request to void an authorization. The body is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct VoidRequest {
    /// Optional idempotency key protecting this void
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Views
// ─────────────────────────────────────────────────────────────────────────────

/// External representation of a payment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PaymentView {
    pub id: PaymentId,
    pub status: PaymentStatus,
    #[schema(example = "ORD-1001")]
    pub order_id: String,
    #[schema(example = "CUST-2002")]
    pub customer_id: String,
    pub payment_method: PaymentMethod,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub card_last_four: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub card_brand: Option<String>,
    /// Amount placed on hold at authorization
    #[schema(example = "100.50")]
    pub authorized_amount: Decimal,
    /// Sum of all captures
    pub captured_total: Decimal,
    /// Sum of all refunds
    pub refunded_total: Decimal,
    pub currency: Currency,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway_reference: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decline_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Payment> for PaymentView {
    fn from(payment: &Payment) -> Self {
        Self {
            id: payment.id.clone(),
            status: payment.status(),
            order_id: payment.order_id.clone(),
            customer_id: payment.customer_id.clone(),
            payment_method: payment.payment_method,
            card_last_four: payment.card_last_four.clone(),
            card_brand: payment.card_brand.clone(),
            authorized_amount: payment.authorized_amount.amount(),
            captured_total: payment.captured_total.amount(),
            refunded_total: payment.refunded_total.amount(),
            currency: payment.authorized_amount.currency(),
            gateway_reference: payment.gateway_reference.clone(),
            decline_reason: payment.decline_reason.clone(),
            created_at: payment.created_at,
            updated_at: payment.updated_at,
        }
    }
}

/// Receipt for a payment that has settled funds.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Receipt {
    /// Receipt identifier, derived from the payment id
    #[schema(example = "RCP-PAY-1A2B3C4D5E6F")]
    pub receipt_id: String,
    pub payment_id: PaymentId,
    #[schema(example = "ORD-1001")]
    pub order_id: String,
    /// Total captured on this payment
    #[schema(example = "100.50")]
    pub amount: Decimal,
    pub currency: Currency,
    pub status: PaymentStatus,
    pub payment_method: PaymentMethod,
    /// Masked card number, when paying by card
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(example = "****4242")]
    pub card_last_four: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway_reference: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub captured_at: Option<DateTime<Utc>>,
    /// Present once something has been refunded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refunded_total: Option<Decimal>,
}

impl From<&Payment> for Receipt {
    fn from(payment: &Payment) -> Self {
        Self {
            receipt_id: format!("RCP-{}", payment.id),
            payment_id: payment.id.clone(),
            order_id: payment.order_id.clone(),
            amount: payment.captured_total.amount(),
            currency: payment.captured_total.currency(),
            status: payment.status(),
            payment_method: payment.payment_method,
            card_last_four: payment
                .card_last_four
                .as_ref()
                .map(|last_four| format!("****{last_four}")),
            gateway_reference: payment.gateway_reference.clone(),
            captured_at: payment.captured_at,
            refunded_total: if payment.refunded_total.is_zero() {
                None
            } else {
                Some(payment.refunded_total.amount())
            },
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Listing
// ─────────────────────────────────────────────────────────────────────────────

/// Filter for listing payments.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PaymentFilter {
    pub order_id: Option<String>,
    pub customer_id: Option<String>,
    pub status: Option<PaymentStatus>,
    pub limit: Option<u32>,
}

impl PaymentFilter {
    /// Page size to apply, defaulting to [`DEFAULT_LIST_LIMIT`].
    pub fn effective_limit(&self) -> usize {
        self.limit
            .map(|limit| limit as usize)
            .unwrap_or(DEFAULT_LIST_LIMIT)
    }

    /// Returns true if the payment passes every set field.
    pub fn matches(&self, payment: &Payment) -> bool {
        if let Some(order_id) = &self.order_id {
            if &payment.order_id != order_id {
                return false;
            }
        }
        if let Some(customer_id) = &self.customer_id {
            if &payment.customer_id != customer_id {
                return false;
            }
        }
        if let Some(status) = self.status {
            if payment.status() != status {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Money;
    use rust_decimal_macros::dec;

    fn card() -> CardDetails {
        CardDetails {
            card_token: "tok_visa_4242".into(),
            last_four: "4242".into(),
            brand: "visa".into(),
            exp_month: 12,
            exp_year: 2030,
        }
    }

    #[test]
    fn test_valid_card_passes() {
        assert!(card().validate(Utc::now()).is_ok());
    }

    #[test]
    fn test_expired_card_fails() {
        let mut details = card();
        details.exp_year = 2020;
        assert!(matches!(
            details.validate(Utc::now()),
            Err(DomainError::ValidationError(_))
        ));
    }

    #[test]
    fn test_card_expiring_this_month_passes() {
        let now = Utc::now();
        let mut details = card();
        details.exp_month = now.month();
        details.exp_year = now.year();
        assert!(details.validate(now).is_ok());
    }

    #[test]
    fn test_bad_last_four_fails() {
        let mut details = card();
        details.last_four = "42".into();
        assert!(details.validate(Utc::now()).is_err());
        details.last_four = "42ab".into();
        assert!(details.validate(Utc::now()).is_err());
    }

    #[test]
    fn test_view_reflects_derived_status() {
        let mut payment = Payment::authorized(
            PaymentId::new(),
            "ORD-1001".into(),
            "CUST-2002".into(),
            PaymentMethod::CreditCard,
            "tok_visa".into(),
            Some("4242".into()),
            Some("visa".into()),
            Money::new(dec!(100.00), Currency::USD).unwrap(),
            "AUTHREF1".into(),
        );
        let capture = crate::domain::Capture::new(
            payment.id.clone(),
            Money::new(dec!(40.00), Currency::USD).unwrap(),
            "CAPREF1".into(),
        );
        payment.record_capture(&capture).unwrap();

        let view = PaymentView::from(&payment);
        assert_eq!(view.status, PaymentStatus::PartiallyCaptured);
        assert_eq!(view.captured_total, dec!(40.00));
        assert_eq!(view.currency, Currency::USD);
    }

    #[test]
    fn test_receipt_masks_card_and_totals_captures() {
        let mut payment = Payment::authorized(
            PaymentId::new(),
            "ORD-1001".into(),
            "CUST-2002".into(),
            PaymentMethod::CreditCard,
            "tok_visa".into(),
            Some("4242".into()),
            Some("visa".into()),
            Money::new(dec!(100.00), Currency::USD).unwrap(),
            "AUTHREF1".into(),
        );
        let capture = crate::domain::Capture::new(
            payment.id.clone(),
            Money::new(dec!(100.00), Currency::USD).unwrap(),
            "CAPREF1".into(),
        );
        payment.record_capture(&capture).unwrap();

        let receipt = Receipt::from(&payment);
        assert_eq!(receipt.receipt_id, format!("RCP-{}", payment.id));
        assert_eq!(receipt.card_last_four.as_deref(), Some("****4242"));
        assert_eq!(receipt.amount, dec!(100.00));
        assert!(receipt.refunded_total.is_none());
    }

    #[test]
    fn test_filter_matches_on_all_set_fields() {
        let payment = Payment::authorized(
            PaymentId::new(),
            "ORD-1001".into(),
            "CUST-2002".into(),
            PaymentMethod::DigitalWallet,
            "WALLET".into(),
            None,
            None,
            Money::new(dec!(10.00), Currency::USD).unwrap(),
            "AUTHREF1".into(),
        );
        let mut filter = PaymentFilter::default();
        assert!(filter.matches(&payment));
        filter.order_id = Some("ORD-1001".into());
        filter.status = Some(PaymentStatus::Authorized);
        assert!(filter.matches(&payment));
        filter.customer_id = Some("CUST-9999".into());
        assert!(!filter.matches(&payment));
    }
}
