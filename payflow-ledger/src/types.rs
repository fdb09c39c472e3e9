//! Database row types for the SQLite ledger.
//!
//! SQLite stores amounts as decimal strings and timestamps as RFC 3339
//! strings; these rows own the string-to-domain parsing.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::FromRow;
use std::str::FromStr;

use payflow_core::domain::ParseIdError;
use payflow_core::{
    Capture, Currency, IdempotencyRecord, LedgerError, Money, Payment, Refund, StoredOutcome,
};

pub(crate) fn parse_currency(s: &str) -> Result<Currency, LedgerError> {
    match s {
        "USD" => Ok(Currency::USD),
        "EUR" => Ok(Currency::EUR),
        "GBP" => Ok(Currency::GBP),
        "INR" => Ok(Currency::INR),
        other => Err(LedgerError::Database(format!("Unknown currency: {other}"))),
    }
}

pub(crate) fn parse_decimal(s: &str) -> Result<Decimal, LedgerError> {
    Decimal::from_str(s).map_err(|e| LedgerError::Database(format!("Invalid amount {s:?}: {e}")))
}

pub(crate) fn parse_money(amount: &str, currency: &str) -> Result<Money, LedgerError> {
    Money::new(parse_decimal(amount)?, parse_currency(currency)?).map_err(LedgerError::Domain)
}

pub(crate) fn parse_datetime(s: &str) -> Result<DateTime<Utc>, LedgerError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| LedgerError::Database(format!("Invalid timestamp {s:?}: {e}")))
}

fn parse_opt_datetime(s: Option<&str>) -> Result<Option<DateTime<Utc>>, LedgerError> {
    s.map(parse_datetime).transpose()
}

fn parse_id<T>(s: &str) -> Result<T, LedgerError>
where
    T: FromStr<Err = ParseIdError>,
{
    s.parse()
        .map_err(|e: ParseIdError| LedgerError::Database(e.to_string()))
}

/// Payment aggregate row.
#[derive(Debug, FromRow)]
pub struct DbPayment {
    pub id: String,
    pub order_id: String,
    pub customer_id: String,
    pub payment_method: String,
    pub method_token: String,
    pub card_last_four: Option<String>,
    pub card_brand: Option<String>,
    pub authorized_amount: String,
    pub captured_total: String,
    pub refunded_total: String,
    pub currency: String,
    pub gateway_reference: Option<String>,
    pub decline_reason: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub captured_at: Option<String>,
    pub refunded_at: Option<String>,
    pub voided_at: Option<String>,
    pub version: i64,
}

impl DbPayment {
    pub fn into_domain(self) -> Result<Payment, LedgerError> {
        Ok(Payment {
            id: parse_id(&self.id)?,
            order_id: self.order_id,
            customer_id: self.customer_id,
            payment_method: self.payment_method.parse().map_err(LedgerError::Domain)?,
            method_token: self.method_token,
            card_last_four: self.card_last_four,
            card_brand: self.card_brand,
            authorized_amount: parse_money(&self.authorized_amount, &self.currency)?,
            captured_total: parse_money(&self.captured_total, &self.currency)?,
            refunded_total: parse_money(&self.refunded_total, &self.currency)?,
            gateway_reference: self.gateway_reference,
            decline_reason: self.decline_reason,
            created_at: parse_datetime(&self.created_at)?,
            updated_at: parse_datetime(&self.updated_at)?,
            captured_at: parse_opt_datetime(self.captured_at.as_deref())?,
            refunded_at: parse_opt_datetime(self.refunded_at.as_deref())?,
            voided_at: parse_opt_datetime(self.voided_at.as_deref())?,
            version: self.version,
        })
    }
}

/// Capture row.
#[derive(Debug, FromRow)]
pub struct DbCapture {
    pub id: String,
    pub payment_id: String,
    pub amount: String,
    pub currency: String,
    pub gateway_reference: String,
    pub created_at: String,
}

impl DbCapture {
    pub fn into_domain(self) -> Result<Capture, LedgerError> {
        Ok(Capture {
            id: parse_id(&self.id)?,
            payment_id: parse_id(&self.payment_id)?,
            amount: parse_money(&self.amount, &self.currency)?,
            gateway_reference: self.gateway_reference,
            created_at: parse_datetime(&self.created_at)?,
        })
    }
}

/// Refund row.
#[derive(Debug, FromRow)]
pub struct DbRefund {
    pub id: String,
    pub payment_id: String,
    pub amount: String,
    pub currency: String,
    pub gateway_reference: String,
    pub reason: String,
    pub created_at: String,
}

impl DbRefund {
    pub fn into_domain(self) -> Result<Refund, LedgerError> {
        Ok(Refund {
            id: parse_id(&self.id)?,
            payment_id: parse_id(&self.payment_id)?,
            amount: parse_money(&self.amount, &self.currency)?,
            gateway_reference: self.gateway_reference,
            reason: self.reason,
            created_at: parse_datetime(&self.created_at)?,
        })
    }
}

/// Idempotency record row; `outcome` is serialized JSON.
#[derive(Debug, FromRow)]
pub struct DbIdempotencyRecord {
    pub key: String,
    pub fingerprint: String,
    pub outcome: String,
    pub created_at: String,
}

impl DbIdempotencyRecord {
    pub fn into_domain(self) -> Result<IdempotencyRecord, LedgerError> {
        let outcome: StoredOutcome = serde_json::from_str(&self.outcome)
            .map_err(|e| LedgerError::Database(format!("Invalid stored outcome: {e}")))?;
        Ok(IdempotencyRecord {
            key: self.key,
            fingerprint: self.fingerprint,
            outcome,
            created_at: parse_datetime(&self.created_at)?,
        })
    }
}

/// Version-only row for conflict diagnostics.
#[derive(Debug, FromRow)]
pub struct DbVersion {
    pub version: i64,
}
