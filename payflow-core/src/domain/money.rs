//! Type-safe monetary value with embedded currency.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::DomainError;

/// Currencies supported by the payment lifecycle engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    USD,
    EUR,
    GBP,
    INR,
}

impl Currency {
    /// Returns the number of decimal places for this currency.
    pub fn decimal_places(&self) -> u8 {
        match self {
            Currency::USD | Currency::EUR | Currency::GBP | Currency::INR => 2,
        }
    }

    /// Returns the ISO 4217 code.
    pub fn code(&self) -> &'static str {
        match self {
            Currency::USD => "USD",
            Currency::EUR => "EUR",
            Currency::GBP => "GBP",
            Currency::INR => "INR",
        }
    }

    /// Returns the currency symbol.
    pub fn symbol(&self) -> &'static str {
        match self {
            Currency::USD => "$",
            Currency::EUR => "€",
            Currency::GBP => "£",
            Currency::INR => "₹",
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Type-safe money representation with embedded currency.
///
/// Amount is an exact decimal, never a binary float. Construction rejects
/// negative values and values with more fractional digits than the currency
/// supports, so every `Money` in the system is a representable amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    amount: Decimal,
    currency: Currency,
}

impl Money {
    /// Creates a new Money value.
    pub fn new(amount: Decimal, currency: Currency) -> Result<Self, DomainError> {
        if amount < Decimal::ZERO {
            return Err(DomainError::NegativeAmount);
        }
        if amount.normalize().scale() > u32::from(currency.decimal_places()) {
            return Err(DomainError::ExcessPrecision {
                currency,
                places: currency.decimal_places(),
            });
        }
        Ok(Self { amount, currency })
    }

    /// Creates a zero-value Money for the given currency.
    pub fn zero(currency: Currency) -> Self {
        Self {
            amount: Decimal::ZERO,
            currency,
        }
    }

    /// Returns the decimal amount.
    pub fn amount(&self) -> Decimal {
        self.amount
    }

    /// Returns the currency.
    pub fn currency(&self) -> Currency {
        self.currency
    }

    /// Returns true if the amount is zero.
    pub fn is_zero(&self) -> bool {
        self.amount.is_zero()
    }

    /// Returns true if the amount is strictly greater than zero.
    pub fn is_positive(&self) -> bool {
        self.amount > Decimal::ZERO
    }

    /// Checked addition - returns error if currencies don't match.
    pub fn checked_add(&self, other: Money) -> Result<Money, DomainError> {
        if self.currency != other.currency {
            return Err(DomainError::CurrencyMismatch {
                expected: self.currency,
                got: other.currency,
            });
        }
        Ok(Money {
            amount: self.amount + other.amount,
            currency: self.currency,
        })
    }

    /// Checked subtraction - returns error if currencies don't match or result would be negative.
    pub fn checked_sub(&self, other: Money) -> Result<Money, DomainError> {
        if self.currency != other.currency {
            return Err(DomainError::CurrencyMismatch {
                expected: self.currency,
                got: other.currency,
            });
        }
        if self.amount < other.amount {
            return Err(DomainError::Underflow {
                available: self.amount,
                requested: other.amount,
            });
        }
        Ok(Money {
            amount: self.amount - other.amount,
            currency: self.currency,
        })
    }

    /// Returns true if this Money is greater than or equal to the other.
    pub fn gte(&self, other: &Money) -> bool {
        assert_eq!(
            self.currency, other.currency,
            "Cannot compare Money with different currencies"
        );
        self.amount >= other.amount
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut amount = self.amount;
        amount.rescale(u32::from(self.currency.decimal_places()));
        write!(f, "{}{}", self.currency.symbol(), amount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_money_creation() {
        let money = Money::new(dec!(10.50), Currency::USD).unwrap();
        assert_eq!(money.amount(), dec!(10.50));
        assert_eq!(money.currency(), Currency::USD);
    }

    #[test]
    fn test_negative_money_fails() {
        let result = Money::new(dec!(-1.00), Currency::USD);
        assert!(matches!(result, Err(DomainError::NegativeAmount)));
    }

    #[test]
    fn test_excess_precision_fails() {
        let result = Money::new(dec!(1.005), Currency::USD);
        assert!(matches!(result, Err(DomainError::ExcessPrecision { .. })));
    }

    #[test]
    fn test_trailing_zeros_are_not_excess_precision() {
        let money = Money::new(dec!(1.500), Currency::USD).unwrap();
        assert_eq!(money.amount(), dec!(1.50));
    }

    #[test]
    fn test_money_addition() {
        let a = Money::new(dec!(1.00), Currency::USD).unwrap();
        let b = Money::new(dec!(0.50), Currency::USD).unwrap();
        let sum = a.checked_add(b).unwrap();
        assert_eq!(sum.amount(), dec!(1.50));
    }

    #[test]
    fn test_money_subtraction_underflow() {
        let a = Money::new(dec!(1.00), Currency::USD).unwrap();
        let b = Money::new(dec!(2.00), Currency::USD).unwrap();
        assert!(matches!(a.checked_sub(b), Err(DomainError::Underflow { .. })));
    }

    #[test]
    fn test_currency_mismatch() {
        let usd = Money::new(dec!(1.00), Currency::USD).unwrap();
        let eur = Money::new(dec!(0.50), Currency::EUR).unwrap();
        let result = usd.checked_add(eur);
        assert!(matches!(result, Err(DomainError::CurrencyMismatch { .. })));
    }

    #[test]
    fn test_money_display() {
        let money = Money::new(dec!(10.5), Currency::USD).unwrap();
        assert_eq!(format!("{}", money), "$10.50");
    }
}
