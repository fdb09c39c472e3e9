//! Prefixed identifiers for payments and their associated entries.
//!
//! Identifiers are the short form `PAY-1A2B3C4D5E6F`: a fixed prefix plus the
//! first twelve hex digits of a v4 UUID, uppercased. They are generated by the
//! engine, never supplied by callers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Number of hex digits following the prefix.
const SUFFIX_LEN: usize = 12;

/// Error returned when an identifier fails to parse.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid {kind} id: {value}")]
pub struct ParseIdError {
    kind: &'static str,
    value: String,
}

impl ParseIdError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

macro_rules! string_id {
    ($name:ident, $prefix:literal, $label:literal, $doc:literal) => {
        #[doc = $doc]
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
        #[serde(transparent)]
        #[schema(value_type = String)]
        pub struct $name(String);

        impl $name {
            /// Generates a new random identifier.
            pub fn new() -> Self {
                let hex = Uuid::new_v4().simple().to_string();
                Self(format!(
                    concat!($prefix, "-{}"),
                    hex[..SUFFIX_LEN].to_uppercase()
                ))
            }

            /// Returns the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl FromStr for $name {
            type Err = ParseIdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let suffix = s
                    .strip_prefix(concat!($prefix, "-"))
                    .ok_or_else(|| ParseIdError::new($label, s))?;
                let well_formed = suffix.len() == SUFFIX_LEN
                    && suffix
                        .chars()
                        .all(|c| c.is_ascii_digit() || (c.is_ascii_uppercase() && c.is_ascii_hexdigit()));
                if !well_formed {
                    return Err(ParseIdError::new($label, s));
                }
                Ok(Self(s.to_string()))
            }
        }
    };
}

string_id!(PaymentId, "PAY", "payment", "Identifier of a payment aggregate.");
string_id!(CaptureId, "CAP", "capture", "Identifier of a single capture against a payment.");
string_id!(RefundId, "REF", "refund", "Identifier of a single refund against a payment.");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_id_has_expected_shape() {
        let id = PaymentId::new();
        assert!(id.as_str().starts_with("PAY-"));
        assert_eq!(id.as_str().len(), 4 + SUFFIX_LEN);
    }

    #[test]
    fn test_generated_id_round_trips() {
        let id = CaptureId::new();
        let parsed: CaptureId = id.as_str().parse().unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn test_parse_rejects_wrong_prefix() {
        assert!("CAP-1A2B3C4D5E6F".parse::<PaymentId>().is_err());
    }

    #[test]
    fn test_parse_rejects_lowercase_hex() {
        assert!("PAY-1a2b3c4d5e6f".parse::<PaymentId>().is_err());
    }

    #[test]
    fn test_parse_rejects_short_suffix() {
        assert!("REF-1A2B".parse::<RefundId>().is_err());
    }
}
