//! Durable idempotency records.
//!
//! A finalized operation stores its outcome under the caller's idempotency
//! key. Replays with the same key and an identical request fingerprint return
//! the stored outcome without touching the gateway; replays with a different
//! fingerprint are rejected as key reuse.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::ids::PaymentId;
use super::payment::Payment;

/// Outcome stored for a finalized idempotent operation.
///
/// `Completed` freezes the post-operation aggregate so a replay renders the
/// exact response the first caller saw, even after later mutations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum StoredOutcome {
    Completed(Payment),
    Declined { payment_id: PaymentId, reason: String },
}

/// A finalized (key, fingerprint, outcome) triple.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdempotencyRecord {
    pub key: String,
    pub fingerprint: String,
    pub outcome: StoredOutcome,
    pub created_at: DateTime<Utc>,
}

impl IdempotencyRecord {
    pub fn new(key: String, fingerprint: String, outcome: StoredOutcome) -> Self {
        Self {
            key,
            fingerprint,
            outcome,
            created_at: Utc::now(),
        }
    }
}

/// Hashes an operation, its target and the significant request fields into a
/// request fingerprint.
///
/// Fields must already be in canonical form (amounts normalized, identifiers
/// verbatim); the same logical request must always produce the same digest.
pub fn request_fingerprint(operation: &str, target: &str, fields: &[&str]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(operation.as_bytes());
    hasher.update(b"|");
    hasher.update(target.as_bytes());
    for field in fields {
        hasher.update(b"|");
        hasher.update(field.as_bytes());
    }
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_is_stable() {
        let a = request_fingerprint("capture", "PAY-1A2B3C4D5E6F", &["10.5", "USD"]);
        let b = request_fingerprint("capture", "PAY-1A2B3C4D5E6F", &["10.5", "USD"]);
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_fingerprint_differs_by_operation() {
        let capture = request_fingerprint("capture", "PAY-1A2B3C4D5E6F", &["10.5", "USD"]);
        let refund = request_fingerprint("refund", "PAY-1A2B3C4D5E6F", &["10.5", "USD"]);
        assert_ne!(capture, refund);
    }

    #[test]
    fn test_fingerprint_differs_by_field() {
        let a = request_fingerprint("capture", "PAY-1A2B3C4D5E6F", &["10.5", "USD"]);
        let b = request_fingerprint("capture", "PAY-1A2B3C4D5E6F", &["10.51", "USD"]);
        assert_ne!(a, b);
    }
}
