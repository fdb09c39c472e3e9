//! In-process idempotency gate.
//!
//! Tracks which idempotency keys are in flight or finished so that a retry
//! never executes twice. The gate only covers this process; the durable
//! [`payflow_core::IdempotencyRecord`] rides inside ledger commits and covers
//! restarts.

use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Arc;
use tokio::sync::Notify;

use payflow_core::{EngineError, StoredOutcome};

/// What the gate decided for a keyed request.
pub enum Admission {
    /// The key is new here. The caller owns the reservation and must end it
    /// with [`IdempotencyGate::finalize`] or [`IdempotencyGate::abandon`].
    Fresh,
    /// The key already finished with the same fingerprint.
    Replay(StoredOutcome),
}

enum EntryState {
    Pending,
    Done(StoredOutcome),
}

struct GateEntry {
    fingerprint: String,
    state: EntryState,
    notify: Arc<Notify>,
    created_at: DateTime<Utc>,
}

/// Keyed reservation table for in-flight and finished operations.
pub struct IdempotencyGate {
    entries: DashMap<String, GateEntry>,
}

impl IdempotencyGate {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Admits a keyed request.
    ///
    /// - vacant key: reserves it and returns [`Admission::Fresh`];
    /// - finished with the same fingerprint: returns the stored outcome;
    /// - any state with a different fingerprint: `IdempotencyConflict`;
    /// - pending with the same fingerprint: waits up to `pending_wait` for the
    ///   in-flight twin to settle, then re-examines. An abandoned reservation
    ///   is taken over; a wait that runs out is `CouldNotDetermineOutcome`.
    pub async fn begin(
        &self,
        key: &str,
        fingerprint: &str,
        pending_wait: Duration,
    ) -> Result<Admission, EngineError> {
        let deadline = tokio::time::Instant::now() + pending_wait;

        loop {
            let notify = match self.entries.entry(key.to_string()) {
                Entry::Vacant(slot) => {
                    slot.insert(GateEntry {
                        fingerprint: fingerprint.to_string(),
                        state: EntryState::Pending,
                        notify: Arc::new(Notify::new()),
                        created_at: Utc::now(),
                    });
                    return Ok(Admission::Fresh);
                }
                Entry::Occupied(slot) => {
                    let entry = slot.get();
                    if entry.fingerprint != fingerprint {
                        return Err(EngineError::IdempotencyConflict);
                    }
                    match &entry.state {
                        EntryState::Done(outcome) => {
                            return Ok(Admission::Replay(outcome.clone()));
                        }
                        EntryState::Pending => entry.notify.clone(),
                    }
                }
            };

            // Register interest before re-checking the entry, so a finalize
            // or abandon between the check and the await is not missed.
            let notified = notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let still_pending = self
                .entries
                .get(key)
                .is_some_and(|entry| matches!(entry.state, EntryState::Pending));
            if !still_pending {
                continue;
            }

            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return Err(EngineError::CouldNotDetermineOutcome);
            }
        }
    }

    /// Records the outcome for `key` and wakes same-key waiters.
    pub fn finalize(&self, key: &str, outcome: StoredOutcome) {
        if let Some(mut entry) = self.entries.get_mut(key) {
            entry.state = EntryState::Done(outcome);
            entry.notify.notify_waiters();
        }
    }

    /// Releases the reservation for `key` without an outcome.
    ///
    /// Waiters wake up and the next one takes over the key, so a failed
    /// attempt does not wedge retries.
    pub fn abandon(&self, key: &str) {
        if let Some((_, entry)) = self.entries.remove(key) {
            entry.notify.notify_waiters();
        }
    }

    /// Drops finished entries created before `cutoff`. Pending entries stay.
    pub fn purge_finalized(&self, cutoff: DateTime<Utc>) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| {
            matches!(entry.state, EntryState::Pending) || entry.created_at >= cutoff
        });
        before.saturating_sub(self.entries.len())
    }
}

impl Default for IdempotencyGate {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use payflow_core::PaymentId;

    const WAIT: Duration = Duration::from_millis(200);

    fn declined_outcome() -> StoredOutcome {
        StoredOutcome::Declined {
            payment_id: PaymentId::new(),
            reason: "Card declined by issuer".to_string(),
        }
    }

    #[tokio::test]
    async fn test_fresh_key_is_admitted() {
        let gate = IdempotencyGate::new();

        let admission = gate.begin("key-1", "fp-1", WAIT).await.unwrap();

        assert!(matches!(admission, Admission::Fresh));
    }

    #[tokio::test]
    async fn test_finalized_key_replays() {
        let gate = IdempotencyGate::new();
        gate.begin("key-1", "fp-1", WAIT).await.unwrap();
        gate.finalize("key-1", declined_outcome());

        let admission = gate.begin("key-1", "fp-1", WAIT).await.unwrap();

        assert!(matches!(admission, Admission::Replay(_)));
    }

    #[tokio::test]
    async fn test_fingerprint_mismatch_conflicts() {
        let gate = IdempotencyGate::new();
        gate.begin("key-1", "fp-1", WAIT).await.unwrap();

        let result = gate.begin("key-1", "fp-2", WAIT).await;

        assert!(matches!(result, Err(EngineError::IdempotencyConflict)));
    }

    #[tokio::test]
    async fn test_pending_wait_times_out() {
        let gate = IdempotencyGate::new();
        gate.begin("key-1", "fp-1", WAIT).await.unwrap();

        let result = gate.begin("key-1", "fp-1", Duration::from_millis(20)).await;

        assert!(matches!(
            result,
            Err(EngineError::CouldNotDetermineOutcome)
        ));
    }

    #[tokio::test]
    async fn test_waiter_wakes_on_finalize() {
        let gate = Arc::new(IdempotencyGate::new());
        gate.begin("key-1", "fp-1", WAIT).await.unwrap();

        let waiter = {
            let gate = gate.clone();
            tokio::spawn(async move { gate.begin("key-1", "fp-1", Duration::from_secs(5)).await })
        };
        tokio::task::yield_now().await;

        gate.finalize("key-1", declined_outcome());

        let admission = waiter.await.unwrap().unwrap();
        assert!(matches!(admission, Admission::Replay(_)));
    }

    #[tokio::test]
    async fn test_waiter_takes_over_abandoned_key() {
        let gate = Arc::new(IdempotencyGate::new());
        gate.begin("key-1", "fp-1", WAIT).await.unwrap();

        let waiter = {
            let gate = gate.clone();
            tokio::spawn(async move { gate.begin("key-1", "fp-1", Duration::from_secs(5)).await })
        };
        tokio::task::yield_now().await;

        gate.abandon("key-1");

        let admission = waiter.await.unwrap().unwrap();
        assert!(matches!(admission, Admission::Fresh));
    }

    #[tokio::test]
    async fn test_purge_drops_only_finalized_entries() {
        let gate = IdempotencyGate::new();
        gate.begin("done", "fp-1", WAIT).await.unwrap();
        gate.finalize("done", declined_outcome());
        gate.begin("pending", "fp-2", WAIT).await.unwrap();

        let dropped = gate.purge_finalized(Utc::now() + chrono::Duration::hours(1));

        assert_eq!(dropped, 1);
        assert!(matches!(
            gate.begin("done", "fp-1", WAIT).await.unwrap(),
            Admission::Fresh
        ));
    }
}
