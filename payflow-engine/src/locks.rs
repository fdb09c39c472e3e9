//! Per-payment lock registry.
//!
//! Mutations to one payment are serialized through an async mutex so the
//! state-machine check and the ledger commit act on a consistent aggregate.
//! Reads never take the lock.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use payflow_core::PaymentId;

/// Registry handing out one async mutex per payment id.
pub struct PaymentLocks {
    locks: DashMap<PaymentId, Arc<Mutex<()>>>,
}

impl PaymentLocks {
    pub fn new() -> Self {
        Self {
            locks: DashMap::new(),
        }
    }

    /// Acquires the lock for `id`, waiting at most `wait`.
    ///
    /// Returns `None` when the holder did not release the lock in time.
    pub async fn acquire(&self, id: &PaymentId, wait: Duration) -> Option<OwnedMutexGuard<()>> {
        let lock = self.locks.entry(id.clone()).or_default().clone();
        tokio::time::timeout(wait, lock.lock_owned()).await.ok()
    }
}

impl Default for PaymentLocks {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_acquire_released_lock() {
        let locks = PaymentLocks::new();
        let id = PaymentId::new();

        let guard = locks.acquire(&id, Duration::from_millis(50)).await;
        assert!(guard.is_some());
        drop(guard);

        let again = locks.acquire(&id, Duration::from_millis(50)).await;
        assert!(again.is_some());
    }

    #[tokio::test]
    async fn test_acquire_times_out_while_held() {
        let locks = PaymentLocks::new();
        let id = PaymentId::new();

        let _held = locks.acquire(&id, Duration::from_millis(50)).await.unwrap();

        let contender = locks.acquire(&id, Duration::from_millis(20)).await;
        assert!(contender.is_none());
    }

    #[tokio::test]
    async fn test_distinct_payments_do_not_contend() {
        let locks = PaymentLocks::new();

        let _first = locks
            .acquire(&PaymentId::new(), Duration::from_millis(50))
            .await
            .unwrap();
        let second = locks
            .acquire(&PaymentId::new(), Duration::from_millis(50))
            .await;

        assert!(second.is_some());
    }
}
