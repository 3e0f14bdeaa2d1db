use std::collections::HashMap;
use std::sync::{Arc, Mutex as SyncMutex, PoisonError};

use tokio::sync::{Mutex, OwnedMutexGuard};

use evolv_core::CustomerId;

type LockMap = HashMap<CustomerId, Arc<Mutex<()>>>;

/// Customer-level locks so that mutations of one account within this process
/// queue instead of racing on the account version.
///
/// An entry lives only while some task holds or waits on it; the last guard
/// to drop removes it. The map itself is behind a synchronous mutex that is
/// never held across an await.
#[derive(Clone, Default)]
pub struct CustomerLocks {
    locks: Arc<SyncMutex<LockMap>>,
}

/// Holds a customer's lock until dropped.
pub struct CustomerLockGuard {
    customer_id: CustomerId,
    guard: Option<OwnedMutexGuard<()>>,
    locks: Arc<SyncMutex<LockMap>>,
}

impl CustomerLocks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquires the customer's lock, creating it on first use.
    pub async fn acquire(&self, customer_id: CustomerId) -> CustomerLockGuard {
        let lock = self.lock_for(customer_id);
        let guard = lock.lock_owned().await;
        CustomerLockGuard {
            customer_id,
            guard: Some(guard),
            locks: Arc::clone(&self.locks),
        }
    }

    /// Number of customers with a live lock.
    #[must_use]
    pub fn len(&self) -> usize {
        self.map().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock_for(&self, customer_id: CustomerId) -> Arc<Mutex<()>> {
        Arc::clone(
            self.map()
                .entry(customer_id)
                .or_insert_with(|| Arc::new(Mutex::new(()))),
        )
    }

    fn map(&self) -> std::sync::MutexGuard<'_, LockMap> {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for CustomerLockGuard {
    fn drop(&mut self) {
        // Release the customer lock before inspecting the map
        drop(self.guard.take());

        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        if locks
            .get(&self.customer_id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(&self.customer_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_same_customer_shares_lock() {
        let locks = CustomerLocks::new();
        let a = locks.lock_for(CustomerId::new(1));
        let b = locks.lock_for(CustomerId::new(1));
        let other = locks.lock_for(CustomerId::new(2));

        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &other));
    }

    #[tokio::test]
    async fn test_acquire_blocks_second_holder() {
        let locks = CustomerLocks::new();
        let guard = locks.acquire(CustomerId::new(7)).await;

        let blocked =
            tokio::time::timeout(Duration::from_millis(20), locks.acquire(CustomerId::new(7)))
                .await;
        assert!(blocked.is_err());

        // A different customer is unaffected
        let other =
            tokio::time::timeout(Duration::from_millis(20), locks.acquire(CustomerId::new(8)))
                .await;
        assert!(other.is_ok());

        drop(guard);
        let released =
            tokio::time::timeout(Duration::from_millis(20), locks.acquire(CustomerId::new(7)))
                .await;
        assert!(released.is_ok());
    }

    #[tokio::test]
    async fn test_released_locks_are_removed() {
        let locks = CustomerLocks::new();

        for id in 0..10_000 {
            let guard = locks.acquire(CustomerId::new(id)).await;
            assert_eq!(locks.len(), 1);
            drop(guard);
        }

        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn test_waiter_keeps_entry_alive() {
        let locks = CustomerLocks::new();
        let guard = locks.acquire(CustomerId::new(3)).await;

        let waiter = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _guard = locks.acquire(CustomerId::new(3)).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;

        drop(guard);
        assert_eq!(locks.len(), 1);

        waiter.await.unwrap_or_default();
        assert!(locks.is_empty());
    }
}
