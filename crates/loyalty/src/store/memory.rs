//! In-memory [`LoyaltyStore`] used by tests and `LOYALTY_STORE=memory`.
//!
//! The `test-utils` feature exposes conflict injection and a commit counter.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use evolv_core::{CustomerId, EventKey, ProgramStats};

use super::{LedgerCommit, LoyaltyStore, StoreError, VersionedAccount};

#[derive(Default)]
struct MemoryState {
    accounts: HashMap<CustomerId, VersionedAccount>,
    processed: HashSet<EventKey>,
}

/// Store that keeps every account in process memory.
///
/// Commits are checked and applied under one write lock, giving the same
/// all-or-nothing behaviour as the `PostgreSQL` transaction.
#[derive(Default)]
pub struct MemoryLoyaltyStore {
    state: RwLock<MemoryState>,
    injected_conflicts: AtomicU32,
    commits: AtomicU32,
}

impl MemoryLoyaltyStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` commits fail with a version conflict.
    #[cfg(any(test, feature = "test-utils"))]
    pub fn inject_conflicts(&self, count: u32) {
        self.injected_conflicts.store(count, Ordering::SeqCst);
    }

    /// Number of successful commits so far.
    #[cfg(any(test, feature = "test-utils"))]
    #[must_use]
    pub fn commit_count(&self) -> u32 {
        self.commits.load(Ordering::SeqCst)
    }

    fn take_injected_conflict(&self) -> bool {
        self.injected_conflicts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl LoyaltyStore for MemoryLoyaltyStore {
    async fn load(&self, customer_id: CustomerId) -> Result<Option<VersionedAccount>, StoreError> {
        Ok(self.state.read().await.accounts.get(&customer_id).cloned())
    }

    async fn is_processed(&self, key: EventKey) -> Result<bool, StoreError> {
        Ok(self.state.read().await.processed.contains(&key))
    }

    async fn commit(&self, commit: LedgerCommit) -> Result<u64, StoreError> {
        let customer_id = commit.account.customer_id;
        if self.take_injected_conflict() {
            return Err(StoreError::VersionConflict {
                customer_id,
                expected: commit.expected_version,
            });
        }

        let mut state = self.state.write().await;
        let stored_version = state.accounts.get(&customer_id).map_or(0, |a| a.version);
        if stored_version != commit.expected_version {
            return Err(StoreError::VersionConflict {
                customer_id,
                expected: commit.expected_version,
            });
        }
        if let Some(key) = commit.event
            && !state.processed.insert(key)
        {
            return Err(StoreError::DuplicateEvent(key));
        }

        let version = commit.next_version();
        state.accounts.insert(
            customer_id,
            VersionedAccount {
                account: commit.account,
                version,
            },
        );
        self.commits.fetch_add(1, Ordering::SeqCst);
        Ok(version)
    }

    async fn stats(&self) -> Result<ProgramStats, StoreError> {
        let state = self.state.read().await;
        Ok(ProgramStats::from_accounts(
            state.accounts.values().map(|v| &v.account),
        ))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
