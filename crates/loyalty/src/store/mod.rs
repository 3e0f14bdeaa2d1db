//! Storage seam for loyalty accounts.
//!
//! Every write goes through [`LoyaltyStore::commit`], which applies the new
//! account state, its new history entries and the processed event key as one
//! atomic unit, and only if the stored version still matches the version the
//! caller loaded.
//!
//! Implementations:
//! - [`PgLoyaltyStore`](crate::db::PgLoyaltyStore): `PostgreSQL` storage
//! - [`MemoryLoyaltyStore`]: in-process storage for tests and local runs

pub mod memory;

use async_trait::async_trait;
use thiserror::Error;

use evolv_core::{CustomerId, EventKey, LoyaltyAccount, ProgramStats};

use crate::db::RepositoryError;

pub use memory::MemoryLoyaltyStore;

/// An account together with its concurrency token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionedAccount {
    pub account: LoyaltyAccount,
    /// Incremented by every commit. Never zero for a stored account.
    pub version: u64,
}

/// A change to persist.
#[derive(Debug, Clone)]
pub struct LedgerCommit {
    /// The full account state after the change.
    pub account: LoyaltyAccount,
    /// Version the change was computed from; `0` creates the account.
    pub expected_version: u64,
    /// Length of `account.history` when it was loaded. Entries from this
    /// index on are new.
    pub history_start: usize,
    /// Order event to mark as processed in the same transaction.
    pub event: Option<EventKey>,
}

impl LedgerCommit {
    /// The version the account will have once committed.
    #[must_use]
    pub const fn next_version(&self) -> u64 {
        self.expected_version + 1
    }

    /// History entries appended by this change.
    #[must_use]
    pub fn new_entries(&self) -> &[evolv_core::HistoryEntry] {
        self.account
            .history
            .get(self.history_start..)
            .unwrap_or_default()
    }
}

/// Errors returned by a [`LoyaltyStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    /// The account changed since it was loaded.
    #[error("version conflict for customer {customer_id}: expected version {expected}")]
    VersionConflict {
        customer_id: CustomerId,
        expected: u64,
    },

    /// The order event was already applied.
    #[error("event already processed: {0}")]
    DuplicateEvent(EventKey),

    /// Underlying storage failure.
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        Self::Repository(RepositoryError::Database(err))
    }
}

/// Persistence for loyalty accounts.
#[async_trait]
pub trait LoyaltyStore: Send + Sync {
    /// Load an account with its full history.
    async fn load(&self, customer_id: CustomerId) -> Result<Option<VersionedAccount>, StoreError>;

    /// Whether an order event was already applied.
    async fn is_processed(&self, key: EventKey) -> Result<bool, StoreError>;

    /// Atomically persist a change. Returns the new version.
    ///
    /// Fails with [`StoreError::VersionConflict`] if the stored version is not
    /// `commit.expected_version`, and with [`StoreError::DuplicateEvent`] if
    /// `commit.event` was already processed. Nothing is written on failure.
    async fn commit(&self, commit: LedgerCommit) -> Result<u64, StoreError>;

    /// Program-wide aggregates.
    async fn stats(&self) -> Result<ProgramStats, StoreError>;

    /// Check that the store is reachable.
    async fn ping(&self) -> Result<(), StoreError>;
}
