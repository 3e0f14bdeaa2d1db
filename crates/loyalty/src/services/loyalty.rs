//! Loyalty service: applies order events, enrollments and redemptions to
//! customer accounts and serves the read models.
//!
//! Every mutation follows the same cycle: take the customer lock, load the
//! account, apply the change in memory, commit against the loaded version.
//! A version conflict (another process wrote the account in between) reloads
//! and retries with exponential backoff plus jitter.

use std::sync::Arc;
use std::time::Duration;

use backon::{BackoffBuilder, ExponentialBuilder};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use evolv_core::{
    AmountError, CustomerId, EventKey, FinancialStatus, HistoryEntry, HistoryKind, LedgerError,
    LoyaltyAccount, LoyaltySummary, OrderEvent, OrderEventType, OrderId, ProgramStats, TierChange,
};

use super::locks::CustomerLocks;
use crate::db::RepositoryError;
use crate::store::{LedgerCommit, LoyaltyStore, StoreError};

/// Default number of history entries returned by [`LoyaltyService::history`].
pub const DEFAULT_HISTORY_LIMIT: usize = 50;

/// Upper bound on the number of history entries returned at once.
pub const MAX_HISTORY_LIMIT: usize = 500;

/// Tunables for the loyalty service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoyaltySettings {
    /// The one order event type that awards points.
    pub award_event: OrderEventType,
    /// Commit attempts before giving up on a contended account.
    pub max_attempts: u32,
    /// Base delay of the exponential backoff between attempts.
    pub retry_base: Duration,
}

impl LoyaltySettings {
    /// Backoff between commit attempts: one delay per retry after the first
    /// attempt, doubling from `retry_base` with jitter.
    #[must_use]
    pub fn retry_backoff(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(self.retry_base)
            .with_max_delay(self.retry_base.saturating_mul(64))
            .with_max_times(usize::try_from(self.max_attempts.saturating_sub(1)).unwrap_or(usize::MAX))
            .with_jitter()
    }
}

impl Default for LoyaltySettings {
    fn default() -> Self {
        Self {
            award_event: OrderEventType::Paid,
            max_attempts: 5,
            retry_base: Duration::from_millis(25),
        }
    }
}

/// Errors returned by [`LoyaltyService`].
#[derive(Debug, Error)]
pub enum LoyaltyError {
    #[error("no loyalty account for customer {0}")]
    AccountNotFound(CustomerId),

    /// The award event arrived for an order that is not paid.
    #[error("order {order_id} is not payable (financial status {status})")]
    OrderNotPayable {
        order_id: OrderId,
        status: FinancialStatus,
    },

    #[error("account for customer {customer_id} is contended; gave up after {attempts} attempts")]
    ConcurrentUpdateConflict {
        customer_id: CustomerId,
        attempts: u32,
    },

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("invalid order total: {0}")]
    InvalidAmount(#[from] AmountError),

    #[error(transparent)]
    Store(#[from] RepositoryError),
}

/// Result of handling one order event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TriggerOutcome {
    /// Points were credited for the order.
    Awarded {
        points_earned: u64,
        evolv_points_earned: u64,
        tier_change: Option<TierChange>,
        summary: LoyaltySummary,
    },
    /// The event was recorded as processed without awarding points.
    Recorded { summary: LoyaltySummary },
    /// The event was already processed; nothing changed.
    Duplicate { key: EventKey },
}

/// Filter for [`LoyaltyService::history`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct HistoryQuery {
    pub kind: Option<HistoryKind>,
    /// Return the most recent `limit` entries. Defaults to
    /// [`DEFAULT_HISTORY_LIMIT`], capped at [`MAX_HISTORY_LIMIT`].
    pub limit: Option<usize>,
}

impl HistoryQuery {
    fn effective_limit(self) -> usize {
        self.limit
            .unwrap_or(DEFAULT_HISTORY_LIMIT)
            .min(MAX_HISTORY_LIMIT)
    }
}

/// What to do when the account being mutated does not exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OnMissing {
    Create,
    Fail,
}

/// Outcome of one [`LoyaltyService::mutate`] run.
enum Mutation<T> {
    Committed { value: T, account: LoyaltyAccount },
    AlreadyProcessed(EventKey),
}

/// Loyalty program operations over a [`LoyaltyStore`].
#[derive(Clone)]
pub struct LoyaltyService {
    store: Arc<dyn LoyaltyStore>,
    settings: LoyaltySettings,
    locks: CustomerLocks,
}

impl LoyaltyService {
    #[must_use]
    pub fn new(store: Arc<dyn LoyaltyStore>, settings: LoyaltySettings) -> Self {
        Self {
            store,
            settings,
            locks: CustomerLocks::new(),
        }
    }

    #[must_use]
    pub const fn settings(&self) -> &LoyaltySettings {
        &self.settings
    }

    /// Apply an order lifecycle event.
    ///
    /// Only the configured award event credits points, and only for a paid
    /// order. Any other event type is recorded as processed against the
    /// customer's account, which is created if needed. Each
    /// `(order_id, event_type)` pair takes effect at most once.
    ///
    /// # Errors
    ///
    /// - [`LoyaltyError::InvalidAmount`] for a negative or oversized total
    /// - [`LoyaltyError::OrderNotPayable`] for an award event on an unpaid order
    /// - [`LoyaltyError::ConcurrentUpdateConflict`] when retries are exhausted
    /// - [`LoyaltyError::Store`] on storage failure
    #[instrument(
        skip(self, event),
        fields(
            order_id = %event.order_id,
            customer_id = %event.customer_id,
            event_type = %event.event_type,
        )
    )]
    pub async fn handle_order_event(
        &self,
        event: OrderEvent,
    ) -> Result<TriggerOutcome, LoyaltyError> {
        let amount = event.amount()?;
        let key = event.key();

        if self.is_processed(key).await? {
            debug!("Order event already processed");
            return Ok(TriggerOutcome::Duplicate { key });
        }

        let awards = event.event_type == self.settings.award_event;
        if awards && !event.financial_status.is_payable() {
            return Err(LoyaltyError::OrderNotPayable {
                order_id: event.order_id,
                status: event.financial_status,
            });
        }

        let order_id = event.order_id;
        let mutation = self
            .mutate(event.customer_id, Some(key), OnMissing::Create, |account, now| {
                if !awards {
                    return Ok(None);
                }
                let earning = account.earning_for(amount);
                let tier_change = account.apply_earning(
                    earning,
                    Some(order_id),
                    format!("Order #{order_id}"),
                    now,
                );
                Ok(Some((earning, tier_change)))
            })
            .await?;

        let (awarded, account) = match mutation {
            Mutation::Committed { value, account } => (value, account),
            Mutation::AlreadyProcessed(key) => {
                debug!("Order event processed concurrently");
                return Ok(TriggerOutcome::Duplicate { key });
            }
        };

        let summary = LoyaltySummary::from_account(&account);
        let Some((earning, tier_change)) = awarded else {
            debug!("Order event recorded without award");
            return Ok(TriggerOutcome::Recorded { summary });
        };

        info!(
            points = earning.points,
            evolv_points = earning.evolv_points,
            tier = %account.tier,
            "Loyalty points awarded"
        );
        if let Some(change) = tier_change {
            info!(from = %change.from, to = %change.to, "Customer promoted");
        }

        Ok(TriggerOutcome::Awarded {
            points_earned: earning.points,
            evolv_points_earned: earning.evolv_points,
            tier_change,
            summary,
        })
    }

    /// Create the customer's account if it does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails or the account stays contended.
    #[instrument(skip(self), fields(customer_id = %customer_id))]
    pub async fn enroll(&self, customer_id: CustomerId) -> Result<LoyaltySummary, LoyaltyError> {
        let mutation = self
            .mutate(customer_id, None, OnMissing::Create, |_, _| Ok(()))
            .await?;

        match mutation {
            Mutation::Committed { account, .. } => Ok(LoyaltySummary::from_account(&account)),
            // No event key is committed, so this arm is never taken
            Mutation::AlreadyProcessed(_) => self.summary(customer_id).await,
        }
    }

    /// Spend points from the customer's balance.
    ///
    /// # Errors
    ///
    /// Returns [`LoyaltyError::AccountNotFound`] for an unknown customer and
    /// [`LoyaltyError::Ledger`] when the redemption is zero or exceeds the
    /// balance.
    #[instrument(skip(self, description), fields(customer_id = %customer_id))]
    pub async fn redeem(
        &self,
        customer_id: CustomerId,
        points: u64,
        description: String,
    ) -> Result<LoyaltySummary, LoyaltyError> {
        let mutation = self
            .mutate(customer_id, None, OnMissing::Fail, |account, now| {
                account.redeem(points, description.clone(), now)?;
                Ok(())
            })
            .await?;

        match mutation {
            Mutation::Committed { account, .. } => {
                info!(points, balance = account.points, "Loyalty points redeemed");
                Ok(LoyaltySummary::from_account(&account))
            }
            Mutation::AlreadyProcessed(_) => self.summary(customer_id).await,
        }
    }

    /// The customer's dashboard view.
    ///
    /// # Errors
    ///
    /// Returns [`LoyaltyError::AccountNotFound`] for an unknown customer.
    pub async fn summary(&self, customer_id: CustomerId) -> Result<LoyaltySummary, LoyaltyError> {
        let account = self.load_existing(customer_id).await?;
        Ok(LoyaltySummary::from_account(&account))
    }

    /// The customer's most recent history entries, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`LoyaltyError::AccountNotFound`] for an unknown customer.
    pub async fn history(
        &self,
        customer_id: CustomerId,
        query: HistoryQuery,
    ) -> Result<Vec<HistoryEntry>, LoyaltyError> {
        let account = self.load_existing(customer_id).await?;
        let mut entries: Vec<HistoryEntry> = account
            .history
            .into_iter()
            .filter(|entry| query.kind.is_none_or(|kind| entry.kind == kind))
            .collect();

        let skip = entries.len().saturating_sub(query.effective_limit());
        entries.drain(..skip);
        Ok(entries)
    }

    /// Program-wide aggregates.
    ///
    /// # Errors
    ///
    /// Returns [`LoyaltyError::Store`] on storage failure.
    pub async fn stats(&self) -> Result<ProgramStats, LoyaltyError> {
        self.store.stats().await.map_err(store_failure)
    }

    /// Check that the store is reachable.
    ///
    /// # Errors
    ///
    /// Returns [`LoyaltyError::Store`] if it is not.
    pub async fn ping(&self) -> Result<(), LoyaltyError> {
        self.store.ping().await.map_err(store_failure)
    }

    async fn is_processed(&self, key: EventKey) -> Result<bool, LoyaltyError> {
        self.store.is_processed(key).await.map_err(store_failure)
    }

    async fn load_existing(&self, customer_id: CustomerId) -> Result<LoyaltyAccount, LoyaltyError> {
        self.store
            .load(customer_id)
            .await
            .map_err(store_failure)?
            .map(|stored| stored.account)
            .ok_or(LoyaltyError::AccountNotFound(customer_id))
    }

    /// Load, change and commit one account, retrying on version conflicts.
    ///
    /// A commit is skipped when the account already exists, `apply` appended
    /// no history and there is no event key to record.
    async fn mutate<T, F>(
        &self,
        customer_id: CustomerId,
        event: Option<EventKey>,
        on_missing: OnMissing,
        mut apply: F,
    ) -> Result<Mutation<T>, LoyaltyError>
    where
        T: Send,
        F: FnMut(&mut LoyaltyAccount, DateTime<Utc>) -> Result<T, LoyaltyError> + Send,
    {
        let _guard = self.locks.acquire(customer_id).await;
        let mut delays = self.settings.retry_backoff().build();
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            let now = Utc::now();
            let (mut account, expected_version) =
                match self.store.load(customer_id).await.map_err(store_failure)? {
                    Some(stored) => (stored.account, stored.version),
                    None if on_missing == OnMissing::Create => {
                        (LoyaltyAccount::new(customer_id, now), 0)
                    }
                    None => return Err(LoyaltyError::AccountNotFound(customer_id)),
                };

            let history_start = account.history.len();
            let value = apply(&mut account, now)?;
            let commit = LedgerCommit {
                account,
                expected_version,
                history_start,
                event,
            };

            if expected_version != 0 && event.is_none() && commit.new_entries().is_empty() {
                return Ok(Mutation::Committed {
                    value,
                    account: commit.account,
                });
            }

            let account = commit.account.clone();
            match self.store.commit(commit).await {
                Ok(version) => {
                    debug!(version, attempt, "Account committed");
                    return Ok(Mutation::Committed { value, account });
                }
                Err(StoreError::DuplicateEvent(key)) => {
                    return Ok(Mutation::AlreadyProcessed(key));
                }
                Err(StoreError::VersionConflict { expected, .. }) => match delays.next() {
                    Some(delay) => {
                        warn!(
                            attempt,
                            expected_version = expected,
                            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                            "Version conflict, retrying"
                        );
                        tokio::time::sleep(delay).await;
                    }
                    None => {
                        warn!(attempts = attempt, "Giving up on contended account");
                        return Err(LoyaltyError::ConcurrentUpdateConflict {
                            customer_id,
                            attempts: attempt,
                        });
                    }
                },
                Err(StoreError::Repository(e)) => return Err(LoyaltyError::Store(e)),
            }
        }
    }
}

/// Store errors outside the commit path are plain failures.
fn store_failure(err: StoreError) -> LoyaltyError {
    match err {
        StoreError::Repository(e) => LoyaltyError::Store(e),
        other => LoyaltyError::Store(RepositoryError::DataCorruption(other.to_string())),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;
    use crate::store::MemoryLoyaltyStore;
    use evolv_core::Tier;

    fn service_with(store: Arc<MemoryLoyaltyStore>) -> LoyaltyService {
        LoyaltyService::new(
            store,
            LoyaltySettings {
                retry_base: Duration::from_millis(1),
                ..LoyaltySettings::default()
            },
        )
    }

    fn paid(order_id: i32, customer_id: i32, total: i64) -> OrderEvent {
        OrderEvent {
            order_id: OrderId::new(order_id),
            customer_id: CustomerId::new(customer_id),
            order_total: Decimal::new(total, 0),
            event_type: OrderEventType::Paid,
            financial_status: FinancialStatus::Paid,
        }
    }

    #[test]
    fn test_backoff_grows_and_stays_bounded() {
        let settings = LoyaltySettings {
            max_attempts: 4,
            retry_base: Duration::from_millis(10),
            ..LoyaltySettings::default()
        };
        let delays: Vec<Duration> = settings.retry_backoff().build().collect();

        // One delay per retry, none after the last attempt
        assert_eq!(delays.len(), 3);
        for (delay, nominal) in delays.iter().zip([10_u64, 20, 40]) {
            let nominal = Duration::from_millis(nominal);
            assert!(*delay >= nominal && *delay < nominal * 2, "{delay:?}");
        }
    }

    #[test]
    fn test_single_attempt_has_no_retries() {
        let settings = LoyaltySettings {
            max_attempts: 1,
            ..LoyaltySettings::default()
        };
        assert_eq!(settings.retry_backoff().build().count(), 0);
    }

    #[test]
    fn test_history_limit_defaults_and_caps() {
        assert_eq!(HistoryQuery::default().effective_limit(), DEFAULT_HISTORY_LIMIT);
        let query = HistoryQuery {
            kind: None,
            limit: Some(10_000),
        };
        assert_eq!(query.effective_limit(), MAX_HISTORY_LIMIT);
    }

    #[tokio::test]
    async fn test_paid_event_awards_and_creates_account() {
        let store = Arc::new(MemoryLoyaltyStore::new());
        let service = service_with(Arc::clone(&store));

        let outcome = service.handle_order_event(paid(1, 9, 1000)).await.unwrap();

        match outcome {
            TriggerOutcome::Awarded {
                points_earned,
                evolv_points_earned,
                tier_change,
                summary,
            } => {
                assert_eq!(points_earned, 100);
                assert_eq!(evolv_points_earned, 100);
                assert_eq!(tier_change, None);
                assert_eq!(summary.points, 100);
                assert_eq!(summary.tier, Tier::Bronze);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(store.commit_count(), 1);
    }

    #[tokio::test]
    async fn test_non_award_event_is_recorded() {
        let store = Arc::new(MemoryLoyaltyStore::new());
        let service = service_with(Arc::clone(&store));
        let mut event = paid(2, 9, 1000);
        event.event_type = OrderEventType::Placed;
        event.financial_status = FinancialStatus::Pending;

        let outcome = service.handle_order_event(event.clone()).await.unwrap();
        assert!(matches!(outcome, TriggerOutcome::Recorded { ref summary } if summary.points == 0));

        let again = service.handle_order_event(event).await.unwrap();
        assert!(matches!(again, TriggerOutcome::Duplicate { .. }));
        assert_eq!(store.commit_count(), 1);
    }

    #[tokio::test]
    async fn test_unpaid_award_event_is_not_marked_processed() {
        let store = Arc::new(MemoryLoyaltyStore::new());
        let service = service_with(Arc::clone(&store));
        let mut event = paid(3, 9, 2000);
        event.financial_status = FinancialStatus::Authorized;

        let err = service.handle_order_event(event.clone()).await.unwrap_err();
        assert!(matches!(err, LoyaltyError::OrderNotPayable { .. }));
        assert_eq!(store.commit_count(), 0);

        event.financial_status = FinancialStatus::Paid;
        let outcome = service.handle_order_event(event).await.unwrap();
        assert!(matches!(outcome, TriggerOutcome::Awarded { points_earned: 200, .. }));
    }

    #[tokio::test]
    async fn test_negative_total_is_rejected() {
        let service = service_with(Arc::new(MemoryLoyaltyStore::new()));
        let err = service
            .handle_order_event(paid(4, 9, -1))
            .await
            .unwrap_err();
        assert!(matches!(err, LoyaltyError::InvalidAmount(_)));
    }

    #[tokio::test]
    async fn test_enroll_is_idempotent() {
        let store = Arc::new(MemoryLoyaltyStore::new());
        let service = service_with(Arc::clone(&store));

        let first = service.enroll(CustomerId::new(5)).await.unwrap();
        let second = service.enroll(CustomerId::new(5)).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(store.commit_count(), 1);
    }

    #[tokio::test]
    async fn test_redeem_unknown_customer() {
        let service = service_with(Arc::new(MemoryLoyaltyStore::new()));
        let err = service
            .redeem(CustomerId::new(404), 10, "Gift card".to_owned())
            .await
            .unwrap_err();
        assert!(matches!(err, LoyaltyError::AccountNotFound(id) if id == CustomerId::new(404)));
    }

    #[tokio::test]
    async fn test_history_filters_and_limits() {
        let service = service_with(Arc::new(MemoryLoyaltyStore::new()));
        for order_id in 1..=3 {
            service
                .handle_order_event(paid(order_id, 1, 1000))
                .await
                .unwrap();
        }
        service
            .redeem(CustomerId::new(1), 50, "Coupon".to_owned())
            .await
            .unwrap();

        let earned = service
            .history(
                CustomerId::new(1),
                HistoryQuery {
                    kind: Some(HistoryKind::Earned),
                    limit: Some(2),
                },
            )
            .await
            .unwrap();
        assert_eq!(earned.len(), 2);
        assert_eq!(earned[0].related_order_id, Some(OrderId::new(2)));
        assert_eq!(earned[1].related_order_id, Some(OrderId::new(3)));

        let all = service
            .history(CustomerId::new(1), HistoryQuery::default())
            .await
            .unwrap();
        assert_eq!(all.len(), 4);
        assert_eq!(all[3].kind, HistoryKind::Redeemed);
    }
}
