//! `PostgreSQL` implementation of [`LoyaltyStore`].
//!
//! Commits run in a single transaction: the processed-event key is claimed
//! first (its primary key serializes duplicate deliveries), then the account
//! row is written with a compare-and-set on `version`, then the new history
//! rows are appended.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use tracing::{debug, instrument};

use evolv_core::{
    CustomerId, EventKey, HistoryEntry, HistoryKind, LoyaltyAccount, OrderId, ProgramStats, Tier,
};

use super::{RepositoryError, from_db, to_db};
use crate::store::{LedgerCommit, LoyaltyStore, StoreError, VersionedAccount};

#[derive(Debug, sqlx::FromRow)]
struct AccountRow {
    customer_id: CustomerId,
    points: i64,
    lifetime_points: i64,
    evolv_points: i64,
    tier: Tier,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct HistoryRow {
    occurred_at: DateTime<Utc>,
    kind: HistoryKind,
    points: i64,
    evolv_points: i64,
    related_order_id: Option<OrderId>,
    description: String,
}

#[derive(Debug, sqlx::FromRow)]
struct TierStatsRow {
    tier: Tier,
    members: i64,
    points: i64,
    lifetime_points: i64,
    evolv_points: i64,
}

impl TryFrom<HistoryRow> for HistoryEntry {
    type Error = RepositoryError;

    fn try_from(row: HistoryRow) -> Result<Self, Self::Error> {
        Ok(Self {
            occurred_at: row.occurred_at,
            kind: row.kind,
            points: from_db(row.points, "history.points")?,
            evolv_points: from_db(row.evolv_points, "history.evolv_points")?,
            related_order_id: row.related_order_id,
            description: row.description,
        })
    }
}

/// Loyalty store backed by the `loyalty` schema.
#[derive(Clone)]
pub struct PgLoyaltyStore {
    pool: PgPool,
}

impl PgLoyaltyStore {
    /// Create a store over an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Claim an event key. Returns `false` if another transaction already has.
    async fn claim_event(
        tx: &mut Transaction<'_, Postgres>,
        key: EventKey,
        customer_id: CustomerId,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r"
            INSERT INTO loyalty.processed_event (order_id, event_type, customer_id)
            VALUES ($1, $2, $3)
            ON CONFLICT (order_id, event_type) DO NOTHING
            ",
        )
        .bind(key.order_id)
        .bind(key.event_type)
        .bind(customer_id)
        .execute(&mut **tx)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Write the account row. Returns `false` if the version check failed.
    async fn write_account(
        tx: &mut Transaction<'_, Postgres>,
        commit: &LedgerCommit,
    ) -> Result<bool, StoreError> {
        let account = &commit.account;
        let points = to_db(account.points, "points")?;
        let lifetime_points = to_db(account.lifetime_points, "lifetime_points")?;
        let evolv_points = to_db(account.evolv_points, "evolv_points")?;
        let next_version = to_db(commit.next_version(), "version")?;

        let result = if commit.expected_version == 0 {
            sqlx::query(
                r"
                INSERT INTO loyalty.account
                    (customer_id, points, lifetime_points, evolv_points, tier, version,
                     created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                ON CONFLICT (customer_id) DO NOTHING
                ",
            )
            .bind(account.customer_id)
            .bind(points)
            .bind(lifetime_points)
            .bind(evolv_points)
            .bind(account.tier)
            .bind(next_version)
            .bind(account.created_at)
            .bind(account.updated_at)
            .execute(&mut **tx)
            .await?
        } else {
            sqlx::query(
                r"
                UPDATE loyalty.account
                SET points = $2, lifetime_points = $3, evolv_points = $4, tier = $5,
                    version = $6, updated_at = $7
                WHERE customer_id = $1 AND version = $8
                ",
            )
            .bind(account.customer_id)
            .bind(points)
            .bind(lifetime_points)
            .bind(evolv_points)
            .bind(account.tier)
            .bind(next_version)
            .bind(account.updated_at)
            .bind(to_db(commit.expected_version, "version")?)
            .execute(&mut **tx)
            .await?
        };

        Ok(result.rows_affected() == 1)
    }

    async fn append_history(
        tx: &mut Transaction<'_, Postgres>,
        commit: &LedgerCommit,
    ) -> Result<(), StoreError> {
        for (offset, entry) in commit.new_entries().iter().enumerate() {
            let seq = i32::try_from(commit.history_start + offset).map_err(|_| {
                RepositoryError::DataCorruption("history sequence out of range".to_owned())
            })?;

            sqlx::query(
                r"
                INSERT INTO loyalty.history
                    (customer_id, seq, occurred_at, kind, points, evolv_points,
                     related_order_id, description)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                ",
            )
            .bind(commit.account.customer_id)
            .bind(seq)
            .bind(entry.occurred_at)
            .bind(entry.kind)
            .bind(to_db(entry.points, "history.points")?)
            .bind(to_db(entry.evolv_points, "history.evolv_points")?)
            .bind(entry.related_order_id)
            .bind(&entry.description)
            .execute(&mut **tx)
            .await?;
        }
        Ok(())
    }
}

#[async_trait]
impl LoyaltyStore for PgLoyaltyStore {
    #[instrument(skip(self), fields(customer_id = %customer_id))]
    async fn load(&self, customer_id: CustomerId) -> Result<Option<VersionedAccount>, StoreError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ READ ONLY")
            .execute(&mut *tx)
            .await?;

        let row = sqlx::query_as::<_, AccountRow>(
            r"
            SELECT customer_id, points, lifetime_points, evolv_points, tier, version,
                   created_at, updated_at
            FROM loyalty.account
            WHERE customer_id = $1
            ",
        )
        .bind(customer_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let history_rows = sqlx::query_as::<_, HistoryRow>(
            r"
            SELECT occurred_at, kind, points, evolv_points, related_order_id, description
            FROM loyalty.history
            WHERE customer_id = $1
            ORDER BY seq ASC
            ",
        )
        .bind(customer_id)
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;

        let history = history_rows
            .into_iter()
            .map(HistoryEntry::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        let account = LoyaltyAccount {
            customer_id: row.customer_id,
            points: from_db(row.points, "points")?,
            lifetime_points: from_db(row.lifetime_points, "lifetime_points")?,
            evolv_points: from_db(row.evolv_points, "evolv_points")?,
            tier: row.tier,
            next_tier_threshold: row.tier.next_threshold(),
            history,
            created_at: row.created_at,
            updated_at: row.updated_at,
        };

        account.check_consistency().map_err(|e| {
            RepositoryError::DataCorruption(format!("account {customer_id}: {e}"))
        })?;

        Ok(Some(VersionedAccount {
            account,
            version: from_db(row.version, "version")?,
        }))
    }

    async fn is_processed(&self, key: EventKey) -> Result<bool, StoreError> {
        let exists = sqlx::query_scalar::<_, bool>(
            r"
            SELECT EXISTS (
                SELECT 1 FROM loyalty.processed_event
                WHERE order_id = $1 AND event_type = $2
            )
            ",
        )
        .bind(key.order_id)
        .bind(key.event_type)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    #[instrument(
        skip(self, commit),
        fields(
            customer_id = %commit.account.customer_id,
            expected_version = commit.expected_version,
        )
    )]
    async fn commit(&self, commit: LedgerCommit) -> Result<u64, StoreError> {
        let customer_id = commit.account.customer_id;
        let mut tx = self.pool.begin().await?;

        if let Some(key) = commit.event
            && !Self::claim_event(&mut tx, key, customer_id).await?
        {
            return Err(StoreError::DuplicateEvent(key));
        }

        if !Self::write_account(&mut tx, &commit).await? {
            return Err(StoreError::VersionConflict {
                customer_id,
                expected: commit.expected_version,
            });
        }

        Self::append_history(&mut tx, &commit).await?;
        tx.commit().await?;

        debug!(
            new_entries = commit.new_entries().len(),
            version = commit.next_version(),
            "Loyalty account committed"
        );
        Ok(commit.next_version())
    }

    async fn stats(&self) -> Result<ProgramStats, StoreError> {
        let rows = sqlx::query_as::<_, TierStatsRow>(
            r"
            SELECT tier,
                   COUNT(*)::BIGINT AS members,
                   COALESCE(SUM(points), 0)::BIGINT AS points,
                   COALESCE(SUM(lifetime_points), 0)::BIGINT AS lifetime_points,
                   COALESCE(SUM(evolv_points), 0)::BIGINT AS evolv_points
            FROM loyalty.account
            GROUP BY tier
            ",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut stats = ProgramStats::default();
        for row in rows {
            let members = from_db(row.members, "members")?;
            stats.members += members;
            stats.members_by_tier.add(row.tier, members);
            stats.points_outstanding += from_db(row.points, "points")?;
            stats.lifetime_points_awarded += from_db(row.lifetime_points, "lifetime_points")?;
            stats.evolv_points_awarded += from_db(row.evolv_points, "evolv_points")?;
        }
        Ok(stats)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await?;
        Ok(())
    }
}
