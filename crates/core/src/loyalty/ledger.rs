//! The loyalty ledger: one account per customer with an append-only history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::points::Earning;
use super::tier::{NextThreshold, Tier, evaluate_tier};
use crate::types::{CustomerId, OrderAmount, OrderId};

/// Kind of a history entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "loyalty.history_kind", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum HistoryKind {
    Earned,
    Redeemed,
    TierUpgrade,
    /// Reserved. No rule produces downgrades.
    TierDowngrade,
}

impl std::fmt::Display for HistoryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Earned => write!(f, "earned"),
            Self::Redeemed => write!(f, "redeemed"),
            Self::TierUpgrade => write!(f, "tier_upgrade"),
            Self::TierDowngrade => write!(f, "tier_downgrade"),
        }
    }
}

impl std::str::FromStr for HistoryKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "earned" => Ok(Self::Earned),
            "redeemed" => Ok(Self::Redeemed),
            "tier_upgrade" => Ok(Self::TierUpgrade),
            "tier_downgrade" => Ok(Self::TierDowngrade),
            _ => Err(format!("invalid history kind: {s}")),
        }
    }
}

/// One point-affecting event in an account's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub occurred_at: DateTime<Utc>,
    pub kind: HistoryKind,
    /// Tier points added (earned) or removed (redeemed). Zero for tier changes.
    pub points: u64,
    /// Evolv points added. Zero except for earnings.
    pub evolv_points: u64,
    pub related_order_id: Option<OrderId>,
    pub description: String,
}

/// A tier promotion produced by an earning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierChange {
    pub from: Tier,
    pub to: Tier,
}

/// Errors from ledger mutations.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// Redemptions must remove at least one point.
    #[error("redemption must be at least one point")]
    ZeroRedemption,
    /// The balance does not cover the redemption.
    #[error("insufficient points: requested {requested}, available {available}")]
    InsufficientPoints { requested: u64, available: u64 },
}

/// Mismatch between an account's balances and its history.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ConsistencyError {
    #[error("lifetime points {recorded} do not match earned history total {from_history}")]
    Lifetime { recorded: u64, from_history: u64 },
    #[error("points {recorded} do not match earned minus redeemed history total {from_history}")]
    Balance { recorded: u64, from_history: u64 },
    #[error("evolv points {recorded} do not match history total {from_history}")]
    Evolv { recorded: u64, from_history: u64 },
    #[error("tier {tier} is below the tier earned by {points} points")]
    TierBehind { tier: Tier, points: u64 },
}

/// Sums over an account's history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct HistoryTotals {
    pub earned: u64,
    pub redeemed: u64,
    pub evolv_earned: u64,
}

/// A customer's loyalty account.
///
/// `tier` and `next_tier_threshold` are cached results of the tier evaluator,
/// refreshed by every earning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoyaltyAccount {
    pub customer_id: CustomerId,
    pub points: u64,
    pub lifetime_points: u64,
    pub evolv_points: u64,
    pub tier: Tier,
    pub next_tier_threshold: NextThreshold,
    pub history: Vec<HistoryEntry>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LoyaltyAccount {
    /// A fresh bronze account with zero balances.
    #[must_use]
    pub fn new(customer_id: CustomerId, now: DateTime<Utc>) -> Self {
        Self {
            customer_id,
            points: 0,
            lifetime_points: 0,
            evolv_points: 0,
            tier: Tier::Bronze,
            next_tier_threshold: Tier::Bronze.next_threshold(),
            history: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// What an order of `amount` earns at the account's current tier.
    #[must_use]
    pub fn earning_for(&self, amount: OrderAmount) -> Earning {
        Earning::for_order(self.tier, amount)
    }

    /// Credit an earning.
    ///
    /// Appends exactly one `Earned` entry, even for a zero earning, then
    /// re-evaluates the tier. A promotion appends exactly one `TierUpgrade`
    /// entry and is returned.
    pub fn apply_earning(
        &mut self,
        earning: Earning,
        related_order_id: Option<OrderId>,
        description: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Option<TierChange> {
        self.points = self.points.saturating_add(earning.points);
        self.lifetime_points = self.lifetime_points.saturating_add(earning.points);
        self.evolv_points = self.evolv_points.saturating_add(earning.evolv_points);
        self.history.push(HistoryEntry {
            occurred_at: now,
            kind: HistoryKind::Earned,
            points: earning.points,
            evolv_points: earning.evolv_points,
            related_order_id,
            description: description.into(),
        });
        self.updated_at = now;

        let evaluation = evaluate_tier(self.tier, self.points);
        self.next_tier_threshold = evaluation.next_threshold;
        if evaluation.tier == self.tier {
            return None;
        }

        let change = TierChange {
            from: self.tier,
            to: evaluation.tier,
        };
        self.tier = evaluation.tier;
        self.history.push(HistoryEntry {
            occurred_at: now,
            kind: HistoryKind::TierUpgrade,
            points: 0,
            evolv_points: 0,
            related_order_id,
            description: format!("Upgraded from {} to {}", change.from, change.to),
        });
        Some(change)
    }

    /// Spend points from the balance.
    ///
    /// Lifetime points and the tier are unaffected.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::ZeroRedemption`] for `points == 0` and
    /// [`LedgerError::InsufficientPoints`] when the balance is too small.
    pub fn redeem(
        &mut self,
        points: u64,
        description: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<(), LedgerError> {
        if points == 0 {
            return Err(LedgerError::ZeroRedemption);
        }
        if points > self.points {
            return Err(LedgerError::InsufficientPoints {
                requested: points,
                available: self.points,
            });
        }

        self.points -= points;
        self.history.push(HistoryEntry {
            occurred_at: now,
            kind: HistoryKind::Redeemed,
            points,
            evolv_points: 0,
            related_order_id: None,
            description: description.into(),
        });
        self.updated_at = now;
        Ok(())
    }

    /// Sum the history by kind.
    #[must_use]
    pub fn history_totals(&self) -> HistoryTotals {
        self.history
            .iter()
            .fold(HistoryTotals::default(), |mut totals, entry| {
                match entry.kind {
                    HistoryKind::Earned => {
                        totals.earned = totals.earned.saturating_add(entry.points);
                        totals.evolv_earned =
                            totals.evolv_earned.saturating_add(entry.evolv_points);
                    }
                    HistoryKind::Redeemed => {
                        totals.redeemed = totals.redeemed.saturating_add(entry.points);
                    }
                    HistoryKind::TierUpgrade | HistoryKind::TierDowngrade => {}
                }
                totals
            })
    }

    /// Verify balances against the history and the cached tier against the
    /// tier evaluator.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConsistencyError`] found.
    pub fn check_consistency(&self) -> Result<(), ConsistencyError> {
        let totals = self.history_totals();
        if totals.earned != self.lifetime_points {
            return Err(ConsistencyError::Lifetime {
                recorded: self.lifetime_points,
                from_history: totals.earned,
            });
        }
        let balance = totals.earned.saturating_sub(totals.redeemed);
        if balance != self.points {
            return Err(ConsistencyError::Balance {
                recorded: self.points,
                from_history: balance,
            });
        }
        if totals.evolv_earned != self.evolv_points {
            return Err(ConsistencyError::Evolv {
                recorded: self.evolv_points,
                from_history: totals.evolv_earned,
            });
        }
        if evaluate_tier(self.tier, self.points).tier != self.tier {
            return Err(ConsistencyError::TierBehind {
                tier: self.tier,
                points: self.points,
            });
        }
        Ok(())
    }
}
