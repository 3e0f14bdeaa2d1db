//! Read views derived from account state on demand.

use serde::{Deserialize, Serialize};

use super::ledger::{HistoryEntry, LoyaltyAccount};
use super::tier::{NextThreshold, Tier};
use crate::types::CustomerId;

/// Percentage of the way to the next tier, in `0..=100`.
///
/// Gold always reports 100. Any other tier is capped at 99, so 100 means
/// gold even for an account whose cached tier lags its points.
#[must_use]
pub fn progress_to_next_tier(account: &LoyaltyAccount) -> u8 {
    if account.tier == Tier::Gold {
        return 100;
    }
    match account.next_tier_threshold {
        NextThreshold::Points(threshold) if threshold > 0 => {
            let percent = u128::from(account.points) * 100 / u128::from(threshold);
            u8::try_from(percent.min(99)).unwrap_or(99)
        }
        NextThreshold::Points(_) | NextThreshold::Unbounded => 99,
    }
}

/// Points still missing before the next tier, `None` at gold.
#[must_use]
pub fn points_to_next_tier(account: &LoyaltyAccount) -> Option<u64> {
    if account.tier == Tier::Gold {
        return None;
    }
    account
        .next_tier_threshold
        .points()
        .map(|threshold| threshold.saturating_sub(account.points))
}

/// What a customer sees about their loyalty standing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoyaltySummary {
    pub customer_id: CustomerId,
    pub points: u64,
    pub lifetime_points: u64,
    pub evolv_points: u64,
    pub tier: Tier,
    pub next_tier_threshold: NextThreshold,
    pub progress_percent: u8,
    pub points_to_next_tier: Option<u64>,
    pub history: Vec<HistoryEntry>,
}

impl LoyaltySummary {
    /// Project an account into its summary.
    #[must_use]
    pub fn from_account(account: &LoyaltyAccount) -> Self {
        Self {
            customer_id: account.customer_id,
            points: account.points,
            lifetime_points: account.lifetime_points,
            evolv_points: account.evolv_points,
            tier: account.tier,
            next_tier_threshold: account.next_tier_threshold,
            progress_percent: progress_to_next_tier(account),
            points_to_next_tier: points_to_next_tier(account),
            history: account.history.clone(),
        }
    }
}

/// Description of one tier for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierBenefits {
    pub tier: Tier,
    pub qualifying_points: u64,
    pub next_threshold: NextThreshold,
    pub earn_rule: String,
    pub evolv_rate_percent: String,
}

/// The benefits table for every tier, lowest first.
#[must_use]
pub fn program_benefits() -> Vec<TierBenefits> {
    Tier::ALL
        .iter()
        .map(|&tier| TierBenefits {
            tier,
            qualifying_points: tier.qualifying_points(),
            next_threshold: tier.next_threshold(),
            earn_rule: tier.earn_rule().to_string(),
            evolv_rate_percent: (tier.evolv_rate() * rust_decimal::Decimal::ONE_HUNDRED)
                .normalize()
                .to_string(),
        })
        .collect()
}

/// Number of members per tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TierCounts {
    pub bronze: u64,
    pub silver: u64,
    pub gold: u64,
}

impl TierCounts {
    /// Count one more member at `tier`.
    pub const fn add(&mut self, tier: Tier, count: u64) {
        match tier {
            Tier::Bronze => self.bronze += count,
            Tier::Silver => self.silver += count,
            Tier::Gold => self.gold += count,
        }
    }
}

/// Program-wide aggregates for the admin dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProgramStats {
    pub members: u64,
    pub members_by_tier: TierCounts,
    /// Redeemable points currently held by all members.
    pub points_outstanding: u64,
    pub lifetime_points_awarded: u64,
    pub evolv_points_awarded: u64,
}

impl ProgramStats {
    /// Aggregate over a set of accounts.
    pub fn from_accounts<'a>(accounts: impl IntoIterator<Item = &'a LoyaltyAccount>) -> Self {
        accounts.into_iter().fold(Self::default(), |mut stats, account| {
            stats.members += 1;
            stats.members_by_tier.add(account.tier, 1);
            stats.points_outstanding = stats.points_outstanding.saturating_add(account.points);
            stats.lifetime_points_awarded = stats
                .lifetime_points_awarded
                .saturating_add(account.lifetime_points);
            stats.evolv_points_awarded = stats
                .evolv_points_awarded
                .saturating_add(account.evolv_points);
            stats
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use chrono::{TimeZone, Utc};
    use proptest::prelude::*;

    use super::*;
    use crate::loyalty::points::Earning;

    fn account_with(points: u64) -> LoyaltyAccount {
        let now = Utc.with_ymd_and_hms(2026, 1, 15, 9, 30, 0).unwrap();
        let mut account = LoyaltyAccount::new(CustomerId::new(3), now);
        if points > 0 {
            account.apply_earning(
                Earning {
                    points,
                    evolv_points: 0,
                },
                None,
                "Credit",
                now,
            );
        }
        account
    }

    #[test]
    fn test_progress_bronze() {
        assert_eq!(progress_to_next_tier(&account_with(0)), 0);
        assert_eq!(progress_to_next_tier(&account_with(2_500)), 50);
        assert_eq!(progress_to_next_tier(&account_with(4_999)), 99);
    }

    #[test]
    fn test_progress_silver_measures_against_gold_threshold() {
        let account = account_with(7_500);
        assert_eq!(account.tier, Tier::Silver);
        assert_eq!(progress_to_next_tier(&account), 75);
        assert_eq!(points_to_next_tier(&account), Some(2_500));
    }

    #[test]
    fn test_progress_gold_is_complete() {
        let account = account_with(10_000);
        assert_eq!(progress_to_next_tier(&account), 100);
        assert_eq!(points_to_next_tier(&account), None);
    }

    #[test]
    fn test_lagging_tier_never_reports_complete() {
        let mut account = account_with(0);
        account.points = 20_000;
        assert_eq!(progress_to_next_tier(&account), 99);
    }

    #[test]
    fn test_summary_from_account() {
        let account = account_with(1_200);
        let summary = LoyaltySummary::from_account(&account);
        assert_eq!(summary.customer_id, CustomerId::new(3));
        assert_eq!(summary.points, 1_200);
        assert_eq!(summary.tier, Tier::Bronze);
        assert_eq!(summary.progress_percent, 24);
        assert_eq!(summary.points_to_next_tier, Some(3_800));
        assert_eq!(summary.history.len(), 1);
    }

    #[test]
    fn test_summary_json_shape_for_gold() {
        let summary = LoyaltySummary::from_account(&account_with(11_000));
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["tier"], "gold");
        assert!(json["next_tier_threshold"].is_null());
        assert_eq!(json["progress_percent"], 100);
    }

    #[test]
    fn test_program_benefits_table() {
        let table = program_benefits();
        assert_eq!(table.len(), 3);
        assert_eq!(table[0].tier, Tier::Bronze);
        assert_eq!(table[0].evolv_rate_percent, "10");
        assert_eq!(table[1].qualifying_points, 5_000);
        assert_eq!(table[2].next_threshold, NextThreshold::Unbounded);
        assert_eq!(table[2].earn_rule, "20% of orders of 1000 or more");
    }

    #[test]
    fn test_program_stats_from_accounts() {
        let accounts = [account_with(100), account_with(6_000), account_with(12_000)];
        let stats = ProgramStats::from_accounts(&accounts);
        assert_eq!(stats.members, 3);
        assert_eq!(
            stats.members_by_tier,
            TierCounts {
                bronze: 1,
                silver: 1,
                gold: 1
            }
        );
        assert_eq!(stats.points_outstanding, 18_100);
        assert_eq!(stats.lifetime_points_awarded, 18_100);
    }

    fn any_tier() -> impl Strategy<Value = Tier> {
        prop_oneof![Just(Tier::Bronze), Just(Tier::Silver), Just(Tier::Gold)]
    }

    proptest! {
        #[test]
        fn progress_is_bounded_and_complete_only_at_gold(tier in any_tier(), points in 0_u64..100_000) {
            let mut account = account_with(0);
            account.tier = tier;
            account.next_tier_threshold = tier.next_threshold();
            account.points = points;

            let progress = progress_to_next_tier(&account);
            prop_assert!(progress <= 100);
            prop_assert_eq!(progress == 100, tier == Tier::Gold);
        }
    }
}
