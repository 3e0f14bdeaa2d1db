//! Loyalty program rules.
//!
//! Components, leaves first:
//!
//! - [`points`] - Points calculator: `(tier, order amount) -> points earned`
//! - [`tier`] - Tier evaluator: `(current tier, points) -> (tier, next threshold)`
//! - [`ledger`] - The account record and its append-only history
//! - [`projection`] - Read views derived from account state
//!
//! Everything here is pure. Persistence, idempotency and concurrency control
//! live in the `evolv-loyalty` service crate.

pub mod ledger;
pub mod points;
pub mod projection;
pub mod tier;

pub use ledger::{
    ConsistencyError, HistoryEntry, HistoryKind, HistoryTotals, LedgerError, LoyaltyAccount,
    TierChange,
};
pub use points::{EarnRule, Earning, compute_evolv_points, compute_points};
pub use projection::{
    LoyaltySummary, ProgramStats, TierBenefits, TierCounts, points_to_next_tier,
    program_benefits, progress_to_next_tier,
};
pub use tier::{GOLD_THRESHOLD, NextThreshold, SILVER_THRESHOLD, Tier, TierEvaluation, evaluate_tier};
