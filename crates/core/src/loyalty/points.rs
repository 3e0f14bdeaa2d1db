//! Points calculator.
//!
//! One policy applies at every trigger:
//!
//! | Tier   | Tier points                                   | Evolv points |
//! |--------|-----------------------------------------------|--------------|
//! | bronze | 100 per complete 1000 spent                   | 10%          |
//! | silver | 15% of the order, orders of 1000 or more only | 15%          |
//! | gold   | 20% of the order, orders of 1000 or more only | 20%          |
//!
//! Fractions are floored. The tier used is the one held *before* the order is
//! applied.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::tier::Tier;
use crate::types::OrderAmount;

/// Order size that earns one bronze block.
const BRONZE_BLOCK: Decimal = Decimal::from_parts(1_000, 0, 0, false, 0);

/// Points per bronze block.
const BRONZE_POINTS_PER_BLOCK: u64 = 100;

/// Smallest order that earns rate-based points.
const RATE_MINIMUM_ORDER: Decimal = Decimal::from_parts(1_000, 0, 0, false, 0);

const SILVER_RATE: Decimal = Decimal::from_parts(15, 0, 0, false, 2);
const GOLD_RATE: Decimal = Decimal::from_parts(20, 0, 0, false, 2);

const BRONZE_EVOLV_RATE: Decimal = Decimal::from_parts(10, 0, 0, false, 2);
const SILVER_EVOLV_RATE: Decimal = Decimal::from_parts(15, 0, 0, false, 2);
const GOLD_EVOLV_RATE: Decimal = Decimal::from_parts(20, 0, 0, false, 2);

/// How a tier turns an order amount into tier points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EarnRule {
    /// A fixed number of points per complete block of spend.
    PerBlock { block: Decimal, points: u64 },
    /// A fraction of the order, for orders of at least `minimum_order`.
    Rate {
        rate: Decimal,
        minimum_order: Decimal,
    },
}

impl EarnRule {
    /// Points earned on `amount` under this rule.
    #[must_use]
    pub fn apply(self, amount: OrderAmount) -> u64 {
        match self {
            Self::PerBlock { block, points } => {
                amount.whole_blocks(block).saturating_mul(points)
            }
            Self::Rate {
                rate,
                minimum_order,
            } => {
                if amount.as_decimal() >= minimum_order {
                    amount.floor_mul(rate)
                } else {
                    0
                }
            }
        }
    }
}

impl std::fmt::Display for EarnRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PerBlock { block, points } => {
                write!(f, "{points} points per {block} spent")
            }
            Self::Rate {
                rate,
                minimum_order,
            } => write!(
                f,
                "{}% of orders of {minimum_order} or more",
                (rate * Decimal::ONE_HUNDRED).normalize()
            ),
        }
    }
}

impl Tier {
    /// The tier-point earning rule for this tier.
    #[must_use]
    pub const fn earn_rule(self) -> EarnRule {
        match self {
            Self::Bronze => EarnRule::PerBlock {
                block: BRONZE_BLOCK,
                points: BRONZE_POINTS_PER_BLOCK,
            },
            Self::Silver => EarnRule::Rate {
                rate: SILVER_RATE,
                minimum_order: RATE_MINIMUM_ORDER,
            },
            Self::Gold => EarnRule::Rate {
                rate: GOLD_RATE,
                minimum_order: RATE_MINIMUM_ORDER,
            },
        }
    }

    /// Fraction of each order credited as evolv points.
    #[must_use]
    pub const fn evolv_rate(self) -> Decimal {
        match self {
            Self::Bronze => BRONZE_EVOLV_RATE,
            Self::Silver => SILVER_EVOLV_RATE,
            Self::Gold => GOLD_EVOLV_RATE,
        }
    }
}

/// Tier points earned by an order of `amount` placed at `tier`.
#[must_use]
pub fn compute_points(tier: Tier, amount: OrderAmount) -> u64 {
    tier.earn_rule().apply(amount)
}

/// Evolv points earned by an order of `amount` placed at `tier`.
#[must_use]
pub fn compute_evolv_points(tier: Tier, amount: OrderAmount) -> u64 {
    amount.floor_mul(tier.evolv_rate())
}

/// Both currencies earned by one order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Earning {
    pub points: u64,
    pub evolv_points: u64,
}

impl Earning {
    /// Compute the earning for an order of `amount` at `tier`.
    #[must_use]
    pub fn for_order(tier: Tier, amount: OrderAmount) -> Self {
        Self {
            points: compute_points(tier, amount),
            evolv_points: compute_evolv_points(tier, amount),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn amount(units: u32) -> OrderAmount {
        OrderAmount::from_units(units)
    }

    #[test]
    fn test_bronze_earns_per_thousand() {
        assert_eq!(compute_points(Tier::Bronze, amount(0)), 0);
        assert_eq!(compute_points(Tier::Bronze, amount(999)), 0);
        assert_eq!(compute_points(Tier::Bronze, amount(1000)), 100);
        assert_eq!(compute_points(Tier::Bronze, amount(2500)), 200);
    }

    #[test]
    fn test_silver_rate_applies_from_minimum() {
        assert_eq!(compute_points(Tier::Silver, amount(999)), 0);
        assert_eq!(compute_points(Tier::Silver, amount(1000)), 150);
        assert_eq!(compute_points(Tier::Silver, amount(1999)), 299);
    }

    #[test]
    fn test_gold_rate_applies_from_minimum() {
        assert_eq!(compute_points(Tier::Gold, amount(500)), 0);
        assert_eq!(compute_points(Tier::Gold, amount(1000)), 200);
        let fractional = OrderAmount::new(Decimal::new(123_456, 2)).unwrap(); // 1234.56
        assert_eq!(compute_points(Tier::Gold, fractional), 246);
    }

    #[test]
    fn test_evolv_points_have_no_minimum() {
        assert_eq!(compute_evolv_points(Tier::Bronze, amount(500)), 50);
        assert_eq!(compute_evolv_points(Tier::Silver, amount(500)), 75);
        assert_eq!(compute_evolv_points(Tier::Gold, amount(500)), 100);
    }

    #[test]
    fn test_earning_for_order() {
        let earning = Earning::for_order(Tier::Silver, amount(1000));
        assert_eq!(
            earning,
            Earning {
                points: 150,
                evolv_points: 150
            }
        );
    }

    #[test]
    fn test_earn_rule_display() {
        assert_eq!(
            Tier::Bronze.earn_rule().to_string(),
            "100 points per 1000 spent"
        );
        assert_eq!(
            Tier::Silver.earn_rule().to_string(),
            "15% of orders of 1000 or more"
        );
    }

    fn any_tier() -> impl Strategy<Value = Tier> {
        prop_oneof![Just(Tier::Bronze), Just(Tier::Silver), Just(Tier::Gold)]
    }

    fn any_amount() -> impl Strategy<Value = OrderAmount> {
        // Up to 100 million with two decimal places.
        (0_i64..10_000_000_000).prop_map(|cents| OrderAmount::new(Decimal::new(cents, 2)).unwrap())
    }

    proptest! {
        #[test]
        fn points_are_monotonic_in_amount(tier in any_tier(), a in any_amount(), b in any_amount()) {
            let (low, high) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(compute_points(tier, low) <= compute_points(tier, high));
            prop_assert!(compute_evolv_points(tier, low) <= compute_evolv_points(tier, high));
        }

        #[test]
        fn points_never_exceed_order_amount(tier in any_tier(), a in any_amount()) {
            let whole = a.whole_blocks(Decimal::ONE);
            prop_assert!(compute_points(tier, a) <= whole);
        }
    }
}
