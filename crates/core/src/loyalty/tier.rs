//! Tier evaluator.
//!
//! Tiers are earned by holding enough points and are never lost: evaluation
//! only moves upwards.

use serde::{Deserialize, Serialize};

/// Points needed to reach silver.
pub const SILVER_THRESHOLD: u64 = 5_000;

/// Points needed to reach gold.
pub const GOLD_THRESHOLD: u64 = 10_000;

/// Loyalty tier, ordered from lowest to highest.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "loyalty.tier", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    #[default]
    Bronze,
    Silver,
    Gold,
}

impl Tier {
    /// All tiers, lowest first.
    pub const ALL: [Self; 3] = [Self::Bronze, Self::Silver, Self::Gold];

    /// Points a customer must hold to qualify for this tier.
    #[must_use]
    pub const fn qualifying_points(self) -> u64 {
        match self {
            Self::Bronze => 0,
            Self::Silver => SILVER_THRESHOLD,
            Self::Gold => GOLD_THRESHOLD,
        }
    }

    /// The tier above this one, if any.
    #[must_use]
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::Bronze => Some(Self::Silver),
            Self::Silver => Some(Self::Gold),
            Self::Gold => None,
        }
    }

    /// Points required to leave this tier for the next one.
    #[must_use]
    pub const fn next_threshold(self) -> NextThreshold {
        match self.next() {
            Some(next) => NextThreshold::Points(next.qualifying_points()),
            None => NextThreshold::Unbounded,
        }
    }

    /// Highest tier whose qualifying threshold `points` reaches.
    #[must_use]
    pub const fn for_points(points: u64) -> Self {
        if points >= GOLD_THRESHOLD {
            Self::Gold
        } else if points >= SILVER_THRESHOLD {
            Self::Silver
        } else {
            Self::Bronze
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bronze => write!(f, "bronze"),
            Self::Silver => write!(f, "silver"),
            Self::Gold => write!(f, "gold"),
        }
    }
}

impl std::str::FromStr for Tier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bronze" => Ok(Self::Bronze),
            "silver" => Ok(Self::Silver),
            "gold" => Ok(Self::Gold),
            _ => Err(format!("invalid tier: {s}")),
        }
    }
}

/// Points required to reach the next tier.
///
/// Serializes as a number, or `null` for the terminal tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "Option<u64>", into = "Option<u64>")]
pub enum NextThreshold {
    Points(u64),
    /// Terminal tier; there is nothing left to reach.
    Unbounded,
}

impl NextThreshold {
    /// The threshold as a number, `None` when unbounded.
    #[must_use]
    pub const fn points(self) -> Option<u64> {
        match self {
            Self::Points(points) => Some(points),
            Self::Unbounded => None,
        }
    }
}

impl From<Option<u64>> for NextThreshold {
    fn from(value: Option<u64>) -> Self {
        value.map_or(Self::Unbounded, Self::Points)
    }
}

impl From<NextThreshold> for Option<u64> {
    fn from(value: NextThreshold) -> Self {
        value.points()
    }
}

/// Result of evaluating a tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierEvaluation {
    pub tier: Tier,
    pub next_threshold: NextThreshold,
}

/// Evaluate the tier a customer holds after reaching `points`.
///
/// Never returns a tier below `current`. A balance that clears several
/// thresholds at once lands directly on the highest one.
#[must_use]
pub fn evaluate_tier(current: Tier, points: u64) -> TierEvaluation {
    let tier = current.max(Tier::for_points(points));
    TierEvaluation {
        tier,
        next_threshold: tier.next_threshold(),
    }
}
