//! Order amounts using decimal arithmetic.
//!
//! Loyalty rules floor fractional results, so amounts stay in
//! [`rust_decimal::Decimal`] until the very last step to avoid binary
//! floating point drift (`0.15 * 1000` must be exactly `150`).

use core::fmt;

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

/// Errors that can occur when constructing an [`OrderAmount`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum AmountError {
    /// The amount is below zero.
    #[error("order amount cannot be negative (got {0})")]
    Negative(Decimal),
    /// The amount exceeds [`OrderAmount::MAX`].
    #[error("order amount must be at most {max} (got {got})")]
    TooLarge {
        /// Maximum allowed amount.
        max: Decimal,
        /// The rejected amount.
        got: Decimal,
    },
}

/// A validated order total in the store currency's standard unit.
///
/// ## Constraints
///
/// - Not negative
/// - At most [`OrderAmount::MAX`], so every derived point value fits in `u64`
///
/// ## Examples
///
/// ```
/// use evolv_core::OrderAmount;
/// use rust_decimal::Decimal;
///
/// assert!(OrderAmount::new(Decimal::new(149_999, 2)).is_ok()); // 1499.99
/// assert!(OrderAmount::new(Decimal::new(-1, 0)).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct OrderAmount(Decimal);

impl OrderAmount {
    /// Largest accepted order amount (10^12).
    pub const MAX: Decimal = Decimal::from_parts(3_567_587_328, 232, 0, false, 0);

    /// Zero amount.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Validate a decimal as an order amount.
    ///
    /// # Errors
    ///
    /// Returns [`AmountError::Negative`] for values below zero and
    /// [`AmountError::TooLarge`] for values above [`OrderAmount::MAX`].
    pub fn new(amount: Decimal) -> Result<Self, AmountError> {
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(AmountError::Negative(amount));
        }
        if amount > Self::MAX {
            return Err(AmountError::TooLarge {
                max: Self::MAX,
                got: amount,
            });
        }
        Ok(Self(amount))
    }

    /// Create an amount from a whole number of currency units.
    #[must_use]
    pub fn from_units(units: u32) -> Self {
        Self(Decimal::from(units))
    }

    /// The underlying decimal.
    #[must_use]
    pub const fn as_decimal(&self) -> Decimal {
        self.0
    }

    /// Multiply by `rate` and floor to whole points.
    ///
    /// Rates used by the loyalty program are at most `1`, so the product is
    /// bounded by [`OrderAmount::MAX`] and always fits in `u64`.
    #[must_use]
    pub fn floor_mul(&self, rate: Decimal) -> u64 {
        (self.0 * rate).floor().to_u64().unwrap_or(0)
    }

    /// Number of complete `unit` blocks contained in the amount.
    #[must_use]
    pub fn whole_blocks(&self, unit: Decimal) -> u64 {
        if unit.is_zero() {
            return 0;
        }
        (self.0 / unit).floor().to_u64().unwrap_or(0)
    }
}

impl TryFrom<Decimal> for OrderAmount {
    type Error = AmountError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<OrderAmount> for Decimal {
    fn from(amount: OrderAmount) -> Self {
        amount.0
    }
}

impl fmt::Display for OrderAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}
