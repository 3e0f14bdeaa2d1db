//! Status enums for orders flowing into the loyalty program.

use serde::{Deserialize, Serialize};

/// Order financial status.
///
/// Only [`FinancialStatus::Paid`] orders earn points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FinancialStatus {
    #[default]
    Pending,
    Authorized,
    PartiallyPaid,
    Paid,
    PartiallyRefunded,
    Refunded,
    Voided,
}

impl FinancialStatus {
    /// Whether an order in this state may earn loyalty points.
    #[must_use]
    pub const fn is_payable(self) -> bool {
        matches!(self, Self::Paid)
    }
}

impl std::fmt::Display for FinancialStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Authorized => write!(f, "authorized"),
            Self::PartiallyPaid => write!(f, "partially_paid"),
            Self::Paid => write!(f, "paid"),
            Self::PartiallyRefunded => write!(f, "partially_refunded"),
            Self::Refunded => write!(f, "refunded"),
            Self::Voided => write!(f, "voided"),
        }
    }
}

impl std::str::FromStr for FinancialStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "authorized" => Ok(Self::Authorized),
            "partially_paid" => Ok(Self::PartiallyPaid),
            "paid" => Ok(Self::Paid),
            "partially_refunded" => Ok(Self::PartiallyRefunded),
            "refunded" => Ok(Self::Refunded),
            "voided" => Ok(Self::Voided),
            _ => Err(format!("invalid financial status: {s}")),
        }
    }
}

/// Order lifecycle event that can reach the loyalty program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "loyalty.order_event_type", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum OrderEventType {
    /// The customer placed the order.
    Placed,
    /// Payment for the order was verified.
    Paid,
    /// The order was delivered.
    Delivered,
}

impl std::fmt::Display for OrderEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Placed => write!(f, "placed"),
            Self::Paid => write!(f, "paid"),
            Self::Delivered => write!(f, "delivered"),
        }
    }
}

impl std::str::FromStr for OrderEventType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "placed" => Ok(Self::Placed),
            "paid" => Ok(Self::Paid),
            "delivered" => Ok(Self::Delivered),
            _ => Err(format!("invalid order event type: {s}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_paid_is_payable() {
        let statuses = [
            FinancialStatus::Pending,
            FinancialStatus::Authorized,
            FinancialStatus::PartiallyPaid,
            FinancialStatus::PartiallyRefunded,
            FinancialStatus::Refunded,
            FinancialStatus::Voided,
        ];
        for status in statuses {
            assert!(!status.is_payable(), "{status} should not be payable");
        }
        assert!(FinancialStatus::Paid.is_payable());
    }

    #[test]
    fn test_financial_status_display_round_trips() {
        for status in [FinancialStatus::PartiallyRefunded, FinancialStatus::Paid] {
            assert_eq!(status.to_string().parse::<FinancialStatus>(), Ok(status));
        }
        assert!("settled".parse::<FinancialStatus>().is_err());
    }

    #[test]
    fn test_order_event_type_parse() {
        assert_eq!("delivered".parse::<OrderEventType>(), Ok(OrderEventType::Delivered));
        assert!("shipped".parse::<OrderEventType>().is_err());
    }

    #[test]
    fn test_order_event_type_serde() {
        let json = serde_json::to_string(&OrderEventType::Placed).ok();
        assert_eq!(json.as_deref(), Some("\"placed\""));
    }
}
