//! Order lifecycle events consumed by the loyalty program.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::id::{CustomerId, OrderId};
use super::money::{AmountError, OrderAmount};
use super::status::{FinancialStatus, OrderEventType};

/// An order lifecycle event as published by the order system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderEvent {
    pub order_id: OrderId,
    pub customer_id: CustomerId,
    /// Order total, validated into an [`OrderAmount`] by [`OrderEvent::amount`].
    pub order_total: Decimal,
    pub event_type: OrderEventType,
    /// Payment state of the order when the event was emitted.
    #[serde(default)]
    pub financial_status: FinancialStatus,
}

impl OrderEvent {
    /// Idempotency key for this event.
    #[must_use]
    pub const fn key(&self) -> EventKey {
        EventKey {
            order_id: self.order_id,
            event_type: self.event_type,
        }
    }

    /// The validated order total.
    ///
    /// # Errors
    ///
    /// Returns an [`AmountError`] if the total is negative or too large.
    pub fn amount(&self) -> Result<OrderAmount, AmountError> {
        OrderAmount::new(self.order_total)
    }
}

/// Identifies one lifecycle event of one order.
///
/// Each key is applied to a loyalty account at most once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventKey {
    pub order_id: OrderId,
    pub event_type: OrderEventType,
}

impl std::fmt::Display for EventKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "order {}/{}", self.order_id, self.event_type)
    }
}
