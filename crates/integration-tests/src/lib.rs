//! Integration tests for Evolv loyalty.
//!
//! # Running Tests
//!
//! ```bash
//! # Service and HTTP tests (in-memory store)
//! cargo test -p evolv-integration-tests
//!
//! # PostgreSQL-backed tests
//! LOYALTY_TEST_DATABASE_URL=postgres://localhost/evolv_loyalty_test \
//!     cargo test -p evolv-integration-tests -- --ignored
//! ```
//!
//! # Test Categories
//!
//! - `loyalty_service` - Trigger, ledger and concurrency behaviour
//! - `loyalty_api` - HTTP routes driven through the router
//! - `loyalty_postgres` - `PgLoyaltyStore` against a real database

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use rust_decimal::Decimal;

use evolv_core::{CustomerId, FinancialStatus, OrderEvent, OrderEventType, OrderId};
use evolv_loyalty::services::{LoyaltyService, LoyaltySettings};
use evolv_loyalty::state::AppState;
use evolv_loyalty::store::{LoyaltyStore, MemoryLoyaltyStore};

/// Default settings with a 1ms backoff so retry tests stay fast.
#[must_use]
pub fn test_settings() -> LoyaltySettings {
    LoyaltySettings {
        retry_base: Duration::from_millis(1),
        ..LoyaltySettings::default()
    }
}

/// A service over a fresh in-memory store.
#[must_use]
pub fn memory_service(settings: LoyaltySettings) -> (Arc<MemoryLoyaltyStore>, LoyaltyService) {
    let store = Arc::new(MemoryLoyaltyStore::new());
    let shared: Arc<dyn LoyaltyStore> = store.clone();
    let service = LoyaltyService::new(shared, settings);
    (store, service)
}

/// The full router over a fresh in-memory store.
#[must_use]
pub fn test_app() -> (Arc<MemoryLoyaltyStore>, Router) {
    let (store, service) = memory_service(test_settings());
    (store, evolv_loyalty::app(AppState::new(service)))
}

/// A paid order event.
#[must_use]
pub fn paid_order(order_id: i32, customer_id: i32, total: i64) -> OrderEvent {
    order_event(order_id, customer_id, total, OrderEventType::Paid)
}

/// An order event of the given type for a paid order.
#[must_use]
pub fn order_event(
    order_id: i32,
    customer_id: i32,
    total: i64,
    event_type: OrderEventType,
) -> OrderEvent {
    OrderEvent {
        order_id: OrderId::new(order_id),
        customer_id: CustomerId::new(customer_id),
        order_total: Decimal::new(total, 0),
        event_type,
        financial_status: FinancialStatus::Paid,
    }
}
