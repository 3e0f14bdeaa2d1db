//! `PgLoyaltyStore` tests against a real database.
//!
//! These tests require:
//! - A running `PostgreSQL` database
//! - `LOYALTY_TEST_DATABASE_URL` pointing at a database the tests may migrate
//!
//! Run with: cargo test -p evolv-integration-tests -- --ignored

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::Utc;
use secrecy::SecretString;

use evolv_core::{CustomerId, HistoryKind, OrderAmount, Tier};
use evolv_integration_tests::{paid_order, test_settings};
use evolv_loyalty::db::{PgLoyaltyStore, create_pool};
use evolv_loyalty::services::{LoyaltyService, TriggerOutcome};
use evolv_loyalty::store::{LedgerCommit, LoyaltyStore, StoreError};

async fn store() -> PgLoyaltyStore {
    let url = std::env::var("LOYALTY_TEST_DATABASE_URL")
        .expect("LOYALTY_TEST_DATABASE_URL must be set for PostgreSQL tests");
    let pool = create_pool(&SecretString::from(url)).await.unwrap();
    sqlx::migrate!("../loyalty/migrations")
        .run(&pool)
        .await
        .unwrap();
    PgLoyaltyStore::new(pool)
}

/// An ID base unlikely to collide with earlier runs against the same database.
fn unique_base() -> i32 {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .subsec_nanos();
    i32::try_from(nanos % 1_000_000_000).unwrap()
}

#[tokio::test]
#[ignore = "Requires a PostgreSQL database (LOYALTY_TEST_DATABASE_URL)"]
async fn test_trigger_round_trips_through_postgres() {
    let store = Arc::new(store().await);
    let service = LoyaltyService::new(store.clone(), test_settings());
    let base = unique_base();
    let customer = CustomerId::new(base);

    let outcome = service
        .handle_order_event(paid_order(base, base, 60_000))
        .await
        .unwrap();
    assert!(matches!(outcome, TriggerOutcome::Awarded { points_earned: 6000, .. }));

    let duplicate = service
        .handle_order_event(paid_order(base, base, 60_000))
        .await
        .unwrap();
    assert!(matches!(duplicate, TriggerOutcome::Duplicate { .. }));

    service
        .redeem(customer, 1000, "Gift card".to_string())
        .await
        .unwrap();

    let stored = store.load(customer).await.unwrap().unwrap();
    assert_eq!(stored.version, 2);
    assert_eq!(stored.account.points, 5000);
    assert_eq!(stored.account.lifetime_points, 6000);
    assert_eq!(stored.account.tier, Tier::Silver);
    let kinds: Vec<_> = stored.account.history.iter().map(|e| e.kind).collect();
    assert_eq!(
        kinds,
        vec![
            HistoryKind::Earned,
            HistoryKind::TierUpgrade,
            HistoryKind::Redeemed,
        ]
    );
}

#[tokio::test]
#[ignore = "Requires a PostgreSQL database (LOYALTY_TEST_DATABASE_URL)"]
async fn test_stale_version_is_rejected() {
    let store = store().await;
    let service = LoyaltyService::new(Arc::new(store.clone()), test_settings());
    let customer = CustomerId::new(unique_base());
    service.enroll(customer).await.unwrap();

    let stale = store.load(customer).await.unwrap().unwrap();
    service
        .handle_order_event(paid_order(customer.as_i32(), customer.as_i32(), 1000))
        .await
        .unwrap();

    let mut account = stale.account;
    let history_start = account.history.len();
    let earning = account.earning_for(OrderAmount::from_units(1000));
    let change = account.apply_earning(earning, None, "Stale write", Utc::now());
    assert_eq!(change, None);

    let err = store
        .commit(LedgerCommit {
            account,
            expected_version: stale.version,
            history_start,
            event: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::VersionConflict { .. }));

    let current = store.load(customer).await.unwrap().unwrap();
    assert_eq!(current.account.points, 100);
    assert_eq!(current.account.history.len(), 1);
}
