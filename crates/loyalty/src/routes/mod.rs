//! HTTP route handlers for the loyalty API.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                             - Liveness check
//! GET  /health/ready                       - Readiness check (store reachable)
//!
//! # Order events (from the order system)
//! POST /api/orders/events                  - Apply an order lifecycle event
//!
//! # Customer loyalty
//! GET  /api/loyalty/program                - Tier benefits table
//! GET  /api/loyalty/{customer_id}          - Account summary
//! GET  /api/loyalty/{customer_id}/history  - History (?kind=&limit=)
//! POST /api/loyalty/{customer_id}/enroll   - Explicit enrollment
//! POST /api/loyalty/{customer_id}/redeem   - Spend points
//!
//! # Admin
//! GET  /api/admin/loyalty/stats            - Program-wide aggregates
//! ```

pub mod admin;
pub mod loyalty;
pub mod orders;

use axum::{
    Router,
    routing::{get, post},
};

use crate::state::AppState;

/// Build the API router. Health routes are added by [`crate::app`].
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/orders/events", post(orders::ingest_event))
        .nest("/api/loyalty", loyalty_routes())
        .route("/api/admin/loyalty/stats", get(admin::stats))
}

fn loyalty_routes() -> Router<AppState> {
    Router::new()
        .route("/program", get(loyalty::program))
        .route("/{customer_id}", get(loyalty::summary))
        .route("/{customer_id}/history", get(loyalty::history))
        .route("/{customer_id}/enroll", post(loyalty::enroll))
        .route("/{customer_id}/redeem", post(loyalty::redeem))
}
