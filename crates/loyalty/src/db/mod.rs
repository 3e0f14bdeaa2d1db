//! Database operations for the loyalty `PostgreSQL` database.
//!
//! ## Schema `loyalty`
//!
//! - `account` - One row per customer with balances, tier and version
//! - `history` - Append-only ledger entries, ordered by `seq` per customer
//! - `processed_event` - `(order_id, event_type)` keys already applied
//!
//! # Migrations
//!
//! Migrations are stored in `crates/loyalty/migrations/` and run via:
//! ```bash
//! cargo run -p evolv-cli -- migrate
//! ```

pub mod accounts;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use accounts::PgLoyaltyStore;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Convert a point count to its `BIGINT` column value.
pub(crate) fn to_db(value: u64, column: &str) -> Result<i64, RepositoryError> {
    i64::try_from(value)
        .map_err(|_| RepositoryError::DataCorruption(format!("{column} out of range: {value}")))
}

/// Convert a `BIGINT` column value back to a point count.
pub(crate) fn from_db(value: i64, column: &str) -> Result<u64, RepositoryError> {
    u64::try_from(value)
        .map_err(|_| RepositoryError::DataCorruption(format!("negative {column}: {value}")))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_to_db_rejects_overflow() {
        assert_eq!(to_db(42, "points").ok(), Some(42));
        assert!(matches!(
            to_db(u64::MAX, "points"),
            Err(RepositoryError::DataCorruption(_))
        ));
    }

    #[test]
    fn test_from_db_rejects_negative() {
        assert_eq!(from_db(7, "points").ok(), Some(7));
        let err = from_db(-1, "points").unwrap_err();
        assert_eq!(err.to_string(), "data corruption: negative points: -1");
    }
}
