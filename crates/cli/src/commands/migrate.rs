//! Database migration commands.
//!
//! # Usage
//!
//! ```bash
//! evolv-cli migrate
//! ```
//!
//! # Environment Variables
//!
//! - `LOYALTY_DATABASE_URL` - `PostgreSQL` connection string (falls back to
//!   `DATABASE_URL`)
//!
//! # Migration Files
//!
//! Loyalty migrations live in `crates/loyalty/migrations/`.

use super::{CommandError, connect};

/// Run loyalty database migrations.
///
/// # Errors
///
/// Returns an error if the database is unreachable or a migration fails.
pub async fn run() -> Result<(), CommandError> {
    let (_, pool) = connect().await?;

    tracing::info!("Running loyalty migrations...");
    sqlx::migrate!("../loyalty/migrations").run(&pool).await?;

    tracing::info!("Loyalty migrations complete!");
    Ok(())
}
