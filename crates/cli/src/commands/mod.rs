//! CLI subcommands.

pub mod account;
pub mod event;
pub mod migrate;
pub mod stats;

use std::sync::Arc;

use serde::Serialize;
use sqlx::PgPool;
use thiserror::Error;

use evolv_loyalty::config::{ConfigError, LoyaltyConfig, StoreBackend};
use evolv_loyalty::db::{self, PgLoyaltyStore};
use evolv_loyalty::services::{LoyaltyError, LoyaltyService};

/// Errors shared by the loyalty commands.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The CLI only operates on the `PostgreSQL` store.
    #[error("LOYALTY_STORE=memory has no database to operate on")]
    MemoryStore,

    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error(transparent)]
    Loyalty(#[from] LoyaltyError),

    #[error("Output error: {0}")]
    Output(#[from] serde_json::Error),
}

/// Load configuration and connect to the loyalty database.
async fn connect() -> Result<(LoyaltyConfig, PgPool), CommandError> {
    let config = LoyaltyConfig::from_env()?;
    let StoreBackend::Postgres(database_url) = &config.store else {
        return Err(CommandError::MemoryStore);
    };

    tracing::info!("Connecting to loyalty database...");
    let pool = db::create_pool(database_url).await?;
    Ok((config, pool))
}

/// Build a loyalty service over the configured database.
async fn service() -> Result<LoyaltyService, CommandError> {
    let (config, pool) = connect().await?;
    Ok(LoyaltyService::new(
        Arc::new(PgLoyaltyStore::new(pool)),
        config.settings,
    ))
}

/// Print a value as pretty JSON on stdout.
fn print_json(value: &impl Serialize) -> Result<(), CommandError> {
    let json = serde_json::to_string_pretty(value)?;
    #[allow(clippy::print_stdout)]
    {
        println!("{json}");
    }
    Ok(())
}
