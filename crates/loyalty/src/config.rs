//! Loyalty service configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `LOYALTY_DATABASE_URL` - `PostgreSQL` connection string (falls back to
//!   `DATABASE_URL`; not needed with `LOYALTY_STORE=memory`)
//!
//! ## Optional
//! - `LOYALTY_STORE` - `postgres` or `memory` (default: postgres)
//! - `LOYALTY_HOST` - Bind address (default: 127.0.0.1)
//! - `LOYALTY_PORT` - Listen port (default: 3000)
//! - `LOYALTY_AWARD_EVENT` - Order event that awards points: placed, paid or
//!   delivered (default: paid)
//! - `LOYALTY_MAX_RETRIES` - Commit attempts on version conflict (default: 5)
//! - `LOYALTY_RETRY_BASE_MS` - Backoff base in milliseconds (default: 25)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` - Error sample rate (default: 1.0)
//! - `SENTRY_TRACES_SAMPLE_RATE` - Traces sample rate (default: 0.0)

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;

use evolv_core::OrderEventType;

use crate::services::LoyaltySettings;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Where loyalty accounts are kept.
#[derive(Debug, Clone)]
pub enum StoreBackend {
    /// `PostgreSQL` at the given connection URL.
    Postgres(SecretString),
    /// Process memory. Data is lost on restart.
    Memory,
}

/// Sentry settings. Error tracking is disabled without a DSN.
#[derive(Debug, Clone, PartialEq)]
pub struct SentryConfig {
    pub dsn: Option<String>,
    pub environment: Option<String>,
    pub sample_rate: f32,
    pub traces_sample_rate: f32,
}

/// Loyalty service configuration.
#[derive(Debug, Clone)]
pub struct LoyaltyConfig {
    /// Account storage
    pub store: StoreBackend,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Points rules and retry tuning
    pub settings: LoyaltySettings,
    /// Error tracking
    pub sentry: SentryConfig,
}

impl LoyaltyConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable source.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let env = Env(&lookup);

        let store = match env.or_default("LOYALTY_STORE", "postgres").as_str() {
            "postgres" => StoreBackend::Postgres(env.database_url("LOYALTY_DATABASE_URL")?),
            "memory" => StoreBackend::Memory,
            other => {
                return Err(ConfigError::InvalidEnvVar(
                    "LOYALTY_STORE".to_string(),
                    format!("expected postgres or memory, got {other}"),
                ));
            }
        };

        let host = env.parsed::<IpAddr>("LOYALTY_HOST", "127.0.0.1")?;
        let port = env.parsed::<u16>("LOYALTY_PORT", "3000")?;
        let award_event = env.parsed::<OrderEventType>("LOYALTY_AWARD_EVENT", "paid")?;
        let max_attempts = env.parsed::<u32>("LOYALTY_MAX_RETRIES", "5")?;
        if max_attempts == 0 {
            return Err(ConfigError::InvalidEnvVar(
                "LOYALTY_MAX_RETRIES".to_string(),
                "must be at least 1".to_string(),
            ));
        }
        let retry_base_ms = env.parsed::<u64>("LOYALTY_RETRY_BASE_MS", "25")?;

        let sentry = SentryConfig {
            dsn: env.optional("SENTRY_DSN"),
            environment: env.optional("SENTRY_ENVIRONMENT"),
            sample_rate: env.parsed::<f32>("SENTRY_SAMPLE_RATE", "1.0")?,
            traces_sample_rate: env.parsed::<f32>("SENTRY_TRACES_SAMPLE_RATE", "0.0")?,
        };

        Ok(Self {
            store,
            host,
            port,
            settings: LoyaltySettings {
                award_event,
                max_attempts,
                retry_base: Duration::from_millis(retry_base_ms),
            },
            sentry,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

struct Env<'a, F>(&'a F);

impl<F: Fn(&str) -> Option<String>> Env<'_, F> {
    /// Get an optional variable, treating empty values as unset.
    fn optional(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|value| !value.trim().is_empty())
    }

    /// Get a variable with a default value.
    fn or_default(&self, key: &str, default: &str) -> String {
        self.optional(key).unwrap_or_else(|| default.to_string())
    }

    /// Parse a variable, falling back to `default` when unset.
    fn parsed<T>(&self, key: &str, default: &str) -> Result<T, ConfigError>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        self.or_default(key, default)
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
    }

    /// Get database URL with fallback to generic `DATABASE_URL`.
    fn database_url(&self, primary_key: &str) -> Result<SecretString, ConfigError> {
        self.optional(primary_key)
            .or_else(|| self.optional("DATABASE_URL"))
            .map(SecretString::from)
            .ok_or_else(|| ConfigError::MissingEnvVar(primary_key.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;

    use secrecy::ExposeSecret;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<LoyaltyConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        LoyaltyConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults_with_memory_store() {
        let config = load(&[("LOYALTY_STORE", "memory")]).unwrap();

        assert!(matches!(config.store, StoreBackend::Memory));
        assert_eq!(config.socket_addr().to_string(), "127.0.0.1:3000");
        assert_eq!(config.settings, LoyaltySettings::default());
        assert_eq!(config.sentry.dsn, None);
        assert!((config.sentry.sample_rate - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_postgres_requires_database_url() {
        let err = load(&[]).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(ref key) if key == "LOYALTY_DATABASE_URL"));
    }

    #[test]
    fn test_database_url_falls_back_to_generic() {
        let config = load(&[("DATABASE_URL", "postgres://localhost/loyalty")]).unwrap();
        match config.store {
            StoreBackend::Postgres(url) => {
                assert_eq!(url.expose_secret(), "postgres://localhost/loyalty");
            }
            StoreBackend::Memory => panic!("expected postgres store"),
        }
    }

    #[test]
    fn test_award_event_and_retry_overrides() {
        let config = load(&[
            ("LOYALTY_STORE", "memory"),
            ("LOYALTY_AWARD_EVENT", "delivered"),
            ("LOYALTY_MAX_RETRIES", "3"),
            ("LOYALTY_RETRY_BASE_MS", "100"),
            ("LOYALTY_PORT", "8080"),
        ])
        .unwrap();

        assert_eq!(config.settings.award_event, OrderEventType::Delivered);
        assert_eq!(config.settings.max_attempts, 3);
        assert_eq!(config.settings.retry_base, Duration::from_millis(100));
        assert_eq!(config.port, 8080);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let err = load(&[("LOYALTY_STORE", "redis")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar(ref key, _) if key == "LOYALTY_STORE"));

        let err = load(&[("LOYALTY_STORE", "memory"), ("LOYALTY_AWARD_EVENT", "shipped")])
            .unwrap_err();
        assert!(
            matches!(err, ConfigError::InvalidEnvVar(ref key, _) if key == "LOYALTY_AWARD_EVENT")
        );

        let err = load(&[("LOYALTY_STORE", "memory"), ("LOYALTY_MAX_RETRIES", "0")]).unwrap_err();
        assert!(
            matches!(err, ConfigError::InvalidEnvVar(ref key, _) if key == "LOYALTY_MAX_RETRIES")
        );
    }

    #[test]
    fn test_debug_redacts_database_url() {
        let config = load(&[("LOYALTY_DATABASE_URL", "postgres://user:hunter2@db/loyalty")]).unwrap();
        let debug = format!("{config:?}");
        assert!(!debug.contains("hunter2"));
    }
}
