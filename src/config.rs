//! Runtime configuration for schoolhouse.
//!
//! Values come from the environment first and can then be overridden field by field,
//! which is how `schoolctl` applies its command-line flags.
//!
//! | Variable                       | Field                |
//! |--------------------------------|----------------------|
//! | `SCHOOLHOUSE_DATABASE_URL`     | `database_url`       |
//! | `DATABASE_URL` (fallback)      | `database_url`       |
//! | `SCHOOLHOUSE_MAX_CONNECTIONS`  | `max_connections`    |
//! | `SCHOOLHOUSE_UPDATE_STRATEGY`  | `update_strategy`    |
//! | `SCHOOLHOUSE_PAGE_SIZE`        | `default_page_size`  |
//! | `RUST_LOG`                     | `log_filter`         |

use std::time::Duration;

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use crate::UpdateStrategy;
use crate::repository::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};

const DEFAULT_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_LOG_FILTER: &str = "schoolhouse=info";

/// Errors raised while assembling or using the configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("no database URL configured; set SCHOOLHOUSE_DATABASE_URL or pass --database-url")]
    MissingDatabaseUrl,

    #[error("invalid value '{value}' for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("could not connect to database: {0}")]
    Connect(#[from] sqlx::Error),
}

/// Resolved application configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    pub database_url: Option<String>,
    pub max_connections: u32,
    pub update_strategy: UpdateStrategy,
    pub default_page_size: u32,
    pub log_filter: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            database_url: None,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            update_strategy: UpdateStrategy::default(),
            default_page_size: DEFAULT_PAGE_SIZE,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl AppConfig {
    /// Reads the configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the configuration through `lookup`, which maps variable names to values.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = AppConfig::default();

        config.database_url = lookup("SCHOOLHOUSE_DATABASE_URL")
            .or_else(|| lookup("DATABASE_URL"))
            .filter(|url| !url.trim().is_empty());

        if let Some(value) = lookup("SCHOOLHOUSE_MAX_CONNECTIONS") {
            config.max_connections = parse_positive("SCHOOLHOUSE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = lookup("SCHOOLHOUSE_UPDATE_STRATEGY") {
            config = config.with_strategy(&value)?;
        }
        if let Some(value) = lookup("SCHOOLHOUSE_PAGE_SIZE") {
            let size = parse_positive("SCHOOLHOUSE_PAGE_SIZE", &value)?;
            if size > MAX_PAGE_SIZE {
                return Err(ConfigError::Invalid {
                    key: "SCHOOLHOUSE_PAGE_SIZE",
                    value,
                    reason: format!("must be at most {}", MAX_PAGE_SIZE),
                });
            }
            config.default_page_size = size;
        }
        if let Some(value) = lookup("RUST_LOG").filter(|v| !v.trim().is_empty()) {
            config.log_filter = value;
        }
        Ok(config)
    }

    /// Replaces the database URL.
    pub fn with_database_url(mut self, url: impl Into<String>) -> Self {
        self.database_url = Some(url.into());
        self
    }

    /// Replaces the update strategy, parsing `"aggregate"` or `"selective"`.
    pub fn with_strategy(mut self, strategy: &str) -> Result<Self, ConfigError> {
        self.update_strategy = strategy.parse().map_err(|_| ConfigError::Invalid {
            key: "update strategy",
            value: strategy.to_string(),
            reason: "expected 'aggregate' or 'selective'".to_string(),
        })?;
        Ok(self)
    }

    /// Opens a connection pool to the configured database.
    pub async fn connect(&self) -> Result<PgPool, ConfigError> {
        let url = self
            .database_url
            .as_deref()
            .ok_or(ConfigError::MissingDatabaseUrl)?;
        let pool = PgPoolOptions::new()
            .max_connections(self.max_connections)
            .acquire_timeout(Duration::from_secs(10))
            .connect(url)
            .await?;
        tracing::debug!(max_connections = self.max_connections, "database pool ready");
        Ok(pool)
    }
}

fn parse_positive(key: &'static str, value: &str) -> Result<u32, ConfigError> {
    match value.trim().parse::<u32>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(ConfigError::Invalid {
            key,
            value: value.to_string(),
            reason: "must be a positive integer".to_string(),
        }),
    }
}
