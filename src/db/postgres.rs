use std::str::FromStr;
use std::time::Duration;

use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::PgPool;

use crate::config::DatabaseConfig;
use crate::error::{FactoryError, FactoryResult};

/// Smallest pool the factory will build, whatever the configuration says
pub const MIN_POOL_SIZE: u32 = 2;

pub const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);
pub const IDLE_TIMEOUT: Duration = Duration::from_secs(30);
pub const MAX_LIFETIME: Duration = Duration::from_secs(5 * 60);

/// Pool parameters derived from a [`DatabaseConfig`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolSettings {
    pub max_connections: u32,
    pub min_idle: u32,
    pub acquire_timeout: Duration,
    pub idle_timeout: Duration,
    pub max_lifetime: Duration,
    pub statement_cache_capacity: usize,
    pub auto_commit: bool,
    pub login: Option<String>,
    pub password: Option<String>,
    pub catalog: Option<String>,
}

impl From<&DatabaseConfig> for PoolSettings {
    fn from(config: &DatabaseConfig) -> Self {
        let max_connections = config.max_connections.max(MIN_POOL_SIZE);

        Self {
            max_connections,
            min_idle: (max_connections / 3).max(1),
            acquire_timeout: ACQUIRE_TIMEOUT,
            idle_timeout: IDLE_TIMEOUT,
            max_lifetime: MAX_LIFETIME,
            statement_cache_capacity: 0,
            auto_commit: true,
            login: config.login.clone(),
            password: config.password.clone(),
            catalog: config.catalog.clone(),
        }
    }
}

impl PoolSettings {
    /// Sizing and eviction options handed to the pool
    pub fn pool_options(&self) -> PgPoolOptions {
        PgPoolOptions::new()
            .max_connections(self.max_connections)
            .min_connections(self.min_idle)
            .acquire_timeout(self.acquire_timeout)
            .idle_timeout(self.idle_timeout)
            .max_lifetime(self.max_lifetime)
    }

    /// Parses `url` and layers the credential, catalog and statement cache
    /// overrides on top of it.
    pub fn connect_options(&self, url: &str) -> FactoryResult<PgConnectOptions> {
        if url.trim().is_empty() {
            return Err(FactoryError::InvalidConfig("database url is empty".into()));
        }

        let mut options =
            PgConnectOptions::from_str(url)?.statement_cache_capacity(self.statement_cache_capacity);

        if let Some(login) = &self.login {
            options = options.username(login);
        }
        if let Some(password) = &self.password {
            options = options.password(password);
        }
        if let Some(catalog) = &self.catalog {
            options = options.database(catalog);
        }

        Ok(options)
    }
}

/// Creates a PostgreSQL connection pool
///
/// Connects eagerly so that a bad URL or unreachable server surfaces here
/// instead of on the first acquire.
pub async fn create_pool(settings: &PoolSettings, url: &str) -> FactoryResult<PgPool> {
    let connect_options = settings.connect_options(url)?;

    let pool = settings
        .pool_options()
        .connect_with(connect_options)
        .await?;

    Ok(pool)
}
