//! PostgreSQL pool shared by the note, tag and user repositories.
//!
//! Sizing and timeouts default to the `DB_*` constants in
//! [`quill_core::defaults`] and can be overridden through the
//! `DATABASE_*` environment variables:
//!
//! | Variable | Default |
//! |----------|---------|
//! | `DATABASE_MAX_CONNECTIONS` | [`DB_MAX_CONNECTIONS`] |
//! | `DATABASE_MIN_CONNECTIONS` | [`DB_MIN_CONNECTIONS`] |
//! | `DATABASE_ACQUIRE_TIMEOUT_SECS` | [`DB_ACQUIRE_TIMEOUT_SECS`] |
//! | `DATABASE_IDLE_TIMEOUT_SECS` | [`DB_IDLE_TIMEOUT_SECS`] |
//! | `DATABASE_MAX_LIFETIME_SECS` | [`DB_MAX_LIFETIME_SECS`], `0` disables |

use std::time::{Duration, Instant};

use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::{debug, info, warn};

use quill_core::defaults::*;
use quill_core::{Error, Result};

/// Pool sizing and timeouts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    /// Upper bound on open connections.
    pub max_connections: u32,
    /// Connections kept open while idle. Never above `max_connections`.
    pub min_connections: u32,
    /// How long a request waits for a free connection.
    pub acquire_timeout: Duration,
    /// Idle connections above the minimum are closed after this long.
    pub idle_timeout: Duration,
    /// Age at which a connection is recycled. `None` keeps connections
    /// until they fail or go idle.
    pub max_lifetime: Option<Duration>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: DB_MAX_CONNECTIONS,
            min_connections: DB_MIN_CONNECTIONS,
            acquire_timeout: Duration::from_secs(DB_ACQUIRE_TIMEOUT_SECS),
            idle_timeout: Duration::from_secs(DB_IDLE_TIMEOUT_SECS),
            max_lifetime: Some(Duration::from_secs(DB_MAX_LIFETIME_SECS)),
        }
    }
}

impl PoolConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the `DATABASE_*` overrides from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read the overrides through `lookup`. Blank values count as unset,
    /// values that are not numbers are a configuration error.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let number = |key: &str| -> Result<Option<u64>> {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .map(|v| {
                    v.trim()
                        .parse::<u64>()
                        .map_err(|_| Error::Config(format!("{} must be a number, got '{}'", key, v)))
                })
                .transpose()
        };
        let count = |key: &str| -> Result<Option<u32>> {
            number(key)?
                .map(|n| {
                    u32::try_from(n)
                        .map_err(|_| Error::Config(format!("{} out of range: {}", key, n)))
                })
                .transpose()
        };

        let mut config = Self::default();
        if let Some(n) = count(ENV_DATABASE_MAX_CONNECTIONS)? {
            config.max_connections = n;
        }
        if let Some(n) = count(ENV_DATABASE_MIN_CONNECTIONS)? {
            config.min_connections = n;
        }
        if let Some(secs) = number(ENV_DATABASE_ACQUIRE_TIMEOUT_SECS)? {
            config.acquire_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = number(ENV_DATABASE_IDLE_TIMEOUT_SECS)? {
            config.idle_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = number(ENV_DATABASE_MAX_LIFETIME_SECS)? {
            config.max_lifetime = (secs > 0).then(|| Duration::from_secs(secs));
        }

        config.validate()?;
        Ok(config)
    }

    pub fn max_connections(mut self, n: u32) -> Self {
        self.max_connections = n;
        self
    }

    pub fn min_connections(mut self, n: u32) -> Self {
        self.min_connections = n;
        self
    }

    /// Reject sizes the pool could never satisfy.
    pub fn validate(&self) -> Result<()> {
        if self.max_connections == 0 {
            return Err(Error::Config(format!(
                "{} must be at least 1",
                ENV_DATABASE_MAX_CONNECTIONS
            )));
        }
        if self.min_connections > self.max_connections {
            return Err(Error::Config(format!(
                "{} ({}) exceeds {} ({})",
                ENV_DATABASE_MIN_CONNECTIONS,
                self.min_connections,
                ENV_DATABASE_MAX_CONNECTIONS,
                self.max_connections
            )));
        }
        Ok(())
    }

    /// sqlx options for this configuration.
    pub fn options(&self) -> PgPoolOptions {
        PgPoolOptions::new()
            .max_connections(self.max_connections)
            .min_connections(self.min_connections)
            .acquire_timeout(self.acquire_timeout)
            .idle_timeout(self.idle_timeout)
            .max_lifetime(self.max_lifetime)
    }
}

/// Connect with [`PoolConfig::default`].
pub async fn create_pool(database_url: &str) -> Result<PgPool> {
    create_pool_with_config(database_url, PoolConfig::default()).await
}

/// Validate `config` and connect. Fails when the first connection cannot
/// be established.
pub async fn create_pool_with_config(database_url: &str, config: PoolConfig) -> Result<PgPool> {
    config.validate()?;
    let start = Instant::now();

    info!(
        subsystem = "database",
        component = "pool",
        op = "create",
        max_connections = config.max_connections,
        min_connections = config.min_connections,
        acquire_timeout_secs = config.acquire_timeout.as_secs(),
        max_lifetime_secs = config.max_lifetime.map(|d| d.as_secs()),
        "Connecting to PostgreSQL"
    );

    let pool = config
        .options()
        .connect(database_url)
        .await
        .map_err(Error::Database)?;

    info!(
        subsystem = "database",
        component = "pool",
        op = "established",
        pool_size = pool.size(),
        duration_ms = start.elapsed().as_millis() as u64,
        "PostgreSQL pool ready"
    );
    Ok(pool)
}

/// Log how many connections are open and in use. Warns when every open
/// connection is checked out.
pub fn log_pool_metrics(pool: &PgPool) {
    let size = pool.size();
    let idle = u32::try_from(pool.num_idle()).unwrap_or(u32::MAX);
    let in_use = size.saturating_sub(idle);

    debug!(
        subsystem = "database",
        component = "pool",
        op = "metrics",
        pool_size = size,
        pool_idle = idle,
        pool_in_use = in_use,
        "Pool usage"
    );

    if idle == 0 && size > 0 {
        warn!(
            subsystem = "database",
            component = "pool",
            pool_size = size,
            "All pooled connections are in use"
        );
    }
}
