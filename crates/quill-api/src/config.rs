//! Server configuration from environment variables.
//!
//! `.env` files are loaded by `main` with `dotenvy` before this runs.
//! Defaults live in [`quill_core::defaults`].

use axum::http::HeaderValue;

use quill_core::defaults::*;
use quill_core::{Error, Result};

/// Where recordings are stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageConfig {
    Supabase {
        url: String,
        service_key: String,
        bucket: String,
    },
    Filesystem {
        path: String,
        /// Base that public object URLs start with, e.g.
        /// `http://localhost:3000/files`.
        public_base: String,
    },
}

/// Global request rate limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub requests: u64,
    pub period_secs: u64,
}

/// Everything `main` needs to start the server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub allowed_origins: Vec<String>,
    /// `None` disables rate limiting.
    pub rate_limit: Option<RateLimitConfig>,
    pub max_body_bytes: usize,
    /// Shared secret for session token signatures.
    pub jwt_secret: String,
    pub clerk_secret_key: Option<String>,
    pub clerk_api_url: String,
    pub storage: StorageConfig,
}

impl ServerConfig {
    /// Read the configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read the configuration through `lookup`. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let parse = |key: &str| -> Result<Option<u64>> {
            get(key)
                .map(|v| {
                    v.trim()
                        .parse::<u64>()
                        .map_err(|_| Error::Config(format!("{} must be a number, got '{}'", key, v)))
                })
                .transpose()
        };

        let port = match parse(ENV_PORT)? {
            Some(p) => u16::try_from(p)
                .map_err(|_| Error::Config(format!("{} out of range: {}", ENV_PORT, p)))?,
            None => SERVER_PORT,
        };

        let rate_limit_enabled = get(ENV_RATE_LIMIT_ENABLED)
            .map(|v| v == "true" || v == "1")
            .unwrap_or(true);
        let rate_limit = rate_limit_enabled.then_some(RateLimitConfig {
            requests: parse(ENV_RATE_LIMIT_REQUESTS)?.unwrap_or(RATE_LIMIT_REQUESTS),
            period_secs: parse(ENV_RATE_LIMIT_PERIOD_SECS)?.unwrap_or(RATE_LIMIT_PERIOD_SECS),
        });

        let jwt_secret = get(ENV_AUTH_JWT_SECRET)
            .ok_or_else(|| Error::Config(format!("{} must be set", ENV_AUTH_JWT_SECRET)))?;

        let bucket = get(ENV_RECORDINGS_BUCKET).unwrap_or_else(|| RECORDINGS_BUCKET.to_string());
        let backend = get(ENV_STORAGE_BACKEND).map(|v| v.to_lowercase());
        let storage = match backend.as_deref() {
            Some("supabase") => supabase_config(&get, bucket)?,
            Some("filesystem") => filesystem_config(&get),
            Some(other) => {
                return Err(Error::Config(format!(
                    "{} must be 'supabase' or 'filesystem', got '{}'",
                    ENV_STORAGE_BACKEND, other
                )))
            }
            None if get(ENV_SUPABASE_URL).is_some() => supabase_config(&get, bucket)?,
            None => filesystem_config(&get),
        };

        Ok(Self {
            database_url: get(ENV_DATABASE_URL).unwrap_or_else(|| DATABASE_URL.to_string()),
            host: get(ENV_HOST).unwrap_or_else(|| SERVER_HOST.to_string()),
            port,
            allowed_origins: get(ENV_ALLOWED_ORIGINS)
                .unwrap_or_else(|| ALLOWED_ORIGINS.to_string())
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            rate_limit,
            max_body_bytes: parse(ENV_MAX_BODY_BYTES)?
                .map(|n| n as usize)
                .unwrap_or(MAX_BODY_BYTES),
            jwt_secret,
            clerk_secret_key: get(ENV_CLERK_SECRET_KEY),
            clerk_api_url: get(ENV_CLERK_API_URL).unwrap_or_else(|| CLERK_API_URL.to_string()),
            storage,
        })
    }

    /// Socket address string to bind.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn supabase_config<G>(get: &G, bucket: String) -> Result<StorageConfig>
where
    G: Fn(&str) -> Option<String>,
{
    let url = get(ENV_SUPABASE_URL)
        .ok_or_else(|| Error::Config(format!("{} must be set", ENV_SUPABASE_URL)))?;
    let service_key = get(ENV_SUPABASE_SERVICE_KEY)
        .ok_or_else(|| Error::Config(format!("{} must be set", ENV_SUPABASE_SERVICE_KEY)))?;
    Ok(StorageConfig::Supabase {
        url,
        service_key,
        bucket,
    })
}

fn filesystem_config<G>(get: &G) -> StorageConfig
where
    G: Fn(&str) -> Option<String>,
{
    let public_base_url =
        get(ENV_PUBLIC_BASE_URL).unwrap_or_else(|| PUBLIC_BASE_URL.to_string());
    StorageConfig::Filesystem {
        path: get(ENV_FILE_STORAGE_PATH).unwrap_or_else(|| FILE_STORAGE_PATH.to_string()),
        public_base: format!("{}/files", public_base_url.trim_end_matches('/')),
    }
}

/// Parse CORS origins, skipping entries that are not valid header values.
pub fn parse_allowed_origins(origins: &[String]) -> Vec<HeaderValue> {
    origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::warn!("Invalid CORS origin '{}': {}", origin, e);
                None
            }
        })
        .collect()
}
