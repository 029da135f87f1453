use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use axum::http::HeaderValue;
use peercode_core::registry::{
    RegistrySettings, DEFAULT_MAX_CODE_ATTEMPTS, DEFAULT_SESSION_TTL_SECS, MAX_SESSION_TTL_SECS,
};
use peercode_db::PoolSettings;

/// Startup configuration failure.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("invalid {var} value '{value}': {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Where session records live.
#[derive(Debug, Clone)]
pub enum StoreBackend {
    Postgres {
        database_url: String,
        pool: PoolSettings,
    },
    /// Process-local store; records vanish on restart.
    Memory,
}

/// Server configuration loaded from environment variables.
///
/// All fields except `DATABASE_URL` have defaults suitable for local
/// development.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS`.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Session TTL and code-generation retry bound.
    pub registry: RegistrySettings,
    /// Housekeeping sweep interval. `None` disables the sweep.
    pub sweep_interval: Option<Duration>,
    pub store: StoreBackend,
}

impl ServerConfig {
    /// Load configuration from the process environment.
    ///
    /// | Env Var                   | Default                    |
    /// |---------------------------|----------------------------|
    /// | `HOST`                    | `0.0.0.0`                  |
    /// | `PORT`                    | `3000`                     |
    /// | `CORS_ORIGINS`            | `http://localhost:5173`    |
    /// | `REQUEST_TIMEOUT_SECS`    | `30`                       |
    /// | `SESSION_TTL_SECS`        | `360`                      |
    /// | `CODE_MAX_ATTEMPTS`       | `5`                        |
    /// | `SWEEP_INTERVAL_SECS`     | `0` (disabled)             |
    /// | `STORE_BACKEND`           | `postgres`                 |
    /// | `DATABASE_URL`            | required for `postgres`    |
    /// | `DB_MAX_CONNECTIONS`      | `20`                       |
    /// | `DB_ACQUIRE_TIMEOUT_SECS` | `5`                        |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = lookup("HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port: u16 = parse_or(&lookup, "PORT", 3000)?;

        let cors_origins: Vec<String> = lookup("CORS_ORIGINS")
            .unwrap_or_else(|| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        for origin in &cors_origins {
            if let Err(e) = origin.parse::<HeaderValue>() {
                return Err(ConfigError::Invalid {
                    var: "CORS_ORIGINS",
                    value: origin.clone(),
                    reason: e.to_string(),
                });
            }
        }

        let request_timeout_secs: u64 = parse_or(&lookup, "REQUEST_TIMEOUT_SECS", 30)?;

        let ttl_secs: i64 = parse_or(&lookup, "SESSION_TTL_SECS", DEFAULT_SESSION_TTL_SECS)?;
        if !(1..=MAX_SESSION_TTL_SECS).contains(&ttl_secs) {
            return Err(ConfigError::Invalid {
                var: "SESSION_TTL_SECS",
                value: ttl_secs.to_string(),
                reason: format!("must be between 1 and {MAX_SESSION_TTL_SECS}"),
            });
        }

        let max_code_attempts: u32 =
            parse_or(&lookup, "CODE_MAX_ATTEMPTS", DEFAULT_MAX_CODE_ATTEMPTS)?;
        if max_code_attempts == 0 {
            return Err(ConfigError::Invalid {
                var: "CODE_MAX_ATTEMPTS",
                value: "0".into(),
                reason: "must be at least 1".into(),
            });
        }

        let sweep_secs: u64 = parse_or(&lookup, "SWEEP_INTERVAL_SECS", 0)?;
        let sweep_interval = (sweep_secs > 0).then(|| Duration::from_secs(sweep_secs));

        let store = match lookup("STORE_BACKEND").as_deref().unwrap_or("postgres") {
            "postgres" => {
                let database_url = lookup("DATABASE_URL")
                    .filter(|url| !url.is_empty())
                    .ok_or(ConfigError::Missing("DATABASE_URL"))?;
                let defaults = PoolSettings::default();
                let max_connections: u32 =
                    parse_or(&lookup, "DB_MAX_CONNECTIONS", defaults.max_connections)?;
                let acquire_secs: u64 = parse_or(
                    &lookup,
                    "DB_ACQUIRE_TIMEOUT_SECS",
                    defaults.acquire_timeout.as_secs(),
                )?;
                StoreBackend::Postgres {
                    database_url,
                    pool: PoolSettings {
                        max_connections,
                        acquire_timeout: Duration::from_secs(acquire_secs),
                    },
                }
            }
            "memory" => StoreBackend::Memory,
            other => {
                return Err(ConfigError::Invalid {
                    var: "STORE_BACKEND",
                    value: other.to_string(),
                    reason: "expected 'postgres' or 'memory'".into(),
                })
            }
        };

        Ok(Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            registry: RegistrySettings {
                ttl: chrono::Duration::seconds(ttl_secs),
                max_code_attempts,
            },
            sweep_interval,
            store,
        })
    }
}

fn parse_or<T, F>(lookup: &F, var: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(var) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            var,
            value: raw.clone(),
            reason: e.to_string(),
        }),
    }
}
