//! # Service Configuration
//!
//! Settings are read from the process environment (after `.env` has been
//! loaded with `dotenv`). Every key except `DATABASE_URL` has a default.

use std::env;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_MAX_CONNECTIONS: u32 = 20;
pub const DEFAULT_LOG_LEVEL: &str = "info";
pub const DEFAULT_CACHE_WINDOW_SECS: u64 = 300;
pub const DEFAULT_PROBE_TIMEOUT_SECS: u64 = 5;
pub const DEFAULT_EXPECTED_TABLES: [&str; 3] = ["accounts", "clients", "account_clients"];

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

/// Settings for the database health prober.
#[derive(Debug, Clone, PartialEq)]
pub struct HealthConfig {
    /// How long a non-forced check reuses the previous snapshot.
    pub cache_window: Duration,
    /// Upper bound for connecting and for running the probe queries.
    pub probe_timeout: Duration,
    pub expected_tables: Vec<String>,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            cache_window: Duration::from_secs(DEFAULT_CACHE_WINDOW_SECS),
            probe_timeout: Duration::from_secs(DEFAULT_PROBE_TIMEOUT_SECS),
            expected_tables: DEFAULT_EXPECTED_TABLES.iter().map(|t| t.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    /// `None` keeps actix's one-worker-per-core default.
    pub workers: Option<usize>,
    pub db_max_connections: u32,
    pub log_level: String,
    pub run_migrations: bool,
    pub health: HealthConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let database_url = get("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;

        let expected_tables = match get("HEALTH_EXPECTED_TABLES") {
            Some(list) => list
                .split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(String::from)
                .collect(),
            None => HealthConfig::default().expected_tables,
        };

        Ok(Self {
            database_url,
            host: get("HOST").unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: parse_or("PORT", get("PORT"), DEFAULT_PORT)?,
            workers: get("WORKERS")
                .map(|v| parse("WORKERS", &v))
                .transpose()?,
            db_max_connections: parse_or(
                "DB_MAX_CONNECTIONS",
                get("DB_MAX_CONNECTIONS"),
                DEFAULT_MAX_CONNECTIONS,
            )?,
            log_level: get("LOG_LEVEL").unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
            run_migrations: parse_flag("RUN_MIGRATIONS", get("RUN_MIGRATIONS"))?,
            health: HealthConfig {
                cache_window: Duration::from_secs(parse_or(
                    "HEALTH_CHECK_CACHE_TIMEOUT",
                    get("HEALTH_CHECK_CACHE_TIMEOUT"),
                    DEFAULT_CACHE_WINDOW_SECS,
                )?),
                probe_timeout: Duration::from_secs(parse_or(
                    "HEALTH_PROBE_TIMEOUT",
                    get("HEALTH_PROBE_TIMEOUT"),
                    DEFAULT_PROBE_TIMEOUT_SECS,
                )?),
                expected_tables,
            },
        })
    }
}

fn parse<T: FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Invalid {
        key,
        value: value.to_string(),
    })
}

fn parse_or<T: FromStr>(key: &'static str, value: Option<String>, default: T) -> Result<T, ConfigError> {
    match value {
        Some(v) => parse(key, &v),
        None => Ok(default),
    }
}

fn parse_flag(key: &'static str, value: Option<String>) -> Result<bool, ConfigError> {
    match value.as_deref().map(|v| v.trim().to_ascii_lowercase()) {
        None => Ok(false),
        Some(v) => match v.as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::Invalid {
                key,
                value: v,
            }),
        },
    }
}
