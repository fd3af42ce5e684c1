//! Process configuration, read from environment variables.
//!
//! | Variable | Default |
//! |----------|---------|
//! | `BIND_ADDR` | `0.0.0.0:8080` |
//! | `USE_PERSISTENT_STORES` | `false` |
//! | `DATABASE_URL` | required when persistent |
//! | `DATABASE_MAX_CONNECTIONS` | `10` |
//! | `REDIS_URL` | `redis://localhost:6379` |
//! | `COUNTER_KEY_PREFIX` | `a` |
//! | `COUNTER_SCAN_BATCH` | `100` |
//! | `STORE_TIMEOUT_SECS` | `10` |
//! | `LOG_FORMAT` | `json` |

use core::str::FromStr;
use std::net::SocketAddr;
use std::time::Duration;

use stockroom_infra::CounterKeys;
use stockroom_observability::LogFormat;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} must be set when USE_PERSISTENT_STORES=true")]
    Missing { var: &'static str },

    #[error("{var}={value:?} is invalid: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub use_persistent_stores: bool,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub redis_url: String,
    pub counter_key_prefix: String,
    pub counter_scan_batch: usize,
    pub store_timeout: Duration,
    pub log_format: LogFormat,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            use_persistent_stores: false,
            database_url: None,
            database_max_connections: 10,
            redis_url: "redis://localhost:6379".to_string(),
            counter_key_prefix: "a".to_string(),
            counter_scan_batch: 100,
            store_timeout: Duration::from_secs(10),
            log_format: LogFormat::Json,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

        let use_persistent_stores = match get("USE_PERSISTENT_STORES") {
            Some(raw) => parse_bool("USE_PERSISTENT_STORES", &raw)?,
            None => defaults.use_persistent_stores,
        };
        let database_url = get("DATABASE_URL");
        if use_persistent_stores && database_url.is_none() {
            return Err(ConfigError::Missing { var: "DATABASE_URL" });
        }

        let counter_key_prefix = get("COUNTER_KEY_PREFIX").unwrap_or(defaults.counter_key_prefix);
        if !CounterKeys::is_valid_prefix(&counter_key_prefix) {
            return Err(ConfigError::Invalid {
                var: "COUNTER_KEY_PREFIX",
                value: counter_key_prefix,
                reason: "must be non-empty without ':', whitespace or glob characters".to_string(),
            });
        }

        let counter_scan_batch = parse_or("COUNTER_SCAN_BATCH", get("COUNTER_SCAN_BATCH"), defaults.counter_scan_batch)?;
        if counter_scan_batch == 0 {
            return Err(invalid("COUNTER_SCAN_BATCH", "0", "must be positive"));
        }
        let timeout_secs: u64 = parse_or("STORE_TIMEOUT_SECS", get("STORE_TIMEOUT_SECS"), defaults.store_timeout.as_secs())?;
        if timeout_secs == 0 {
            return Err(invalid("STORE_TIMEOUT_SECS", "0", "must be positive"));
        }

        Ok(Self {
            bind_addr: parse_or("BIND_ADDR", get("BIND_ADDR"), defaults.bind_addr)?,
            use_persistent_stores,
            database_url,
            database_max_connections: parse_or(
                "DATABASE_MAX_CONNECTIONS",
                get("DATABASE_MAX_CONNECTIONS"),
                defaults.database_max_connections,
            )?,
            redis_url: get("REDIS_URL").unwrap_or(defaults.redis_url),
            counter_key_prefix,
            counter_scan_batch,
            store_timeout: Duration::from_secs(timeout_secs),
            log_format: parse_or("LOG_FORMAT", get("LOG_FORMAT"), defaults.log_format)?,
        })
    }
}

fn parse_or<T>(var: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: core::fmt::Display,
{
    match raw {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| invalid(var, &raw, e.to_string())),
    }
}

fn parse_bool(var: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" => Ok(false),
        _ => Err(invalid(var, raw, "expected true or false")),
    }
}

fn invalid(var: &'static str, value: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        var,
        value: value.to_string(),
        reason: reason.into(),
    }
}
