//! Application configuration loaded from environment variables.
//!
//! Fail-fast loading with validation: required variables must be present
//! and valid, or the application exits with a clear error message.

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use thiserror::Error;

use worklane_webhooks::services::delivery_service::{
    DEFAULT_BACKOFF_FACTOR, DEFAULT_INITIAL_RETRY_DELAY_SECS,
};
use worklane_webhooks::WorkerConfig;

/// Default listen address.
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8085";

/// Default log filter directive.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Default dispatch queue capacity.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {var}")]
    MissingVar { var: String },

    #[error("Invalid value for {var}: {message}")]
    InvalidValue { var: String, message: String },
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "pretty" => Ok(LogFormat::Pretty),
            other => Err(format!("Unknown log format: {other} (expected json|pretty)")),
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: SocketAddr,
    pub log_filter: String,
    pub log_format: LogFormat,
    pub worker_concurrency: usize,
    pub queue_capacity: usize,
    pub retry_sweep_secs: u64,
    pub cleanup_interval_secs: u64,
    pub retention_days: i64,
    pub allow_http: bool,
    pub initial_retry_delay_secs: i64,
    pub backoff_factor: f64,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let worker_defaults = WorkerConfig::default();

        Ok(Self {
            database_url: require_var("DATABASE_URL")?,
            bind_addr: parse_or_default(
                "BIND_ADDR",
                env::var("BIND_ADDR").ok(),
                DEFAULT_BIND_ADDR
                    .parse()
                    .expect("default bind addr is valid"),
            )?,
            log_filter: env::var("LOG_FILTER").unwrap_or_else(|_| DEFAULT_LOG_FILTER.to_string()),
            log_format: parse_or_default(
                "LOG_FORMAT",
                env::var("LOG_FORMAT").ok(),
                LogFormat::Json,
            )?,
            worker_concurrency: parse_or_default(
                "WEBHOOK_WORKER_CONCURRENCY",
                env::var("WEBHOOK_WORKER_CONCURRENCY").ok(),
                worker_defaults.concurrency,
            )?,
            queue_capacity: parse_or_default(
                "WEBHOOK_QUEUE_CAPACITY",
                env::var("WEBHOOK_QUEUE_CAPACITY").ok(),
                DEFAULT_QUEUE_CAPACITY,
            )?,
            retry_sweep_secs: parse_or_default(
                "WEBHOOK_RETRY_SWEEP_SECS",
                env::var("WEBHOOK_RETRY_SWEEP_SECS").ok(),
                worker_defaults.retry_sweep_interval_secs,
            )?,
            cleanup_interval_secs: parse_or_default(
                "WEBHOOK_CLEANUP_INTERVAL_SECS",
                env::var("WEBHOOK_CLEANUP_INTERVAL_SECS").ok(),
                worker_defaults.cleanup_interval_secs,
            )?,
            retention_days: parse_or_default(
                "WEBHOOK_RETENTION_DAYS",
                env::var("WEBHOOK_RETENTION_DAYS").ok(),
                worker_defaults.retention_days,
            )?,
            allow_http: parse_bool("WEBHOOK_ALLOW_HTTP", env::var("WEBHOOK_ALLOW_HTTP").ok())?,
            initial_retry_delay_secs: parse_or_default(
                "WEBHOOK_INITIAL_RETRY_DELAY_SECS",
                env::var("WEBHOOK_INITIAL_RETRY_DELAY_SECS").ok(),
                DEFAULT_INITIAL_RETRY_DELAY_SECS,
            )?,
            backoff_factor: parse_or_default(
                "WEBHOOK_BACKOFF_FACTOR",
                env::var("WEBHOOK_BACKOFF_FACTOR").ok(),
                DEFAULT_BACKOFF_FACTOR,
            )?,
        })
    }

    /// Worker configuration derived from the environment.
    #[must_use]
    pub fn worker_config(&self) -> WorkerConfig {
        WorkerConfig {
            concurrency: self.worker_concurrency,
            retry_sweep_interval_secs: self.retry_sweep_secs,
            cleanup_interval_secs: self.cleanup_interval_secs,
            retention_days: self.retention_days,
            ..WorkerConfig::default()
        }
    }
}

fn require_var(var: &str) -> Result<String, ConfigError> {
    env::var(var).map_err(|_| ConfigError::MissingVar {
        var: var.to_string(),
    })
}

/// Parse an optional raw value, falling back to a default when unset.
///
/// An unset variable takes the default; a set-but-invalid value is an
/// error rather than a silent fallback.
fn parse_or_default<T>(var: &str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        Some(value) => value.parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            var: var.to_string(),
            message: e.to_string(),
        }),
        None => Ok(default),
    }
}

/// Parse a boolean flag: unset means false.
fn parse_bool(var: &str, raw: Option<String>) -> Result<bool, ConfigError> {
    match raw.as_deref() {
        None | Some("") => Ok(false),
        Some("true") | Some("1") => Ok(true),
        Some("false") | Some("0") => Ok(false),
        Some(other) => Err(ConfigError::InvalidValue {
            var: var.to_string(),
            message: format!("Expected true|false, got: {other}"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_or_default_unset_uses_default() {
        let v: u64 = parse_or_default("X", None, 60).unwrap();
        assert_eq!(v, 60);
    }

    #[test]
    fn test_parse_or_default_set_overrides() {
        let v: u64 = parse_or_default("X", Some("5".to_string()), 60).unwrap();
        assert_eq!(v, 5);
    }

    #[test]
    fn test_parse_or_default_invalid_is_error() {
        let result: Result<u64, _> = parse_or_default("X", Some("not-a-number".to_string()), 60);
        let err = result.unwrap_err();
        assert!(err.to_string().contains("Invalid value for X"));
    }

    #[test]
    fn test_parse_bool_values() {
        assert!(!parse_bool("X", None).unwrap());
        assert!(parse_bool("X", Some("true".to_string())).unwrap());
        assert!(parse_bool("X", Some("1".to_string())).unwrap());
        assert!(!parse_bool("X", Some("false".to_string())).unwrap());
        assert!(parse_bool("X", Some("yes".to_string())).is_err());
    }

    #[test]
    fn test_log_format_parsing() {
        assert_eq!("json".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("pretty".parse::<LogFormat>().unwrap(), LogFormat::Pretty);
        assert_eq!("PRETTY".parse::<LogFormat>().unwrap(), LogFormat::Pretty);
        assert!("yaml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn test_default_bind_addr_parses() {
        let addr: SocketAddr = DEFAULT_BIND_ADDR.parse().unwrap();
        assert_eq!(addr.port(), 8085);
    }
}
