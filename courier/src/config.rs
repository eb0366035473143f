use std::env;
use std::time::Duration;

use courier_core::{CourierError, Result};
use storage::DEFAULT_MAX_DEPTH;

use crate::retry::RetryPolicy;

/// Service configuration, loaded from environment variables.
#[derive(Debug, Clone, PartialEq)]
pub struct CourierConfig {
    pub database_url: String,
    pub log_file: String,
    /// Depth bound for thread traversal and for new replies.
    pub max_thread_depth: u32,
    pub retry_max_attempts: u32,
    pub retry_backoff: Duration,
    /// Freshness window of cached threads. Zero disables the cache.
    pub thread_cache_ttl: Duration,
}

impl Default for CourierConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite://courier.db".to_string(),
            log_file: "logs/courier.log".to_string(),
            max_thread_depth: DEFAULT_MAX_DEPTH,
            retry_max_attempts: 3,
            retry_backoff: Duration::from_millis(20),
            thread_cache_ttl: Duration::from_secs(30),
        }
    }
}

impl CourierConfig {
    /// Loads configuration from the environment; unset variables take their defaults.
    pub fn load() -> Result<Self> {
        let defaults = Self::default();

        let database_url = env::var("DATABASE_URL").unwrap_or(defaults.database_url);
        let log_file = env::var("LOG_FILE").unwrap_or(defaults.log_file);
        let max_thread_depth = parse_var("MAX_THREAD_DEPTH", defaults.max_thread_depth)?;
        if max_thread_depth == 0 {
            return Err(CourierError::Config(
                "MAX_THREAD_DEPTH must be at least 1".to_string(),
            ));
        }
        let retry_max_attempts = parse_var("RETRY_MAX_ATTEMPTS", defaults.retry_max_attempts)?;
        let retry_backoff = Duration::from_millis(parse_var(
            "RETRY_BACKOFF_MS",
            defaults.retry_backoff.as_millis() as u64,
        )?);
        let thread_cache_ttl = Duration::from_secs(parse_var(
            "THREAD_CACHE_TTL_SECS",
            defaults.thread_cache_ttl.as_secs(),
        )?);

        Ok(Self {
            database_url,
            log_file,
            max_thread_depth,
            retry_max_attempts,
            retry_backoff,
            thread_cache_ttl,
        })
    }

    /// Defaults with the given database location.
    pub fn for_url(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            ..Self::default()
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.retry_max_attempts,
            initial_backoff: self.retry_backoff,
            ..RetryPolicy::default()
        }
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> Result<T> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| CourierError::Config(format!("{} is not a valid number: {:?}", name, raw))),
        Err(_) => Ok(default),
    }
}
