//! Query layer configuration with validation.

use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

/// Default wait for a synchronous or awaited query, in milliseconds.
pub const DEFAULT_QUERY_TIMEOUT_MS: u64 = 5000;

/// Query executor configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    /// How long a synchronous or awaited query waits for its reply.
    #[serde(with = "duration_ms")]
    pub query_timeout: Duration,
    /// How long an asynchronous callback stays registered without a reply.
    #[serde(with = "duration_ms")]
    pub pending_ttl: Duration,
    /// Period of the expired-callback sweep.
    #[serde(with = "duration_ms")]
    pub cleanup_interval: Duration,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            query_timeout: Duration::from_millis(DEFAULT_QUERY_TIMEOUT_MS),
            pending_ttl: Duration::from_secs(30),
            cleanup_interval: Duration::from_secs(5),
        }
    }
}

impl QueryConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `DT_QUERY_TIMEOUT_MS`: query timeout (default: 5000)
    /// - `DT_QUERY_PENDING_TTL_MS`: async callback TTL (default: 30000)
    /// - `DT_QUERY_CLEANUP_INTERVAL_MS`: sweep period (default: 5000)
    ///
    /// Unparseable values fall back to the default.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            query_timeout: env_millis("DT_QUERY_TIMEOUT_MS").unwrap_or(defaults.query_timeout),
            pending_ttl: env_millis("DT_QUERY_PENDING_TTL_MS").unwrap_or(defaults.pending_ttl),
            cleanup_interval: env_millis("DT_QUERY_CLEANUP_INTERVAL_MS")
                .unwrap_or(defaults.cleanup_interval),
        }
    }

    /// Configuration with a custom query timeout.
    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            query_timeout: timeout,
            ..Self::default()
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.query_timeout.is_zero() {
            return Err(ConfigError::InvalidTimeout(
                "query_timeout cannot be 0".into(),
            ));
        }
        if self.pending_ttl.is_zero() {
            return Err(ConfigError::InvalidTimeout("pending_ttl cannot be 0".into()));
        }
        if self.cleanup_interval.is_zero() {
            return Err(ConfigError::InvalidTimeout(
                "cleanup_interval cannot be 0".into(),
            ));
        }
        if self.pending_ttl < self.query_timeout {
            return Err(ConfigError::Invalid(
                "pending_ttl must not be shorter than query_timeout".into(),
            ));
        }
        Ok(())
    }
}

fn env_millis(name: &str) -> Option<Duration> {
    env::var(name)
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_millis)
}

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// Invalid timeout value
    #[error("invalid timeout: {0}")]
    InvalidTimeout(String),
    /// General configuration error
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Serde module for `Duration` as milliseconds (`"250ms"`, `"5s"` or a plain
/// millisecond count).
mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format!("{}ms", duration.as_millis()))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse_duration(&s).map_err(serde::de::Error::custom)
    }

    fn parse_duration(s: &str) -> Result<Duration, &'static str> {
        let s = s.trim();
        if let Some(ms) = s.strip_suffix("ms") {
            ms.trim()
                .parse::<u64>()
                .map(Duration::from_millis)
                .map_err(|_| "invalid milliseconds")
        } else if let Some(secs) = s.strip_suffix('s') {
            secs.trim()
                .parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|_| "invalid seconds")
        } else {
            s.parse::<u64>()
                .map(Duration::from_millis)
                .map_err(|_| "invalid duration format")
        }
    }
}
