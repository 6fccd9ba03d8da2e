//! Configuration
//!
//! Settings for stores and query caches. Values come from JSON (for example an
//! application settings file) or from `ROSTER_*` environment variables, and
//! fall back to defaults field by field.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::store::DEFAULT_LOG_CAPACITY;

/// Environment variable overriding `store.action_log_capacity`.
pub const ENV_ACTION_LOG_CAPACITY: &str = "ROSTER_ACTION_LOG_CAPACITY";

/// Environment variable overriding `cache.stale_after_ms`.
pub const ENV_CACHE_STALE_MS: &str = "ROSTER_CACHE_STALE_MS";

/// Errors raised while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("malformed configuration: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("{var}={value:?} is not valid: {reason}")]
    InvalidVar {
        var: &'static str,
        value: String,
        reason: String,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Store settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// How many dispatched actions the action log retains.
    pub action_log_capacity: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            action_log_capacity: DEFAULT_LOG_CAPACITY,
        }
    }
}

/// Query cache settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Age after which a successful entry is refetched by `ensure`.
    /// `None` keeps entries fresh until they are invalidated.
    pub stale_after_ms: Option<u64>,
}

impl CacheConfig {
    pub fn stale_after(&self) -> Option<Duration> {
        self.stale_after_ms.map(Duration::from_millis)
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RosterConfig {
    pub store: StoreConfig,
    pub cache: CacheConfig,
}

impl RosterConfig {
    /// Parse a JSON document. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults overridden by `ROSTER_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each variable.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(value) = lookup(ENV_ACTION_LOG_CAPACITY) {
            config.store.action_log_capacity =
                parse_var(ENV_ACTION_LOG_CAPACITY, &value)?;
        }
        if let Some(value) = lookup(ENV_CACHE_STALE_MS) {
            config.cache.stale_after_ms = if value.trim().is_empty() {
                None
            } else {
                Some(parse_var(ENV_CACHE_STALE_MS, &value)?)
            };
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.store.action_log_capacity == 0 {
            return Err(ConfigError::Invalid(
                "store.action_log_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_var<T>(var: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::InvalidVar {
        var,
        value: value.to_string(),
        reason: e.to_string(),
    })
}
