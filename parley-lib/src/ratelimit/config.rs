use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::Result;

/// Default number of buckets that may drain at the same time
const DEFAULT_MAX_CONCURRENT_DRAINS: usize = 64;

/// Default number of requests a bucket sends before giving up its drain
/// permit to other waiting buckets
const DEFAULT_MAX_DRAIN_BATCH: usize = 32;

/// Default upper bound for any server supplied retry-after value
const DEFAULT_MAX_RETRY_AFTER: Duration = Duration::from_secs(3600);

/// How a [`crate::Route`] is mapped to the bucket that paces it
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BucketStrategy {
    /// Group routes by the quota-group hash the server reports.
    /// Routes whose hash is not known yet share one unclassified bucket.
    #[default]
    Hash,
    /// Give every template and major parameter combination its own bucket
    /// right away, without waiting for the server to reveal its grouping.
    BaseRoute,
}

/// Rate limiter configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// How routes are grouped into buckets
    #[serde(default)]
    pub strategy: BucketStrategy,

    /// Maximum number of buckets that drain concurrently
    #[serde(default = "default_max_concurrent_drains")]
    pub max_concurrent_drains: usize,

    /// Maximum number of requests one drain sends in a row before its
    /// bucket queues again for a drain permit
    #[serde(default = "default_max_drain_batch")]
    pub max_drain_batch: usize,

    /// Upper bound applied to server supplied retry-after durations
    #[serde(default = "default_max_retry_after", with = "humantime_serde")]
    pub max_retry_after: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            strategy: BucketStrategy::default(),
            max_concurrent_drains: default_max_concurrent_drains(),
            max_drain_batch: default_max_drain_batch(),
            max_retry_after: default_max_retry_after(),
        }
    }
}

const fn default_max_concurrent_drains() -> usize {
    DEFAULT_MAX_CONCURRENT_DRAINS
}

const fn default_max_drain_batch() -> usize {
    DEFAULT_MAX_DRAIN_BATCH
}

const fn default_max_retry_after() -> Duration {
    DEFAULT_MAX_RETRY_AFTER
}

impl RateLimitConfig {
    /// Parse a configuration from a TOML fragment, using defaults for
    /// missing values
    ///
    /// # Errors
    ///
    /// Returns [`crate::ErrorKind::InvalidConfig`] if the input is not valid
    /// TOML or contains values of the wrong type.
    pub fn from_toml(input: &str) -> Result<Self> {
        let mut config: Self = toml::from_str(input)?;
        // A runner without permits would never drain anything
        config.max_concurrent_drains = config.max_concurrent_drains.max(1);
        config.max_drain_batch = config.max_drain_batch.max(1);
        Ok(config)
    }

    /// Use the given bucket strategy
    #[must_use]
    pub const fn with_strategy(mut self, strategy: BucketStrategy) -> Self {
        self.strategy = strategy;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_rate_limit_config() {
        let config = RateLimitConfig::default();
        assert_eq!(config.strategy, BucketStrategy::Hash);
        assert_eq!(config.max_concurrent_drains, 64);
        assert_eq!(config.max_drain_batch, 32);
        assert_eq!(config.max_retry_after, Duration::from_secs(3600));
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = RateLimitConfig::from_toml(r#"strategy = "base-route""#).unwrap();
        assert_eq!(
            config,
            RateLimitConfig::default().with_strategy(BucketStrategy::BaseRoute)
        );
    }

    #[test]
    fn test_full_toml() {
        let config = RateLimitConfig::from_toml(
            r#"
            strategy = "hash"
            max_concurrent_drains = 8
            max_drain_batch = 4
            max_retry_after = "5m"
            "#,
        )
        .unwrap();
        assert_eq!(config.max_concurrent_drains, 8);
        assert_eq!(config.max_drain_batch, 4);
        assert_eq!(config.max_retry_after, Duration::from_secs(300));
    }

    #[test]
    fn test_zero_drains_is_raised() {
        let config =
            RateLimitConfig::from_toml("max_concurrent_drains = 0\nmax_drain_batch = 0").unwrap();
        assert_eq!(config.max_concurrent_drains, 1);
        assert_eq!(config.max_drain_batch, 1);
    }

    #[test]
    fn test_invalid_toml() {
        assert!(RateLimitConfig::from_toml(r#"strategy = "fastest""#).is_err());
    }

    #[test]
    fn test_config_serialization() {
        let config = RateLimitConfig {
            strategy: BucketStrategy::BaseRoute,
            max_concurrent_drains: 15,
            max_drain_batch: 2,
            max_retry_after: Duration::from_millis(1500),
        };

        let toml = toml::to_string(&config).unwrap();
        let deserialized: RateLimitConfig = toml::from_str(&toml).unwrap();

        assert_eq!(config, deserialized);
    }
}
