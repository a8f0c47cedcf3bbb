use std::time::Duration;

use crate::config::helpers::parse_optional_env;
use crate::error::ConfigError;

/// Request gate configuration.
#[derive(Debug, Clone)]
pub struct GateConfig {
    /// Minimum spacing between the starts of two backend calls.
    pub min_interval: Duration,
    /// Wait before retrying a rate-limited call when the backend gives no reset time.
    pub rate_limit_fallback: Duration,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            min_interval: Duration::from_millis(1000),
            rate_limit_fallback: Duration::from_secs(60),
        }
    }
}

impl GateConfig {
    /// A gate that never delays. Useful for tests and bulk tooling.
    pub fn unthrottled() -> Self {
        Self {
            min_interval: Duration::ZERO,
            rate_limit_fallback: Duration::ZERO,
        }
    }

    pub(crate) fn resolve() -> Result<Self, ConfigError> {
        Ok(Self {
            min_interval: Duration::from_millis(parse_optional_env(
                "REQUEST_GATE_INTERVAL_MS",
                1000,
            )?),
            rate_limit_fallback: Duration::from_secs(parse_optional_env(
                "RATE_LIMIT_FALLBACK_SECS",
                60,
            )?),
        })
    }
}

/// Result cache configuration.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Freshness window for cached reads.
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(300), // 5 minutes
        }
    }
}

impl CacheConfig {
    pub(crate) fn resolve() -> Result<Self, ConfigError> {
        Ok(Self {
            ttl: Duration::from_secs(parse_optional_env("CACHE_TTL_SECS", 300)?),
        })
    }
}

/// Default-data seeding configuration.
#[derive(Debug, Clone)]
pub struct SeedConfig {
    /// Pause between consecutive seed writes.
    pub delay: Duration,
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            delay: Duration::from_millis(500),
        }
    }
}

impl SeedConfig {
    pub(crate) fn resolve() -> Result<Self, ConfigError> {
        Ok(Self {
            delay: Duration::from_millis(parse_optional_env("SEED_DELAY_MS", 500)?),
        })
    }
}
