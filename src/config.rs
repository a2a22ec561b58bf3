//! Configuration Module
//!
//! Handles loading and managing engine configuration from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::cache::LruConfig;
use crate::error::{CacheError, Result};
use crate::memo::MemoConfig;
use crate::response::ResponseCacheConfig;
use crate::warmer::WarmerConfig;

/// Engine configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
/// TTL values of `0` mean "never expires".
#[derive(Debug, Clone)]
pub struct Config {
    /// Maximum number of entries in the general-purpose LRU store
    pub max_entries: usize,
    /// Default TTL in seconds for the general-purpose LRU store
    pub default_ttl: u64,
    /// HTTP server port
    pub server_port: u16,
    /// Background prune task interval in seconds
    pub cleanup_interval: u64,

    /// Maximum number of cached responses
    pub response_max_entries: usize,
    /// TTL in seconds for cached responses
    pub response_ttl: u64,
    /// Whether cached responses get an ETag by default
    pub generate_etag: bool,
    /// Bodies at least this large are stored gzip-compressed (0 disables)
    pub compression_threshold: usize,
    /// Bodies larger than this pass through uncached
    pub max_body_bytes: usize,

    /// Maximum number of memoized results
    pub memo_max_entries: usize,
    /// Default TTL in seconds for memoized results
    pub memo_ttl: u64,
    /// Serialize concurrent misses for the same key
    pub memo_single_flight: bool,

    /// Maximum warmup operations in flight at once
    pub warmup_max_concurrency: usize,
    /// Per-attempt warmup timeout in milliseconds
    pub warmup_timeout_ms: u64,
    /// Total attempts per route warm
    pub warmup_retry_attempts: u32,
    /// Fixed delay between attempts in milliseconds
    pub warmup_retry_delay_ms: u64,
    /// Periodic warm interval in seconds (0 disables periodic warming)
    pub warmup_interval: u64,
    /// Routes below this priority are skipped when low priority is skipped
    pub warmup_min_priority: u32,
    /// Maximum routes dispatched per warm cycle
    pub warmup_max_routes: usize,
}

/// Reads and parses an environment variable, falling back to `default`.
fn env_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Converts a seconds value into an optional TTL where 0 means none.
fn ttl_from_secs(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `MAX_ENTRIES` (1000), `DEFAULT_TTL` (300), `SERVER_PORT` (3000), `CLEANUP_INTERVAL` (60)
    /// - `RESPONSE_CACHE_MAX_ENTRIES` (500), `RESPONSE_CACHE_TTL` (300), `GENERATE_ETAG` (true),
    ///   `COMPRESSION_THRESHOLD` (1024), `MAX_BODY_BYTES` (5 MiB)
    /// - `MEMO_MAX_ENTRIES` (1000), `MEMO_TTL` (300), `MEMO_SINGLE_FLIGHT` (true)
    /// - `WARMUP_MAX_CONCURRENCY` (5), `WARMUP_TIMEOUT_MS` (10000), `WARMUP_RETRY_ATTEMPTS` (3),
    ///   `WARMUP_RETRY_DELAY_MS` (1000), `WARMUP_INTERVAL` (0), `WARMUP_MIN_PRIORITY` (30),
    ///   `WARMUP_MAX_ROUTES` (100)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_entries: env_or("MAX_ENTRIES", defaults.max_entries),
            default_ttl: env_or("DEFAULT_TTL", defaults.default_ttl),
            server_port: env_or("SERVER_PORT", defaults.server_port),
            cleanup_interval: env_or("CLEANUP_INTERVAL", defaults.cleanup_interval),
            response_max_entries: env_or(
                "RESPONSE_CACHE_MAX_ENTRIES",
                defaults.response_max_entries,
            ),
            response_ttl: env_or("RESPONSE_CACHE_TTL", defaults.response_ttl),
            generate_etag: env_or("GENERATE_ETAG", defaults.generate_etag),
            compression_threshold: env_or(
                "COMPRESSION_THRESHOLD",
                defaults.compression_threshold,
            ),
            max_body_bytes: env_or("MAX_BODY_BYTES", defaults.max_body_bytes),
            memo_max_entries: env_or("MEMO_MAX_ENTRIES", defaults.memo_max_entries),
            memo_ttl: env_or("MEMO_TTL", defaults.memo_ttl),
            memo_single_flight: env_or("MEMO_SINGLE_FLIGHT", defaults.memo_single_flight),
            warmup_max_concurrency: env_or(
                "WARMUP_MAX_CONCURRENCY",
                defaults.warmup_max_concurrency,
            ),
            warmup_timeout_ms: env_or("WARMUP_TIMEOUT_MS", defaults.warmup_timeout_ms),
            warmup_retry_attempts: env_or(
                "WARMUP_RETRY_ATTEMPTS",
                defaults.warmup_retry_attempts,
            ),
            warmup_retry_delay_ms: env_or(
                "WARMUP_RETRY_DELAY_MS",
                defaults.warmup_retry_delay_ms,
            ),
            warmup_interval: env_or("WARMUP_INTERVAL", defaults.warmup_interval),
            warmup_min_priority: env_or("WARMUP_MIN_PRIORITY", defaults.warmup_min_priority),
            warmup_max_routes: env_or("WARMUP_MAX_ROUTES", defaults.warmup_max_routes),
        }
    }

    /// Rejects values no component can be constructed with.
    pub fn validate(&self) -> Result<()> {
        let capacities = [
            ("MAX_ENTRIES", self.max_entries),
            ("RESPONSE_CACHE_MAX_ENTRIES", self.response_max_entries),
            ("MEMO_MAX_ENTRIES", self.memo_max_entries),
            ("WARMUP_MAX_CONCURRENCY", self.warmup_max_concurrency),
        ];
        for (name, value) in capacities {
            if value == 0 {
                return Err(CacheError::Configuration(format!(
                    "{} must be greater than 0",
                    name
                )));
            }
        }
        if self.warmup_timeout_ms == 0 {
            return Err(CacheError::Configuration(
                "WARMUP_TIMEOUT_MS must be greater than 0".to_string(),
            ));
        }
        if self.cleanup_interval == 0 {
            return Err(CacheError::Configuration(
                "CLEANUP_INTERVAL must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Settings for the general-purpose LRU store.
    pub fn lru_config(&self) -> LruConfig {
        LruConfig {
            max_entries: self.max_entries,
            default_ttl: ttl_from_secs(self.default_ttl),
            ..LruConfig::default()
        }
    }

    /// Settings for the streaming response cache.
    pub fn response_cache_config(&self) -> ResponseCacheConfig {
        ResponseCacheConfig {
            max_entries: self.response_max_entries,
            ttl: ttl_from_secs(self.response_ttl),
            generate_etag: self.generate_etag,
            compression_threshold: self.compression_threshold,
            max_body_bytes: self.max_body_bytes,
            ..ResponseCacheConfig::default()
        }
    }

    /// Settings for the memoization layer.
    pub fn memo_config(&self) -> MemoConfig {
        MemoConfig {
            max_entries: self.memo_max_entries,
            default_ttl: ttl_from_secs(self.memo_ttl),
            single_flight: self.memo_single_flight,
        }
    }

    /// Settings for the cache warmer.
    pub fn warmer_config(&self) -> WarmerConfig {
        WarmerConfig {
            max_concurrency: self.warmup_max_concurrency,
            timeout: Duration::from_millis(self.warmup_timeout_ms),
            retry_attempts: self.warmup_retry_attempts,
            retry_delay: Duration::from_millis(self.warmup_retry_delay_ms),
            min_priority: self.warmup_min_priority,
            max_routes: self.warmup_max_routes,
        }
    }

    /// Interval for the periodic warm loop, if enabled.
    pub fn warmup_interval(&self) -> Option<Duration> {
        ttl_from_secs(self.warmup_interval)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_entries: 1000,
            default_ttl: 300,
            server_port: 3000,
            cleanup_interval: 60,
            response_max_entries: 500,
            response_ttl: 300,
            generate_etag: true,
            compression_threshold: 1024,
            max_body_bytes: 5 * 1024 * 1024,
            memo_max_entries: 1000,
            memo_ttl: 300,
            memo_single_flight: true,
            warmup_max_concurrency: 5,
            warmup_timeout_ms: 10_000,
            warmup_retry_attempts: 3,
            warmup_retry_delay_ms: 1000,
            warmup_interval: 0,
            warmup_min_priority: 30,
            warmup_max_routes: 100,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.max_entries, 1000);
        assert_eq!(config.default_ttl, 300);
        assert_eq!(config.server_port, 3000);
        assert_eq!(config.warmup_max_concurrency, 5);
        assert!(config.generate_etag);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_from_env_defaults() {
        // Clear any existing env vars to test defaults
        env::remove_var("MAX_ENTRIES");
        env::remove_var("DEFAULT_TTL");
        env::remove_var("SERVER_PORT");
        env::remove_var("WARMUP_RETRY_ATTEMPTS");

        let config = Config::from_env();
        assert_eq!(config.max_entries, 1000);
        assert_eq!(config.default_ttl, 300);
        assert_eq!(config.server_port, 3000);
        assert_eq!(config.warmup_retry_attempts, 3);
    }

    #[test]
    fn test_validate_rejects_zero_capacity() {
        let config = Config {
            memo_max_entries: 0,
            ..Config::default()
        };
        assert!(matches!(
            config.validate(),
            Err(CacheError::Configuration(msg)) if msg.contains("MEMO_MAX_ENTRIES")
        ));
    }

    #[test]
    fn test_zero_ttl_means_no_expiry() {
        let config = Config {
            default_ttl: 0,
            memo_ttl: 60,
            ..Config::default()
        };
        assert!(config.lru_config().default_ttl.is_none());
        assert_eq!(
            config.memo_config().default_ttl,
            Some(Duration::from_secs(60))
        );
        assert!(config.warmup_interval().is_none());
    }

    #[test]
    fn test_warmer_config_conversion() {
        let warmer = Config::default().warmer_config();
        assert_eq!(warmer.timeout, Duration::from_millis(10_000));
        assert_eq!(warmer.retry_delay, Duration::from_millis(1000));
        assert_eq!(warmer.max_routes, 100);
    }
}
