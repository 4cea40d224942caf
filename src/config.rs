//! Configuration Module
//!
//! Engine configuration passed at construction, plus the server configuration
//! the HTTP binary loads from environment variables.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{CacheError, Result};

/// Ranking used by the eviction controller when selecting victims.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EvictionOrder {
    /// Least recently written entries go first
    #[default]
    OldestWrite,
    /// Entries with the largest weight go first
    LargestFirst,
}

/// Where the eviction controller reads memory usage from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MemorySource {
    /// Sum of the tracked entry weights
    #[default]
    Tracked,
    /// Resident set size of the process
    ProcessRss,
}

impl FromStr for MemorySource {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tracked" => Ok(MemorySource::Tracked),
            "rss" => Ok(MemorySource::ProcessRss),
            other => Err(CacheError::InvalidConfig(format!(
                "unknown memory probe {other:?}, expected \"tracked\" or \"rss\""
            ))),
        }
    }
}

// == Cache Config ==
/// Engine configuration.
///
/// The defaults mirror a short-lived scratch store: one second TTL, a reaper
/// sweeping every second with a two second grace window, and eviction of a
/// fifth of the live entries once tracked usage passes 64 MiB.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// TTL applied by `set`; `None` means entries never expire
    pub default_ttl: Option<Duration>,
    /// Interval between reaper sweeps
    pub reaper_interval: Duration,
    /// How long an entry must have been expired before the reaper removes it
    pub grace_period: Duration,
    /// Interval between memory pressure checks
    pub eviction_interval: Duration,
    /// Soft memory limit in bytes, 0 disables eviction
    pub memory_soft_limit_bytes: u64,
    /// Fraction of live entries removed per eviction cycle, in [0, 1]
    pub evict_fraction: f64,
    /// Number of shards, fixed for the cache's lifetime
    pub shard_count: usize,
    /// Victim ranking for eviction
    pub eviction_order: EvictionOrder,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl: Some(Duration::from_secs(1)),
            reaper_interval: Duration::from_secs(1),
            grace_period: Duration::from_secs(2),
            eviction_interval: Duration::from_secs(1),
            memory_soft_limit_bytes: 64 * 1024 * 1024,
            evict_fraction: 0.2,
            shard_count: 64,
            eviction_order: EvictionOrder::OldestWrite,
        }
    }
}

impl CacheConfig {
    /// Creates a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Derives reaper timing from a single TTL: entries live for `ttl`,
    /// are held dead for `2 * ttl` and the reaper runs every `ttl`.
    pub fn for_ttl(ttl: Duration) -> Self {
        Self {
            default_ttl: Some(ttl),
            reaper_interval: ttl,
            grace_period: ttl * 2,
            ..Self::default()
        }
    }

    pub fn with_default_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.default_ttl = ttl;
        self
    }

    pub fn with_reaper_interval(mut self, interval: Duration) -> Self {
        self.reaper_interval = interval;
        self
    }

    pub fn with_grace_period(mut self, grace: Duration) -> Self {
        self.grace_period = grace;
        self
    }

    pub fn with_eviction_interval(mut self, interval: Duration) -> Self {
        self.eviction_interval = interval;
        self
    }

    pub fn with_memory_soft_limit(mut self, bytes: u64) -> Self {
        self.memory_soft_limit_bytes = bytes;
        self
    }

    pub fn with_evict_fraction(mut self, fraction: f64) -> Self {
        self.evict_fraction = fraction;
        self
    }

    pub fn with_shard_count(mut self, shards: usize) -> Self {
        self.shard_count = shards;
        self
    }

    pub fn with_eviction_order(mut self, order: EvictionOrder) -> Self {
        self.eviction_order = order;
        self
    }

    /// Checks the configuration for values the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.shard_count == 0 {
            return Err(CacheError::InvalidConfig(
                "shard_count must be at least 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.evict_fraction) {
            return Err(CacheError::InvalidConfig(format!(
                "evict_fraction must be within [0, 1], got {}",
                self.evict_fraction
            )));
        }
        if self.reaper_interval.is_zero() || self.eviction_interval.is_zero() {
            return Err(CacheError::InvalidConfig(
                "background intervals must be non-zero".to_string(),
            ));
        }
        if self.default_ttl.is_some_and(|ttl| ttl.is_zero()) {
            return Err(CacheError::InvalidConfig(
                "default_ttl must be non-zero; use None for no expiration".to_string(),
            ));
        }
        Ok(())
    }
}

// == Server Config ==
/// Configuration of the HTTP binary.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Engine configuration
    pub cache: CacheConfig,
    /// HTTP server port
    pub server_port: u16,
    /// Directory for the log-structured backend; in-memory when unset
    pub data_dir: Option<PathBuf>,
    /// Memory usage source for eviction
    pub memory_source: MemorySource,
}

impl ServerConfig {
    /// Loads the server configuration from environment variables.
    ///
    /// # Environment Variables
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `DEFAULT_TTL` - Default TTL in seconds, 0 disables expiration (default: 1)
    /// - `SHARD_COUNT` - Number of shards (default: 64)
    /// - `REAPER_INTERVAL_MS` - Reaper interval (default: 1000)
    /// - `GRACE_PERIOD_MS` - Reaper grace window (default: 2000)
    /// - `EVICTION_INTERVAL_MS` - Eviction check interval (default: 1000)
    /// - `MEMORY_SOFT_LIMIT_MB` - Eviction threshold, 0 disables (default: 64)
    /// - `EVICT_FRACTION` - Fraction evicted per cycle (default: 0.2)
    /// - `DATA_DIR` - Enables the log-structured backend in this directory
    /// - `MEMORY_PROBE` - `tracked` entry weights or process `rss` (default: tracked)
    pub fn from_env() -> Self {
        let defaults = CacheConfig::default();

        let default_ttl = match parse_env::<u64>("DEFAULT_TTL") {
            Some(0) => None,
            Some(secs) => Some(Duration::from_secs(secs)),
            None => defaults.default_ttl,
        };

        let cache = CacheConfig {
            default_ttl,
            shard_count: parse_env("SHARD_COUNT").unwrap_or(defaults.shard_count),
            reaper_interval: parse_env("REAPER_INTERVAL_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.reaper_interval),
            grace_period: parse_env("GRACE_PERIOD_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.grace_period),
            eviction_interval: parse_env("EVICTION_INTERVAL_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.eviction_interval),
            memory_soft_limit_bytes: parse_env::<u64>("MEMORY_SOFT_LIMIT_MB")
                .map(|mb| mb.saturating_mul(1024 * 1024))
                .unwrap_or(defaults.memory_soft_limit_bytes),
            evict_fraction: parse_env("EVICT_FRACTION").unwrap_or(defaults.evict_fraction),
            ..defaults
        };

        Self {
            cache,
            server_port: parse_env("SERVER_PORT").unwrap_or(3000),
            data_dir: env::var("DATA_DIR").ok().map(PathBuf::from),
            memory_source: parse_env("MEMORY_PROBE").unwrap_or_default(),
        }
    }
}

fn parse_env<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.parse().ok())
}
