//! Response DTOs for the cache server API
//!
//! Defines the structure of outgoing HTTP response bodies.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;

use crate::cache::CacheStats;

/// Response body for the GET operation (GET /get/:key)
#[derive(Debug, Clone, Serialize)]
pub struct GetResponse {
    /// The requested key
    pub key: String,
    /// The stored value
    pub value: Value,
    /// Remaining TTL in milliseconds, absent when the entry never expires
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl_ms: Option<u64>,
}

impl GetResponse {
    /// Creates a new GetResponse
    pub fn new(key: impl Into<String>, value: Value, remaining: Option<Duration>) -> Self {
        Self {
            key: key.into(),
            value,
            ttl_ms: remaining.map(|ttl| ttl.as_millis() as u64),
        }
    }
}

/// Response body for the write operations (set, add, replace)
#[derive(Debug, Clone, Serialize)]
pub struct WriteResponse {
    /// Success message
    pub message: String,
    /// The key that was written
    pub key: String,
}

impl WriteResponse {
    /// Creates a new WriteResponse; `action` reads as "set", "added", ...
    pub fn new(key: impl Into<String>, action: &str) -> Self {
        let key = key.into();
        Self {
            message: format!("Key '{}' {} successfully", key, action),
            key,
        }
    }
}

/// Response body for the DELETE operation (DELETE /del/:key)
#[derive(Debug, Clone, Serialize)]
pub struct DeleteResponse {
    /// Success message
    pub message: String,
    /// The key that was deleted
    pub key: String,
}

impl DeleteResponse {
    /// Creates a new DeleteResponse
    pub fn new(key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            message: format!("Key '{}' deleted", key),
            key,
        }
    }
}

/// Response body for the prefix scan (GET /prefix/:prefix)
#[derive(Debug, Clone, Serialize)]
pub struct PrefixResponse {
    pub prefix: String,
    pub count: usize,
    /// Matching keys, rendered as UTF-8 (lossy), in key order
    pub entries: BTreeMap<String, Value>,
}

impl PrefixResponse {
    pub fn new(prefix: impl Into<String>, found: HashMap<Vec<u8>, Value>) -> Self {
        let entries: BTreeMap<String, Value> = found
            .into_iter()
            .map(|(key, value)| (String::from_utf8_lossy(&key).into_owned(), value))
            .collect();
        Self {
            prefix: prefix.into(),
            count: entries.len(),
            entries,
        }
    }
}

/// Response body for GET /len
#[derive(Debug, Clone, Serialize)]
pub struct LenResponse {
    /// Stored entries, including expired ones not yet reaped
    pub len: usize,
    /// Entries a reader would currently see
    pub live: usize,
}

/// Response body for DELETE /all
#[derive(Debug, Clone, Serialize)]
pub struct DeleteAllResponse {
    pub removed: usize,
}

/// Response body for the stats endpoint (GET /stats)
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    /// Number of successful reads
    pub hits: u64,
    /// Number of reads that found nothing live
    pub misses: u64,
    /// Number of expired entries removed by the reaper
    pub reaped: u64,
    /// Number of entries evicted under memory pressure
    pub evictions: u64,
    /// Number of failed memory probes
    pub probe_failures: u64,
    /// Current number of stored entries
    pub total_entries: usize,
    /// Tracked byte footprint
    pub approx_bytes: u64,
    /// Hit rate (hits / (hits + misses))
    pub hit_rate: f64,
}

impl From<CacheStats> for StatsResponse {
    fn from(stats: CacheStats) -> Self {
        Self {
            hit_rate: stats.hit_rate(),
            hits: stats.hits,
            misses: stats.misses,
            reaped: stats.reaped,
            evictions: stats.evictions,
            probe_failures: stats.probe_failures,
            total_entries: stats.total_entries,
            approx_bytes: stats.approx_bytes,
        }
    }
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Error response body for all error conditions
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Error message describing what went wrong
    pub error: String,
}

impl ErrorResponse {
    /// Creates a new ErrorResponse
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}
