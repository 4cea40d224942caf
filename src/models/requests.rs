//! Request DTOs for the cache server API
//!
//! Defines the structure of incoming HTTP request bodies.

use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;

/// Maximum accepted key length in bytes
pub const MAX_KEY_LENGTH: usize = 256;

/// Request body for the write operations (PUT /set, POST /add, PUT /replace)
///
/// # Fields
/// - `key`: The cache key to write
/// - `value`: Any JSON value, stored as-is
/// - `ttl`: Optional TTL in seconds; omitted uses the cache default, 0 never expires
#[derive(Debug, Clone, Deserialize)]
pub struct WriteRequest {
    /// The cache key
    pub key: String,
    /// The value to store
    pub value: Value,
    /// Optional TTL in seconds
    #[serde(default)]
    pub ttl: Option<u64>,
}

impl WriteRequest {
    /// Validates the request data
    ///
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        if self.key.is_empty() {
            return Some("Key cannot be empty".to_string());
        }
        if self.key.len() > MAX_KEY_LENGTH {
            return Some(format!(
                "Key exceeds maximum length of {} bytes",
                MAX_KEY_LENGTH
            ));
        }
        None
    }

    /// Resolves the requested TTL against the cache default.
    pub fn ttl_or(&self, default: Option<Duration>) -> Option<Duration> {
        match self.ttl {
            None => default,
            Some(0) => None,
            Some(secs) => Some(Duration::from_secs(secs)),
        }
    }
}
