//! Cache Entry Module
//!
//! Defines individual cache entries and the expiration policy applied to them.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cache::clock::duration_ms;

/// Fixed per-entry bookkeeping counted towards an entry's weight.
pub const ENTRY_OVERHEAD: usize = std::mem::size_of::<u64>() * 4 + 32;

// == Cache Entry ==
/// A single stored value with its write timestamps and expiration metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry<V> {
    /// The stored value
    pub value: V,
    /// Creation timestamp (Unix milliseconds)
    pub created_at: u64,
    /// Timestamp of the most recent write (Unix milliseconds)
    pub last_write_at: u64,
    /// TTL in milliseconds, None = no expiration
    pub ttl_ms: Option<u64>,
    /// Expiration timestamp, always `last_write_at + ttl_ms`
    pub expires_at: Option<u64>,
    /// Approximate bytes held by key, value and bookkeeping
    pub weight: usize,
    /// Shard-local write sequence, stamped when the shard stores the entry
    #[serde(skip)]
    pub(crate) write_seq: u64,
}

impl<V> Entry<V> {
    // == Constructor ==
    /// Creates a fresh entry written at `now`.
    pub fn new(value: V, ttl: Option<Duration>, now: u64, weight: usize) -> Self {
        let ttl_ms = ttl.map(duration_ms);
        Self {
            value,
            created_at: now,
            last_write_at: now,
            ttl_ms,
            expires_at: ttl_ms.map(|ttl| now.saturating_add(ttl)),
            weight,
            write_seq: 0,
        }
    }

    // == Overwrite ==
    /// Builds the entry that replaces `self`, keeping its creation time.
    pub fn overwrite(&self, value: V, ttl: Option<Duration>, now: u64, weight: usize) -> Self {
        let mut next = Self::new(value, ttl, now, weight);
        next.created_at = self.created_at;
        next
    }

    // == Is Expired ==
    /// Expiration policy: an entry with a TTL is expired once `now >= expires_at`.
    /// Entries without a TTL never expire.
    pub fn is_expired(&self, now: u64) -> bool {
        match self.expires_at {
            Some(expires) => now >= expires,
            None => false,
        }
    }

    /// How long the entry has been expired, or None while it is live.
    pub fn expired_for(&self, now: u64) -> Option<Duration> {
        match self.expires_at {
            Some(expires) if now >= expires => Some(Duration::from_millis(now - expires)),
            _ => None,
        }
    }

    /// Remaining TTL in milliseconds; `Some(0)` once expired.
    pub fn ttl_remaining_ms(&self, now: u64) -> Option<u64> {
        self.expires_at.map(|expires| expires.saturating_sub(now))
    }
}
