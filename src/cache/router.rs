//! Shard Router
//!
//! Maps keys to shard indices with a seeded XxHash64.

use std::hash::Hasher;

use twox_hash::XxHash64;

/// Seed used when none is given; any fixed value keeps routing stable.
pub const DEFAULT_HASH_SEED: u64 = 0x5eed_cafe;

/// Pure key to shard mapping. Immutable after construction.
#[derive(Debug, Clone, Copy)]
pub struct Router {
    shard_count: usize,
    seed: u64,
}

impl Router {
    /// Creates a router over `shard_count` shards. `shard_count` must be non-zero.
    pub fn new(shard_count: usize) -> Self {
        Self::with_seed(shard_count, DEFAULT_HASH_SEED)
    }

    pub fn with_seed(shard_count: usize, seed: u64) -> Self {
        debug_assert!(shard_count > 0);
        Self { shard_count, seed }
    }

    pub fn shard_count(&self) -> usize {
        self.shard_count
    }

    /// Hash a key's bytes.
    pub fn hash_key(&self, key: &[u8]) -> u64 {
        let mut hasher = XxHash64::with_seed(self.seed);
        hasher.write(key);
        hasher.finish()
    }

    /// Get the shard index for a key.
    pub fn shard_for(&self, key: &[u8]) -> usize {
        (self.hash_key(key) % self.shard_count as u64) as usize
    }
}
