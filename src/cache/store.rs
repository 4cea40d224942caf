//! Cache Store Module
//!
//! The public operation surface. Each call is routed to exactly one shard and
//! filtered through the expiration policy before anything is returned.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::cache::{
    Backend, CacheStats, Clock, MemoryBackend, MemoryProbe, Router, Shard, SystemClock,
    ENTRY_OVERHEAD,
};
use crate::cache::stats::StatsCounters;
use crate::config::CacheConfig;
use crate::error::{CacheError, Result};

/// Estimates the heap footprint of a value, in bytes.
pub type Weigher<V> = Arc<dyn Fn(&V) -> usize + Send + Sync>;

pub(crate) struct CacheInner<V, B> {
    pub(crate) shards: Box<[Shard<V, B>]>,
    pub(crate) router: Router,
    pub(crate) config: CacheConfig,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) weigher: Weigher<V>,
    pub(crate) probe: Option<Arc<dyn MemoryProbe>>,
    pub(crate) stats: StatsCounters,
}

// == Cache ==
/// Sharded key-value cache with per-key TTL.
///
/// Cloning is cheap and every clone operates on the same shards.
///
/// ```
/// use shardkv::{Cache, CacheConfig};
/// use std::time::Duration;
///
/// let cache: Cache<String> = Cache::new(CacheConfig::default()).unwrap();
/// cache.set_with_ttl("user:1", "x".to_string(), Some(Duration::from_secs(60)));
/// assert_eq!(cache.get("user:1").unwrap(), "x");
/// ```
pub struct Cache<V, B = MemoryBackend<V>> {
    pub(crate) inner: Arc<CacheInner<V, B>>,
}

impl<V, B> Clone for Cache<V, B> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V, B> fmt::Debug for Cache<V, B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cache")
            .field("shards", &self.inner.shards.len())
            .field("config", &self.inner.config)
            .field("clock", &self.inner.clock)
            .field("probe", &self.inner.probe)
            .finish()
    }
}

// == Cache Builder ==
/// Assembles a cache with a non-default clock, weigher or memory probe.
pub struct CacheBuilder<V> {
    config: CacheConfig,
    clock: Arc<dyn Clock>,
    weigher: Weigher<V>,
    probe: Option<Arc<dyn MemoryProbe>>,
}

impl<V: Send + 'static> CacheBuilder<V> {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            clock: Arc::new(SystemClock),
            weigher: Arc::new(|_: &V| std::mem::size_of::<V>()),
            probe: None,
        }
    }

    pub fn clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn weigher(mut self, weigher: impl Fn(&V) -> usize + Send + Sync + 'static) -> Self {
        self.weigher = Arc::new(weigher);
        self
    }

    /// Replaces the tracked entry weights with an external usage figure.
    pub fn memory_probe(mut self, probe: impl MemoryProbe + 'static) -> Self {
        self.probe = Some(Arc::new(probe));
        self
    }

    /// Builds an in-memory cache.
    pub fn build(self) -> Result<Cache<V>> {
        self.build_with(|_| Ok(MemoryBackend::new()))
    }

    /// Builds a cache whose shards are backed by `open(shard_index)`.
    pub fn build_with<B, F>(self, mut open: F) -> Result<Cache<V, B>>
    where
        B: Backend<V>,
        F: FnMut(usize) -> Result<B>,
    {
        self.config.validate()?;
        let shards = (0..self.config.shard_count)
            .map(|index| open(index).map(Shard::new))
            .collect::<Result<Vec<_>>>()?;

        Ok(Cache {
            inner: Arc::new(CacheInner {
                shards: shards.into_boxed_slice(),
                router: Router::new(self.config.shard_count),
                config: self.config,
                clock: self.clock,
                weigher: self.weigher,
                probe: self.probe,
                stats: StatsCounters::default(),
            }),
        })
    }
}

impl<V: Send + 'static> Cache<V> {
    // == Constructor ==
    /// Creates an in-memory cache with the system clock.
    pub fn new(config: CacheConfig) -> Result<Self> {
        CacheBuilder::new(config).build()
    }

    pub fn builder(config: CacheConfig) -> CacheBuilder<V> {
        CacheBuilder::new(config)
    }
}

impl<V, B> Cache<V, B>
where
    V: Clone + Send + 'static,
    B: Backend<V> + 'static,
{
    /// Creates a cache over custom backends with the system clock.
    pub fn with_backend<F>(config: CacheConfig, open: F) -> Result<Self>
    where
        F: FnMut(usize) -> Result<B>,
    {
        CacheBuilder::new(config).build_with(open)
    }

    pub fn config(&self) -> &CacheConfig {
        &self.inner.config
    }

    pub(crate) fn now(&self) -> u64 {
        self.inner.clock.now_ms()
    }

    fn shard(&self, key: &[u8]) -> &Shard<V, B> {
        &self.inner.shards[self.inner.router.shard_for(key)]
    }

    fn weigh(&self, key: &[u8], value: &V) -> usize {
        key.len() + (self.inner.weigher)(value) + ENTRY_OVERHEAD
    }

    // == Set ==
    /// Stores a value with the default TTL, overwriting any existing entry.
    pub fn set(&self, key: impl AsRef<[u8]>, value: V) {
        self.set_with_ttl(key, value, self.inner.config.default_ttl);
    }

    /// Stores a value with an explicit TTL; `None` never expires.
    pub fn set_with_ttl(&self, key: impl AsRef<[u8]>, value: V, ttl: Option<Duration>) {
        let key = key.as_ref();
        let weight = self.weigh(key, &value);
        self.shard(key).set(key, value, ttl, self.now(), weight);
    }

    // == Add ==
    /// Stores a value only if the key holds no live entry.
    ///
    /// # Errors
    /// `AlreadyExists` when a live entry is present.
    pub fn add(&self, key: impl AsRef<[u8]>, value: V, ttl: Option<Duration>) -> Result<()> {
        let key = key.as_ref();
        let weight = self.weigh(key, &value);
        self.shard(key).add(key, value, ttl, self.now(), weight)
    }

    // == Replace ==
    /// Overwrites a value only if the key holds a live entry.
    ///
    /// # Errors
    /// `NotFound` when the key is absent or expired.
    pub fn replace(&self, key: impl AsRef<[u8]>, value: V, ttl: Option<Duration>) -> Result<()> {
        let key = key.as_ref();
        let weight = self.weigh(key, &value);
        self.shard(key).replace(key, value, ttl, self.now(), weight)
    }

    // == Get ==
    /// Fetches a live value.
    ///
    /// # Errors
    /// `NotFound` when the key is absent or expired.
    pub fn get(&self, key: impl AsRef<[u8]>) -> Result<V> {
        self.get_with_ttl(key).map(|(value, _)| value)
    }

    /// Fetches a live value and how long it has left; `None` never expires.
    ///
    /// # Errors
    /// `NotFound` when the key is absent or expired.
    pub fn get_with_ttl(&self, key: impl AsRef<[u8]>) -> Result<(V, Option<Duration>)> {
        let key = key.as_ref();
        match self.shard(key).get_with_ttl(key, self.now()) {
            Some((value, remaining)) => {
                self.inner.stats.record_hit();
                Ok((value, remaining.map(Duration::from_millis)))
            }
            None => {
                self.inner.stats.record_miss();
                Err(CacheError::not_found(key))
            }
        }
    }

    // == Delete ==
    /// Removes a key. Deleting an absent key is not an error.
    pub fn delete(&self, key: impl AsRef<[u8]>) {
        let key = key.as_ref();
        self.shard(key).delete(key);
    }

    /// Removes every entry, one shard at a time. Returns how many were stored.
    pub fn delete_all(&self) -> usize {
        self.inner.shards.iter().map(Shard::clear).sum()
    }

    // == View Prefix ==
    /// Returns every live key starting with `prefix` mapped to its value.
    ///
    /// Shards are visited one at a time, so writes racing the scan may or may
    /// not be reflected.
    pub fn view_prefix(&self, prefix: impl AsRef<[u8]>) -> HashMap<Vec<u8>, V> {
        let prefix = prefix.as_ref();
        let now = self.now();
        let mut out = HashMap::new();
        for shard in self.inner.shards.iter() {
            shard.collect_prefix(prefix, now, &mut out);
        }
        out
    }

    // == Length ==
    /// Number of stored entries, including expired ones not yet reaped.
    pub fn len(&self) -> usize {
        self.inner.shards.iter().map(Shard::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.shards.iter().all(Shard::is_empty)
    }

    /// Number of entries a reader would currently see.
    pub fn len_live(&self) -> usize {
        let now = self.now();
        self.inner.shards.iter().map(|s| s.live_len(now)).sum()
    }

    /// Sum of the tracked weights of every stored entry.
    pub fn approx_bytes(&self) -> u64 {
        self.inner.shards.iter().map(|s| s.bytes() as u64).sum()
    }

    /// Memory usage as seen by the eviction controller.
    ///
    /// # Errors
    /// `Probe` when an external probe is configured and fails.
    pub fn memory_usage(&self) -> Result<u64> {
        match &self.inner.probe {
            Some(probe) => probe.usage_bytes(),
            None => Ok(self.approx_bytes()),
        }
    }

    // == Stats ==
    pub fn stats(&self) -> CacheStats {
        self.inner.stats.snapshot(self.len(), self.approx_bytes())
    }
}
