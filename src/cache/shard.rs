//! Shard Module
//!
//! One lock-protected partition of the keyspace. Point operations run under a
//! single acquisition of the shard's mutex. Whole-shard walks (prefix views,
//! reaping, eviction selection) advance a key cursor in bounded batches and
//! release the lock between them.

use std::collections::HashMap;
use std::marker::PhantomData;
use std::ops::{Bound, ControlFlow};
use std::time::Duration;

use parking_lot::Mutex;

use crate::cache::{Backend, Entry};
use crate::error::{CacheError, Result};

/// Entries visited per lock acquisition by whole-shard walks.
pub const SCAN_BATCH: usize = 256;

/// A live entry considered for eviction. `write_seq` identifies the exact
/// write that was selected, so any later write spares the key.
#[derive(Debug, Clone)]
pub(crate) struct EvictionCandidate {
    pub shard: usize,
    pub key: Vec<u8>,
    pub last_write_at: u64,
    pub weight: usize,
    pub write_seq: u64,
}

struct ShardState<B> {
    backend: B,
    /// Sum of the weights of every stored entry
    bytes: usize,
    /// Last write sequence handed out; strictly increasing
    last_seq: u64,
}

impl<B> ShardState<B> {
    fn put<V>(&mut self, key: Vec<u8>, mut entry: Entry<V>)
    where
        B: Backend<V>,
    {
        self.last_seq += 1;
        entry.write_seq = self.last_seq;
        self.bytes += entry.weight;
        if let Some(previous) = self.backend.insert(key, entry) {
            self.bytes = self.bytes.saturating_sub(previous.weight);
        }
    }

    fn take<V>(&mut self, key: &[u8]) -> Option<Entry<V>>
    where
        B: Backend<V>,
    {
        let removed = self.backend.remove(key)?;
        self.bytes = self.bytes.saturating_sub(removed.weight);
        Some(removed)
    }
}

// == Shard ==
pub struct Shard<V, B> {
    state: Mutex<ShardState<B>>,
    _value: PhantomData<fn() -> V>,
}

impl<V, B: Backend<V>> Shard<V, B> {
    /// Wraps a backend, counting the weight of anything it already holds.
    pub fn new(backend: B) -> Self {
        let mut bytes = 0;
        backend.scan(Bound::Unbounded, usize::MAX, &mut |_, entry| {
            bytes += entry.weight;
            ControlFlow::Continue(())
        });
        Self {
            state: Mutex::new(ShardState {
                backend,
                bytes,
                last_seq: 0,
            }),
            _value: PhantomData,
        }
    }

    /// Runs `step` once per lock acquisition. Each call gets the bound to
    /// resume from and returns the cursor for the next one, or None when the
    /// walk is done.
    fn batched<F>(&self, from: Bound<&[u8]>, mut step: F)
    where
        F: FnMut(&mut ShardState<B>, Bound<&[u8]>) -> Option<Vec<u8>>,
    {
        let mut cursor: Option<Vec<u8>> = None;
        loop {
            let next = {
                let mut state = self.state.lock();
                let start = match &cursor {
                    Some(key) => Bound::Excluded(key.as_slice()),
                    None => from,
                };
                step(&mut *state, start)
            };
            match next {
                Some(key) => cursor = Some(key),
                None => return,
            }
        }
    }

    // == Get ==
    /// Returns the value when the key holds a live entry.
    pub fn get(&self, key: &[u8], now: u64) -> Option<V>
    where
        V: Clone,
    {
        self.get_with_ttl(key, now).map(|(value, _)| value)
    }

    /// Returns a live value together with its remaining TTL in milliseconds.
    pub fn get_with_ttl(&self, key: &[u8], now: u64) -> Option<(V, Option<u64>)>
    where
        V: Clone,
    {
        let state = self.state.lock();
        state
            .backend
            .get(key)
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| (entry.value.clone(), entry.ttl_remaining_ms(now)))
    }

    // == Set ==
    /// Inserts or overwrites unconditionally.
    pub fn set(&self, key: &[u8], value: V, ttl: Option<Duration>, now: u64, weight: usize) {
        let mut state = self.state.lock();
        let entry = match state.backend.get(key) {
            Some(current) if !current.is_expired(now) => current.overwrite(value, ttl, now, weight),
            _ => Entry::new(value, ttl, now, weight),
        };
        state.put(key.to_vec(), entry);
    }

    // == Add ==
    /// Inserts only when the key is absent or expired.
    pub fn add(
        &self,
        key: &[u8],
        value: V,
        ttl: Option<Duration>,
        now: u64,
        weight: usize,
    ) -> Result<()> {
        let mut state = self.state.lock();
        if state
            .backend
            .get(key)
            .is_some_and(|entry| !entry.is_expired(now))
        {
            return Err(CacheError::already_exists(key));
        }
        state.put(key.to_vec(), Entry::new(value, ttl, now, weight));
        Ok(())
    }

    // == Replace ==
    /// Overwrites only when the key holds a live entry.
    pub fn replace(
        &self,
        key: &[u8],
        value: V,
        ttl: Option<Duration>,
        now: u64,
        weight: usize,
    ) -> Result<()> {
        let mut state = self.state.lock();
        let entry = match state.backend.get(key) {
            Some(current) if !current.is_expired(now) => current.overwrite(value, ttl, now, weight),
            _ => return Err(CacheError::not_found(key)),
        };
        state.put(key.to_vec(), entry);
        Ok(())
    }

    // == Delete ==
    /// Removes the key. Returns whether anything was stored under it.
    pub fn delete(&self, key: &[u8]) -> bool {
        self.state.lock().take(key).is_some()
    }

    /// Removes every entry, returning how many were stored.
    pub fn clear(&self) -> usize {
        let mut state = self.state.lock();
        let count = state.backend.len();
        state.backend.clear();
        state.bytes = 0;
        count
    }

    /// Stored entries, expired ones included.
    pub fn len(&self) -> usize {
        self.state.lock().backend.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn live_len(&self, now: u64) -> usize {
        let mut live = 0;
        self.visit_live(now, |_, _| live += 1);
        live
    }

    pub fn bytes(&self) -> usize {
        self.state.lock().bytes
    }

    /// Calls `f` for every live entry, [`SCAN_BATCH`] entries per lock
    /// acquisition. Entries written behind the cursor during the walk are
    /// not seen; no entry is seen twice.
    pub(crate) fn visit_live<F>(&self, now: u64, mut f: F)
    where
        F: FnMut(&[u8], &Entry<V>),
    {
        self.batched(Bound::Unbounded, |state, start| {
            state.backend.scan(start, SCAN_BATCH, &mut |key, entry| {
                if !entry.is_expired(now) {
                    f(key, entry);
                }
                ControlFlow::Continue(())
            })
        });
    }

    // == Prefix Scan ==
    /// Copies every live entry whose key starts with `prefix` into `out`.
    pub fn collect_prefix(&self, prefix: &[u8], now: u64, out: &mut HashMap<Vec<u8>, V>)
    where
        V: Clone,
    {
        self.batched(Bound::Included(prefix), |state, start| {
            state.backend.scan(start, SCAN_BATCH, &mut |key, entry| {
                if !key.starts_with(prefix) {
                    return ControlFlow::Break(());
                }
                if !entry.is_expired(now) {
                    out.insert(key.to_vec(), entry.value.clone());
                }
                ControlFlow::Continue(())
            })
        });
    }

    // == Reaping ==
    /// Removes entries that have been expired for at least `grace`.
    ///
    /// Each lock acquisition scans at most `batch` entries and removes the
    /// dead ones among them before releasing, so nothing rewritten in
    /// between can be lost.
    pub fn reap_expired(&self, now: u64, grace: Duration, batch: usize) -> usize {
        let mut removed = 0;
        self.batched(Bound::Unbounded, |state, start| {
            let mut dead = Vec::new();
            let cursor = state.backend.scan(start, batch, &mut |key, entry| {
                if entry.expired_for(now).is_some_and(|expired| expired >= grace) {
                    dead.push(key.to_vec());
                }
                ControlFlow::Continue(())
            });
            for key in &dead {
                if state.take(key).is_some() {
                    removed += 1;
                }
            }
            cursor
        });
        removed
    }

    // == Eviction ==
    /// Removes candidates whose entries were not rewritten since selection.
    pub(crate) fn remove_unchanged(&self, victims: &[&EvictionCandidate]) -> usize {
        let mut state = self.state.lock();
        let mut removed = 0;
        for victim in victims {
            let unchanged = state
                .backend
                .get(&victim.key)
                .is_some_and(|entry| entry.write_seq == victim.write_seq);
            if unchanged && state.take(&victim.key).is_some() {
                removed += 1;
            }
        }
        removed
    }
}
