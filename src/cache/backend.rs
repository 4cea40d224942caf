//! Storage Backends
//!
//! The substrate a shard keeps its entries in. Shards own one backend each and
//! only touch it under the shard lock, so implementations need no locking.

use std::collections::BTreeMap;
use std::ops::{Bound, ControlFlow};

use crate::cache::Entry;

/// Visitor for [`Backend::scan`]; `Break` ends the scan early.
pub type ScanVisitor<'a, V> = dyn FnMut(&[u8], &Entry<V>) -> ControlFlow<()> + 'a;

/// Key to entry storage behind a single shard.
///
/// Keys are kept in byte order so a shard can be walked in bounded batches
/// and a prefix occupies one contiguous range.
pub trait Backend<V>: Send {
    fn get(&self, key: &[u8]) -> Option<&Entry<V>>;

    /// Inserts or replaces, returning the previous entry.
    fn insert(&mut self, key: Vec<u8>, entry: Entry<V>) -> Option<Entry<V>>;

    /// Removes a key, returning its entry if it was present.
    fn remove(&mut self, key: &[u8]) -> Option<Entry<V>>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn clear(&mut self);

    /// Visits up to `limit` entries in key order, starting at `from`.
    ///
    /// Returns the last visited key when the limit was reached, so the caller
    /// can resume with `Bound::Excluded`. Returns None once the range is
    /// exhausted or the visitor breaks.
    fn scan(
        &self,
        from: Bound<&[u8]>,
        limit: usize,
        visit: &mut ScanVisitor<'_, V>,
    ) -> Option<Vec<u8>>;
}

/// Shared `scan` over an ordered map, used by both backends.
pub(crate) fn scan_map<V>(
    map: &BTreeMap<Vec<u8>, Entry<V>>,
    from: Bound<&[u8]>,
    limit: usize,
    visit: &mut ScanVisitor<'_, V>,
) -> Option<Vec<u8>> {
    let mut seen = 0;
    for (key, entry) in map.range::<[u8], _>((from, Bound::Unbounded)) {
        if visit(key, entry).is_break() {
            return None;
        }
        seen += 1;
        if seen >= limit {
            return Some(key.clone());
        }
    }
    None
}

/// Runtime-selected backend.
pub type DynBackend<V> = Box<dyn Backend<V>>;

impl<V, B: Backend<V> + ?Sized> Backend<V> for Box<B> {
    fn get(&self, key: &[u8]) -> Option<&Entry<V>> {
        (**self).get(key)
    }

    fn insert(&mut self, key: Vec<u8>, entry: Entry<V>) -> Option<Entry<V>> {
        (**self).insert(key, entry)
    }

    fn remove(&mut self, key: &[u8]) -> Option<Entry<V>> {
        (**self).remove(key)
    }

    fn len(&self) -> usize {
        (**self).len()
    }

    fn clear(&mut self) {
        (**self).clear()
    }

    fn scan(
        &self,
        from: Bound<&[u8]>,
        limit: usize,
        visit: &mut ScanVisitor<'_, V>,
    ) -> Option<Vec<u8>> {
        (**self).scan(from, limit, visit)
    }
}

// == Memory Backend ==
/// Plain in-memory ordered map.
#[derive(Debug)]
pub struct MemoryBackend<V> {
    entries: BTreeMap<Vec<u8>, Entry<V>>,
}

impl<V> MemoryBackend<V> {
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }
}

impl<V> Default for MemoryBackend<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Send> Backend<V> for MemoryBackend<V> {
    fn get(&self, key: &[u8]) -> Option<&Entry<V>> {
        self.entries.get(key)
    }

    fn insert(&mut self, key: Vec<u8>, entry: Entry<V>) -> Option<Entry<V>> {
        self.entries.insert(key, entry)
    }

    fn remove(&mut self, key: &[u8]) -> Option<Entry<V>> {
        self.entries.remove(key)
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn clear(&mut self) {
        self.entries.clear();
    }

    fn scan(
        &self,
        from: Bound<&[u8]>,
        limit: usize,
        visit: &mut ScanVisitor<'_, V>,
    ) -> Option<Vec<u8>> {
        scan_map(&self.entries, from, limit, visit)
    }
}
