//! Eviction Controller
//!
//! Pressure relief: once memory usage passes the soft limit, a fraction of the
//! live entries is removed regardless of remaining TTL.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use tracing::{debug, info};

use crate::cache::shard::EvictionCandidate;
use crate::cache::{Backend, Cache};
use crate::config::EvictionOrder;
use crate::error::Result;

/// Victims removed per shard-lock acquisition.
pub const EVICT_BATCH: usize = 256;

/// Outcome of one eviction cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EvictionReport {
    /// Usage figure the decision was based on
    pub usage_bytes: u64,
    /// Live entries seen when victims were selected
    pub live_before: usize,
    /// Victims selected
    pub requested: usize,
    /// Victims actually removed; rewritten entries are spared
    pub evicted: usize,
}

/// Number of victims for a cycle: `ceil(fraction * live)`, at least one so
/// small stores still make progress, never more than `live`.
pub fn victims_for(fraction: f64, live: usize) -> usize {
    if live == 0 {
        return 0;
    }
    let wanted = (fraction * live as f64).ceil() as usize;
    wanted.clamp(1, live)
}

impl<V, B> Cache<V, B>
where
    V: Clone + Send + 'static,
    B: Backend<V> + 'static,
{
    /// Probes memory usage and evicts if it exceeds the soft limit.
    ///
    /// A soft limit of 0 disables eviction.
    ///
    /// # Errors
    /// `Probe` when the configured memory probe fails; nothing is evicted.
    pub fn evict(&self) -> Result<EvictionReport> {
        let limit = self.inner.config.memory_soft_limit_bytes;
        if limit == 0 {
            return Ok(EvictionReport::default());
        }

        let usage_bytes = self.memory_usage().inspect_err(|_| {
            self.inner.stats.record_probe_failure();
        })?;
        if usage_bytes <= limit {
            return Ok(EvictionReport {
                usage_bytes,
                ..EvictionReport::default()
            });
        }

        let report = EvictionReport {
            usage_bytes,
            ..self.evict_fraction_now()
        };
        info!(
            usage_bytes,
            limit,
            evicted = report.evicted,
            live_before = report.live_before,
            "memory soft limit exceeded, evicted entries"
        );
        Ok(report)
    }

    /// Evicts `evict_fraction` of the live entries without checking usage.
    ///
    /// A first walk counts the live entries; a second keeps only the
    /// `requested` best-ranked candidates in a bounded heap. Both walks take
    /// each shard lock in batches.
    pub fn evict_fraction_now(&self) -> EvictionReport {
        let now = self.now();
        let live_before: usize = self.inner.shards.iter().map(|s| s.live_len(now)).sum();
        let requested = victims_for(self.inner.config.evict_fraction, live_before);
        if requested == 0 {
            return EvictionReport::default();
        }

        let order = self.inner.config.eviction_order;
        let mut heap: BinaryHeap<Ranked> = BinaryHeap::with_capacity(requested + 1);
        for (index, shard) in self.inner.shards.iter().enumerate() {
            shard.visit_live(now, |key, entry| {
                let rank = rank(order, entry.last_write_at, entry.weight);
                if heap.len() == requested && heap.peek().is_some_and(|worst| worst.rank <= rank) {
                    return;
                }
                heap.push(Ranked {
                    rank,
                    candidate: EvictionCandidate {
                        shard: index,
                        key: key.to_vec(),
                        last_write_at: entry.last_write_at,
                        weight: entry.weight,
                        write_seq: entry.write_seq,
                    },
                });
                if heap.len() > requested {
                    heap.pop();
                }
            });
        }

        let victims = heap.into_vec();
        let mut per_shard: Vec<Vec<&EvictionCandidate>> = vec![Vec::new(); self.inner.shards.len()];
        for victim in &victims {
            per_shard[victim.candidate.shard].push(&victim.candidate);
        }

        let mut evicted = 0;
        for (index, victims) in per_shard.iter().enumerate() {
            for batch in victims.chunks(EVICT_BATCH) {
                evicted += self.inner.shards[index].remove_unchanged(batch);
            }
        }
        debug!(live_before, requested, evicted, "eviction cycle finished");

        self.inner.stats.record_evictions(evicted);
        EvictionReport {
            usage_bytes: 0,
            live_before,
            requested,
            evicted,
        }
    }
}

/// Eviction priority; lower ranks go first.
fn rank(order: EvictionOrder, last_write_at: u64, weight: usize) -> u64 {
    match order {
        EvictionOrder::OldestWrite => last_write_at,
        EvictionOrder::LargestFirst => u64::MAX - weight as u64,
    }
}

/// Heap slot ordered by rank alone, so the heap top is the candidate least
/// deserving of eviction.
struct Ranked {
    rank: u64,
    candidate: EvictionCandidate,
}

impl PartialEq for Ranked {
    fn eq(&self, other: &Self) -> bool {
        self.rank == other.rank
    }
}

impl Eq for Ranked {}

impl PartialOrd for Ranked {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Ranked {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rank.cmp(&other.rank)
    }
}
