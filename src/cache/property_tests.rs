//! Property-Based Tests for Cache Module
//!
//! Uses proptest to check the cache against a plain `HashMap` model and the
//! TTL, add/replace, reaping and eviction guarantees.

use proptest::prelude::*;
use std::collections::{HashMap, HashSet};
use std::time::Duration;

use crate::cache::{victims_for, Cache, ManualClock};
use crate::config::CacheConfig;
use crate::error::CacheError;

// == Test Configuration ==
const T0: u64 = 1_700_000_000_000;
const TEST_SHARDS: usize = 8;

fn manual_cache(config: CacheConfig) -> (Cache<String>, ManualClock) {
    let clock = ManualClock::new(T0);
    let cache = Cache::builder(config.with_shard_count(TEST_SHARDS))
        .clock(clock.clone())
        .build()
        .unwrap();
    (cache, clock)
}

// == Strategies ==
/// Generates keys from a small alphabet so operations collide often
fn key_strategy() -> impl Strategy<Value = String> {
    "[a-c]{1,3}(:[a-c]{1,2})?".prop_map(|s| s)
}

fn value_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 ]{0,32}".prop_map(|s| s)
}

/// Generates a sequence of cache operations for testing
#[derive(Debug, Clone)]
enum CacheOp {
    Set { key: String, value: String },
    Add { key: String, value: String },
    Replace { key: String, value: String },
    Get { key: String },
    Delete { key: String },
}

fn cache_op_strategy() -> impl Strategy<Value = CacheOp> {
    prop_oneof![
        (key_strategy(), value_strategy()).prop_map(|(key, value)| CacheOp::Set { key, value }),
        (key_strategy(), value_strategy()).prop_map(|(key, value)| CacheOp::Add { key, value }),
        (key_strategy(), value_strategy())
            .prop_map(|(key, value)| CacheOp::Replace { key, value }),
        key_strategy().prop_map(|key| CacheOp::Get { key }),
        key_strategy().prop_map(|key| CacheOp::Delete { key }),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // Without expiry the cache behaves like a map: add only inserts missing
    // keys, replace only overwrites present ones, delete is idempotent, and
    // the hit/miss counters track every read.
    #[test]
    fn prop_matches_map_model(ops in prop::collection::vec(cache_op_strategy(), 1..80)) {
        let (cache, _clock) = manual_cache(CacheConfig::default().with_default_ttl(None));
        let mut model: HashMap<String, String> = HashMap::new();
        let mut expected_hits: u64 = 0;
        let mut expected_misses: u64 = 0;

        for op in ops {
            match op {
                CacheOp::Set { key, value } => {
                    cache.set(&key, value.clone());
                    model.insert(key, value);
                }
                CacheOp::Add { key, value } => {
                    let result = cache.add(&key, value.clone(), None);
                    if model.contains_key(&key) {
                        prop_assert!(matches!(result, Err(CacheError::AlreadyExists(_))));
                    } else {
                        prop_assert!(result.is_ok());
                        model.insert(key, value);
                    }
                }
                CacheOp::Replace { key, value } => {
                    let result = cache.replace(&key, value.clone(), None);
                    if model.contains_key(&key) {
                        prop_assert!(result.is_ok());
                        model.insert(key, value);
                    } else {
                        prop_assert!(matches!(result, Err(CacheError::NotFound(_))));
                    }
                }
                CacheOp::Get { key } => {
                    match model.get(&key) {
                        Some(expected) => {
                            prop_assert_eq!(&cache.get(&key).unwrap(), expected);
                            expected_hits += 1;
                        }
                        None => {
                            prop_assert!(cache.get(&key).is_err());
                            expected_misses += 1;
                        }
                    }
                }
                CacheOp::Delete { key } => {
                    cache.delete(&key);
                    model.remove(&key);
                }
            }
        }

        prop_assert_eq!(cache.len(), model.len());
        let stats = cache.stats();
        prop_assert_eq!(stats.hits, expected_hits, "Hits mismatch");
        prop_assert_eq!(stats.misses, expected_misses, "Misses mismatch");
        prop_assert_eq!(stats.total_entries, model.len());
    }

    // A prefix view returns exactly the live keys starting with the prefix,
    // whatever shard they landed on.
    #[test]
    fn prop_prefix_view_is_complete(
        entries in prop::collection::vec((key_strategy(), value_strategy()), 0..60),
        prefix in "[a-c]{0,2}"
    ) {
        let (cache, _clock) = manual_cache(CacheConfig::default().with_default_ttl(None));
        let mut model: HashMap<String, String> = HashMap::new();
        for (key, value) in entries {
            cache.set(&key, value.clone());
            model.insert(key, value);
        }

        let view = cache.view_prefix(&prefix);
        let expected: HashMap<Vec<u8>, String> = model
            .into_iter()
            .filter(|(key, _)| key.starts_with(&prefix))
            .map(|(key, value)| (key.into_bytes(), value))
            .collect();
        prop_assert_eq!(view, expected);
    }

    // An entry is visible strictly before `write + ttl` and invisible from
    // that instant on, to point reads and prefix views alike.
    #[test]
    fn prop_ttl_boundary(
        key in key_strategy(),
        value in value_strategy(),
        ttl_ms in 1u64..10_000,
        before in 0u64..10_000
    ) {
        let (cache, clock) = manual_cache(CacheConfig::default());
        cache.set_with_ttl(&key, value.clone(), Some(Duration::from_millis(ttl_ms)));

        let read_at = before % ttl_ms;
        clock.set(T0 + read_at);
        prop_assert_eq!(cache.get(&key).unwrap(), value);

        clock.set(T0 + ttl_ms);
        prop_assert!(cache.get(&key).is_err());
        prop_assert!(cache.view_prefix(&key).is_empty());
        prop_assert!(cache.add(&key, "again".to_string(), None).is_ok());
    }

    // Reaping never touches entries without a TTL and removes an expired
    // entry only once it has been expired for the whole grace period.
    #[test]
    fn prop_reap_respects_grace(
        permanent in prop::collection::hash_set(key_strategy(), 0..15),
        expiring in prop::collection::hash_set("[d-f]{1,4}", 0..15),
        elapsed_ms in 0u64..5_000
    ) {
        let grace = Duration::from_millis(1_000);
        let ttl = Duration::from_millis(500);
        let (cache, clock) = manual_cache(CacheConfig::default().with_grace_period(grace));

        for key in &permanent {
            cache.set_with_ttl(key, "keep".to_string(), None);
        }
        for key in &expiring {
            cache.set_with_ttl(key, "drop".to_string(), Some(ttl));
        }

        clock.advance(Duration::from_millis(elapsed_ms));
        let report = cache.reap();

        let past_grace = elapsed_ms >= 1_500;
        let expected_removed = if past_grace { expiring.len() } else { 0 };
        prop_assert_eq!(report.removed, expected_removed);
        prop_assert_eq!(cache.len(), permanent.len() + expiring.len() - expected_removed);
        for key in &permanent {
            prop_assert_eq!(cache.get(key).unwrap(), "keep");
        }
    }

    // One forced eviction cycle removes between one and ceil(fraction * live)
    // entries and never invents keys.
    #[test]
    fn prop_eviction_bound(
        keys in prop::collection::hash_set(key_strategy(), 1..40),
        fraction in 0.0f64..=1.0
    ) {
        let config = CacheConfig::default()
            .with_default_ttl(None)
            .with_evict_fraction(fraction);
        let (cache, _clock) = manual_cache(config);
        for key in &keys {
            cache.set(key, key.clone());
        }

        let report = cache.evict_fraction_now();
        let bound = victims_for(fraction, keys.len());
        prop_assert_eq!(report.live_before, keys.len());
        prop_assert!(report.evicted >= 1);
        prop_assert!(report.evicted <= bound);
        prop_assert_eq!(cache.len(), keys.len() - report.evicted);

        let remaining: HashSet<String> = cache
            .view_prefix("")
            .into_keys()
            .map(|key| String::from_utf8(key).unwrap())
            .collect();
        prop_assert!(remaining.is_subset(&keys));
    }
}

// == Property Test for Error Response Format ==
// This tests the CacheError -> HTTP response conversion

proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    // Every error becomes a JSON body with a string "error" field carrying
    // the error's message.
    #[test]
    fn prop_error_response_format(
        error_msg in "[a-zA-Z0-9 _-]{1,100}"
    ) {
        use axum::body::to_bytes;
        use axum::response::IntoResponse;

        let error_variants = vec![
            CacheError::NotFound(error_msg.clone()),
            CacheError::AlreadyExists(error_msg.clone()),
            CacheError::InvalidConfig(error_msg.clone()),
            CacheError::InvalidRequest(error_msg.clone()),
            CacheError::Probe(error_msg.clone()),
        ];

        let rt = tokio::runtime::Runtime::new().unwrap();
        for error in error_variants {
            let expected_msg = error.to_string();
            let response = error.into_response();

            let content_type = response.headers()
                .get("content-type")
                .and_then(|v| v.to_str().ok());
            prop_assert!(
                content_type.map(|ct| ct.contains("application/json")).unwrap_or(false),
                "Response should have JSON content-type"
            );

            let bytes = rt.block_on(async {
                to_bytes(response.into_body(), usize::MAX).await.unwrap()
            });
            let json: serde_json::Value = serde_json::from_slice(&bytes)
                .expect("Response body should be valid JSON");

            let error_value = json.get("error").and_then(|v| v.as_str());
            prop_assert_eq!(error_value, Some(expected_msg.as_str()));
        }
    }
}
