//! API Handlers
//!
//! HTTP request handlers for each cache server endpoint.

use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::Value;

use crate::cache::{Cache, CacheBuilder, DynBackend, LogBackend, MemoryBackend, ProcessRssProbe};
use crate::config::{CacheConfig, MemorySource, ServerConfig};
use crate::error::{CacheError, Result};
use crate::models::{
    DeleteAllResponse, DeleteResponse, GetResponse, HealthResponse, LenResponse, PrefixResponse,
    StatsResponse, WriteRequest, WriteResponse,
};

/// Cache type served over HTTP: JSON values over a runtime-selected backend.
pub type ServerCache = Cache<Value, DynBackend<Value>>;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Shared cache; clones refer to the same shards
    pub cache: ServerCache,
}

impl AppState {
    /// Creates a new AppState around an existing cache.
    pub fn new(cache: ServerCache) -> Self {
        Self { cache }
    }

    /// Creates an AppState with in-memory shards.
    pub fn in_memory(config: CacheConfig) -> Result<Self> {
        let cache = builder(config, MemorySource::Tracked)
            .build_with(|_| Ok(boxed(MemoryBackend::new())))?;
        Ok(Self::new(cache))
    }

    /// Creates an AppState from server configuration, using the
    /// log-structured backend when a data directory is configured.
    pub fn from_config(config: &ServerConfig) -> Result<Self> {
        let builder = builder(config.cache.clone(), config.memory_source);
        let cache = match &config.data_dir {
            Some(dir) => builder.build_with(|shard| Ok(boxed(LogBackend::open(dir, shard)?)))?,
            None => builder.build_with(|_| Ok(boxed(MemoryBackend::new())))?,
        };
        Ok(Self::new(cache))
    }
}

fn builder(config: CacheConfig, source: MemorySource) -> CacheBuilder<Value> {
    let builder = CacheBuilder::new(config).weigher(value_weight);
    match source {
        MemorySource::Tracked => builder,
        MemorySource::ProcessRss => builder.memory_probe(ProcessRssProbe),
    }
}

fn boxed(backend: impl crate::cache::Backend<Value> + 'static) -> DynBackend<Value> {
    Box::new(backend)
}

/// Approximate heap bytes held by a JSON value.
pub fn value_weight(value: &Value) -> usize {
    let inline = std::mem::size_of::<Value>();
    match value {
        Value::Null | Value::Bool(_) | Value::Number(_) => inline,
        Value::String(s) => inline + s.len(),
        Value::Array(items) => inline + items.iter().map(value_weight).sum::<usize>(),
        Value::Object(map) => {
            inline
                + map
                    .iter()
                    .map(|(k, v)| k.len() + value_weight(v))
                    .sum::<usize>()
        }
    }
}

fn validated(req: &WriteRequest) -> Result<()> {
    match req.validate() {
        Some(error_msg) => Err(CacheError::InvalidRequest(error_msg)),
        None => Ok(()),
    }
}

/// Handler for PUT /set
///
/// Stores a value unconditionally.
pub async fn set_handler(
    State(state): State<AppState>,
    Json(req): Json<WriteRequest>,
) -> Result<Json<WriteResponse>> {
    validated(&req)?;
    let ttl = req.ttl_or(state.cache.config().default_ttl);
    state.cache.set_with_ttl(&req.key, req.value, ttl);

    Ok(Json(WriteResponse::new(req.key, "set")))
}

/// Handler for POST /add
///
/// Stores a value only if the key holds no live entry (409 otherwise).
pub async fn add_handler(
    State(state): State<AppState>,
    Json(req): Json<WriteRequest>,
) -> Result<Json<WriteResponse>> {
    validated(&req)?;
    let ttl = req.ttl_or(state.cache.config().default_ttl);
    state.cache.add(&req.key, req.value, ttl)?;

    Ok(Json(WriteResponse::new(req.key, "added")))
}

/// Handler for PUT /replace
///
/// Overwrites a value only if the key holds a live entry (404 otherwise).
pub async fn replace_handler(
    State(state): State<AppState>,
    Json(req): Json<WriteRequest>,
) -> Result<Json<WriteResponse>> {
    validated(&req)?;
    let ttl = req.ttl_or(state.cache.config().default_ttl);
    state.cache.replace(&req.key, req.value, ttl)?;

    Ok(Json(WriteResponse::new(req.key, "replaced")))
}

/// Handler for GET /get/:key
pub async fn get_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<GetResponse>> {
    let (value, remaining) = state.cache.get_with_ttl(&key)?;
    Ok(Json(GetResponse::new(key, value, remaining)))
}

/// Handler for DELETE /del/:key
///
/// Always succeeds, whether or not the key existed.
pub async fn delete_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Json<DeleteResponse> {
    state.cache.delete(&key);
    Json(DeleteResponse::new(key))
}

/// Handler for GET /prefix/:prefix
pub async fn prefix_handler(
    State(state): State<AppState>,
    Path(prefix): Path<String>,
) -> Json<PrefixResponse> {
    let found = state.cache.view_prefix(&prefix);
    Json(PrefixResponse::new(prefix, found))
}

/// Handler for GET /prefix
///
/// The empty prefix: every live entry.
pub async fn view_all_handler(State(state): State<AppState>) -> Json<PrefixResponse> {
    Json(PrefixResponse::new("", state.cache.view_prefix("")))
}

/// Handler for GET /len
pub async fn len_handler(State(state): State<AppState>) -> Json<LenResponse> {
    Json(LenResponse {
        len: state.cache.len(),
        live: state.cache.len_live(),
    })
}

/// Handler for DELETE /all
pub async fn delete_all_handler(State(state): State<AppState>) -> Json<DeleteAllResponse> {
    Json(DeleteAllResponse {
        removed: state.cache.delete_all(),
    })
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse::from(state.cache.stats()))
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn state() -> AppState {
        AppState::in_memory(CacheConfig::default().with_default_ttl(None)).unwrap()
    }

    fn write(key: &str, value: Value) -> Json<WriteRequest> {
        Json(WriteRequest {
            key: key.to_string(),
            value,
            ttl: None,
        })
    }

    #[tokio::test]
    async fn test_set_and_get_handler() {
        let state = state();

        let result = set_handler(State(state.clone()), write("test_key", json!("test_value"))).await;
        assert!(result.is_ok());

        let response = get_handler(State(state), Path("test_key".to_string()))
            .await
            .unwrap();
        assert_eq!(response.value, json!("test_value"));
    }

    #[tokio::test]
    async fn test_get_reports_remaining_ttl() {
        let state = state();
        let req = WriteRequest {
            key: "ttl_key".to_string(),
            value: json!(1),
            ttl: Some(60),
        };
        set_handler(State(state.clone()), Json(req)).await.unwrap();
        set_handler(State(state.clone()), write("plain", json!(2))).await.unwrap();

        let response = get_handler(State(state.clone()), Path("ttl_key".to_string()))
            .await
            .unwrap();
        let remaining = response.ttl_ms.unwrap();
        assert!(remaining > 59_000 && remaining <= 60_000);

        let response = get_handler(State(state), Path("plain".to_string()))
            .await
            .unwrap();
        assert!(response.ttl_ms.is_none());
    }

    #[tokio::test]
    async fn test_get_nonexistent_key() {
        let result = get_handler(State(state()), Path("nonexistent".to_string())).await;
        assert!(matches!(result, Err(CacheError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_add_then_add_conflicts() {
        let state = state();

        add_handler(State(state.clone()), write("b", json!(2))).await.unwrap();
        let second = add_handler(State(state.clone()), write("b", json!(3))).await;
        assert!(matches!(second, Err(CacheError::AlreadyExists(_))));

        let response = get_handler(State(state), Path("b".to_string())).await.unwrap();
        assert_eq!(response.value, json!(2));
    }

    #[tokio::test]
    async fn test_replace_missing_key() {
        let result = replace_handler(State(state()), write("missing", json!(1))).await;
        assert!(matches!(result, Err(CacheError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_delete_handler_is_idempotent() {
        let state = state();
        set_handler(State(state.clone()), write("to_delete", json!("v")))
            .await
            .unwrap();

        delete_handler(State(state.clone()), Path("to_delete".to_string())).await;
        delete_handler(State(state.clone()), Path("to_delete".to_string())).await;

        let result = get_handler(State(state), Path("to_delete".to_string())).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_prefix_len_and_delete_all() {
        let state = state();
        for (key, value) in [("user:1", "x"), ("user:2", "y"), ("order:1", "z")] {
            set_handler(State(state.clone()), write(key, json!(value)))
                .await
                .unwrap();
        }

        let view = prefix_handler(State(state.clone()), Path("user:".to_string())).await;
        assert_eq!(view.count, 2);
        assert_eq!(view.entries["user:1"], json!("x"));
        assert_eq!(view.entries["user:2"], json!("y"));

        let everything = view_all_handler(State(state.clone())).await;
        assert_eq!(everything.count, 3);
        assert_eq!(everything.prefix, "");

        assert_eq!(len_handler(State(state.clone())).await.len, 3);
        assert_eq!(delete_all_handler(State(state.clone())).await.removed, 3);
        assert_eq!(len_handler(State(state)).await.len, 0);
    }

    #[tokio::test]
    async fn test_stats_handler() {
        let response = stats_handler(State(state())).await;
        assert_eq!(response.hits, 0);
        assert_eq!(response.misses, 0);
    }

    #[tokio::test]
    async fn test_health_handler() {
        let response = health_handler().await;
        assert_eq!(response.status, "healthy");
    }

    #[tokio::test]
    async fn test_set_invalid_request() {
        let result = set_handler(State(state()), write("", json!("value"))).await;
        assert!(matches!(result, Err(CacheError::InvalidRequest(_))));
    }

    #[test]
    fn test_value_weight_grows_with_content() {
        let small = value_weight(&json!("a"));
        let large = value_weight(&json!("a".repeat(1_000)));
        assert_eq!(large - small, 999);
        assert!(value_weight(&json!({"k": [1, 2, 3]})) > value_weight(&json!([1, 2, 3])));
    }

    #[test]
    fn test_from_config_with_data_dir() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = ServerConfig {
            cache: CacheConfig::default()
                .with_shard_count(2)
                .with_default_ttl(None),
            server_port: 0,
            data_dir: Some(dir.path().to_path_buf()),
            memory_source: MemorySource::Tracked,
        };

        {
            let state = AppState::from_config(&config).unwrap();
            state.cache.set("persisted", json!({"n": 1}));
        }

        let state = AppState::from_config(&config).unwrap();
        assert_eq!(state.cache.get("persisted").unwrap(), json!({"n": 1}));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_from_config_with_rss_memory_source() {
        let config = ServerConfig {
            cache: CacheConfig::default().with_shard_count(2),
            server_port: 0,
            data_dir: None,
            memory_source: MemorySource::ProcessRss,
        };

        let state = AppState::from_config(&config).unwrap();
        // Resident memory of a running test process dwarfs an empty cache.
        assert!(state.cache.memory_usage().unwrap() > state.cache.approx_bytes());
    }
}
