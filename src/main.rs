//! shardkv server - the cache engine behind an HTTP binding
//!
//! Serves JSON values from a sharded TTL cache with background reaping and
//! memory-pressure eviction.

use std::net::SocketAddr;

use anyhow::Context;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use shardkv::api::{create_router, AppState};
use shardkv::config::ServerConfig;

/// Main entry point for the shardkv server.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Create the cache (in memory, or log-backed when `DATA_DIR` is set)
/// 4. Start the reaper and eviction tasks
/// 5. Serve HTTP until SIGINT/SIGTERM, then stop the background tasks
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing subscriber with env filter
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "shardkv=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting shardkv server");

    let config = ServerConfig::from_env();
    info!(
        shards = config.cache.shard_count,
        default_ttl = ?config.cache.default_ttl,
        reaper_interval = ?config.cache.reaper_interval,
        grace_period = ?config.cache.grace_period,
        soft_limit_bytes = config.cache.memory_soft_limit_bytes,
        evict_fraction = config.cache.evict_fraction,
        data_dir = ?config.data_dir,
        memory_probe = ?config.memory_source,
        port = config.server_port,
        "Configuration loaded"
    );

    let state = AppState::from_config(&config).context("failed to create cache")?;
    info!(entries = state.cache.len(), "Cache initialized");

    let maintenance = state.cache.spawn_maintenance();

    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    maintenance.shutdown().await;
    info!("Server shutdown complete");
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }
}
