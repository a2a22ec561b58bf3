//! Route Cache server
//!
//! Serves cached content and an admin API over the caching engine.

use std::net::SocketAddr;

use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use route_cache::api::create_router;
use route_cache::{spawn_prune_task, AppState, Config};

/// Main entry point for the cache server.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load and validate configuration from environment variables
/// 3. Build the store, response cache, memoizer and warmer
/// 4. Start the background prune task and, if configured, periodic warming
/// 5. Serve until SIGINT/SIGTERM, then stop background work
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "route_cache=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Route Cache server");

    let config = Config::from_env();
    info!(
        "Configuration loaded: max_entries={}, response_max_entries={}, memo_max_entries={}, port={}, cleanup_interval={}s",
        config.max_entries,
        config.response_max_entries,
        config.memo_max_entries,
        config.server_port,
        config.cleanup_interval
    );

    let state = AppState::from_config(&config)?;
    info!("Caches initialized");

    let prune_handle = spawn_prune_task(state.prune_targets(), config.cleanup_interval);
    info!("Background prune task started");

    if let Some(interval) = config.warmup_interval() {
        state.warmer.start(interval);
    }
    let warmer = state.warmer.clone();

    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            prune_handle.abort();
            warmer.stop();
            warn!("Background tasks stopped");
        })
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                warn!("Failed to install SIGTERM handler: {}", err);
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
