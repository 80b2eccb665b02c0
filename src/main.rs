//! Meridian Cache - an in-memory content cache with rate limiting and prefetch

use std::net::SocketAddr;
use std::time::Duration;

use tokio::signal;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use meridian_cache::{
    create_router, spawn_cache_cleanup_task, spawn_rate_limit_sweep_task, AppState, Config,
};

/// Main entry point for the cache server.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load and validate configuration from environment variables
/// 3. Build the cache, rate limiter and prefetcher
/// 4. Start the background sweep tasks
/// 5. Serve HTTP until SIGINT/SIGTERM
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "meridian_cache=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Meridian Cache Server");

    let config = Config::from_env();
    config.validate()?;
    info!(
        "Configuration loaded: max_items={}, max_size_bytes={}, port={}, rate_limit={}/{}ms, prefetch_base_url={}",
        config.cache_max_items,
        config.cache_max_size_bytes,
        config.server_port,
        config.rate_limit_max_requests,
        config.rate_limit_window_ms,
        config.prefetch_base_url
    );

    let state = AppState::from_config(&config)?;
    info!("Cache store, rate limiter and prefetcher initialized");

    let cleanup_handle = spawn_cache_cleanup_task(
        state.cache.clone(),
        Duration::from_secs(config.cache_cleanup_interval),
    );
    let sweep_handle = spawn_rate_limit_sweep_task(
        state.limiter.clone(),
        Duration::from_secs(config.rate_limit_sweep_interval),
    );
    info!("Background sweep tasks started");

    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(vec![cleanup_handle, sweep_handle]))
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM), then aborts the background tasks.
async fn shutdown_signal(background: Vec<JoinHandle<()>>) {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", err);
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
                error!("Failed to install SIGTERM handler: {}", err);
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

    for handle in background {
        handle.abort();
    }
    warn!("Background tasks aborted");
}
