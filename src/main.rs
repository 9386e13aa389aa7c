//! Offline Orders - Offline request-interception cache orchestrator
//!
//! Runs the orchestrator as a local HTTP sidecar for the storefront.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::signal;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use offline_orders::api::create_router;
use offline_orders::db::Database;
use offline_orders::network::HttpNetwork;
use offline_orders::{spawn_menu_refresh_task, AppState, Config, Event};

/// Main entry point for the orchestrator.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Open the database and bootstrap the worker
/// 4. Install the static generation unless it is already current
/// 5. Start the background menu refresh task
/// 6. Serve the HTTP surface on the configured port
/// 7. Handle graceful shutdown on SIGINT/SIGTERM
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "offline_orders=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting offline orders orchestrator");

    let config = Config::from_env();
    info!(
        "Configuration loaded: origin={}, version={}, port={}, db={}",
        config.origin, config.cache_version, config.server_port, config.database_path
    );

    let db = Arc::new(
        Database::open(&config.database_path)
            .with_context(|| format!("opening database at {}", config.database_path))?,
    );
    let network = Arc::new(HttpNetwork::new()?);
    let state = AppState::from_config(&config, db, network)?;
    let worker = state.worker.clone();

    if worker.lifecycle().is_current_version().await {
        info!("Static generation for {} already active", config.cache_version);
    } else if let Err(e) = worker.dispatch(Event::Install).await {
        // The previous generation, if any, keeps serving.
        warn!(error = %e, "Install failed");
    }

    let refresh_handle = (config.menu_refresh_interval > 0)
        .then(|| spawn_menu_refresh_task(worker.clone(), config.menu_refresh_interval));

    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(refresh_handle))
        .await?;

    worker.shutdown();
    info!("Server shutdown complete");
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
///
/// On shutdown signal, aborts the menu refresh task and allows graceful shutdown.
async fn shutdown_signal(refresh_handle: Option<JoinHandle<()>>) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
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
                warn!(error = %e, "Failed to install SIGTERM handler");
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

    if let Some(handle) = refresh_handle {
        handle.abort();
        warn!("Menu refresh task aborted");
    }
}
