//! API Routes
//!
//! Configures the Axum router with all orchestrator endpoints.

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    activate_handler, click_handler, fetch_handler, generations_handler, health_handler,
    install_handler, lifecycle_handler, message_handler, push_handler, queue_handler,
    stats_handler, sync_handler, AppState,
};

/// Creates the main router with all endpoints configured.
///
/// # Middleware
/// - CORS: Allows any origin (the storefront runs on a different port)
/// - Tracing: Logs all requests for debugging
pub fn create_router(state: AppState) -> Router {
    // Configure CORS middleware
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/fetch", post(fetch_handler))
        .route("/lifecycle", get(lifecycle_handler))
        .route("/lifecycle/install", post(install_handler))
        .route("/lifecycle/activate", post(activate_handler))
        .route("/message", post(message_handler))
        .route("/sync/:tag", post(sync_handler))
        .route("/push", post(push_handler))
        .route("/notification/click", post(click_handler))
        .route("/generations", get(generations_handler))
        .route("/queue", get(queue_handler))
        .route("/stats", get(stats_handler))
        .route("/health", get(health_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
