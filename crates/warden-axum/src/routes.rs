//! Route definitions and router construction.
//!
//! Handlers are thin wrappers over the lifecycle supervisor and the config
//! store held in [`AppState`].

use std::path::Path;

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

use crate::bootstrap::CorsConfig;
use crate::handlers;
use crate::state::AppState;

/// Build CORS layer from configuration.
fn build_cors_layer(config: &CorsConfig) -> CorsLayer {
    match config {
        CorsConfig::AllowAll => CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any),
        CorsConfig::AllowOrigins(origins) => {
            use axum::http::HeaderValue;
            let allowed: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();
            CorsLayer::new()
                .allow_origin(allowed)
                .allow_methods(Any)
                .allow_headers(Any)
        }
    }
}

/// All API routes without the `/api` prefix.
pub(crate) fn api_routes() -> Router<AppState> {
    Router::new()
        // Lifecycle commands
        .route("/server/status", get(handlers::server::status))
        .route("/server/start", post(handlers::server::start))
        .route("/server/stop", post(handlers::server::stop))
        .route("/server/restart", post(handlers::server::restart))
        .route("/server/kill", post(handlers::server::kill))
        .route("/server/command", post(handlers::server::command))
        // Launch configuration
        .route(
            "/config/launch",
            get(handlers::config::get_launch).put(handlers::config::update_launch),
        )
        // Console
        .route("/console/history", get(handlers::console::history))
        .route("/console/ws", get(handlers::console::console_ws))
        // Events (SSE)
        .route("/events", get(handlers::events::stream))
        // System
        .route("/system/telemetry", get(handlers::system::telemetry))
}

/// Create the main Axum router with all API routes.
///
/// For serving static assets as well, use [`create_spa_router`].
pub fn create_router(state: AppState, cors_config: &CorsConfig) -> Router {
    let cors = build_cors_layer(cors_config);

    Router::new()
        .route("/health", get(health_check))
        .nest("/api", api_routes().with_state(state).layer(cors))
        .layer(TraceLayer::new_for_http())
}

/// Create a router with API routes and static asset serving.
///
/// API routes take priority; other paths are served from `static_dir`, falling
/// back to `index.html` for client-side routing.
pub fn create_spa_router<P: AsRef<Path>>(
    state: AppState,
    static_dir: P,
    cors_config: &CorsConfig,
) -> Router {
    let static_path = static_dir.as_ref();
    let index_path = static_path.join("index.html");

    let serve_dir = ServeDir::new(static_path).fallback(ServeFile::new(&index_path));

    create_router(state, cors_config).fallback_service(serve_dir)
}

/// Health check endpoint.
pub(crate) async fn health_check() -> &'static str {
    "OK"
}
