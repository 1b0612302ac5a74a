//! HTTP Routes Module
//!
//! Includes:
//! - The file proxy endpoint
//! - Cache and access log administration
//! - Health check endpoints (Kubernetes-compatible)
//! - Prometheus metrics exposition

pub mod admin;
pub mod file;
pub mod health;

use axum::{
    routing::{delete, get},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::state::AppState;
use crate::telemetry::metrics_handler;

/// Routes mounted under the proxy prefix.
///
/// Wildcards never match an empty key, so the bare `/file` and `/file/`
/// forms are routed to the same handlers and rejected there as invalid keys.
fn proxy_routes() -> Router<AppState> {
    Router::new()
        .route("/file", get(file::proxy_file))
        .route("/file/", get(file::proxy_file))
        .route("/file/*file_key", get(file::proxy_file))
        .route("/cache/stats", get(admin::cache_stats))
        .route("/cache", delete(admin::clear_cache))
        .route("/cache/file", delete(admin::invalidate_file))
        .route("/cache/file/", delete(admin::invalidate_file))
        .route("/cache/file/*file_key", delete(admin::invalidate_file))
        .route("/logs/metrics", get(admin::log_metrics))
        .route("/logs/recent", get(admin::recent_logs))
        .route("/logs/failed", get(admin::failed_logs))
        .route("/logs/slow", get(admin::slow_logs))
}

/// Build the complete application router.
///
/// The proxy routes live under `config.proxy_prefix`; health checks and
/// `/metrics` are always at the root.
pub fn create_router(state: AppState) -> Router {
    let prefix = state.config.proxy_prefix.clone();

    let router = Router::new()
        .nest("/health", health::create_router())
        .route("/metrics", get(metrics_handler));

    // axum refuses to nest at "", so an empty prefix merges instead.
    let router = if prefix.is_empty() {
        router.merge(proxy_routes())
    } else {
        router.nest(&prefix, proxy_routes())
    };

    router.layer(TraceLayer::new_for_http()).with_state(state)
}
