//! File Proxy Server Entry Point
//!
//! Loads configuration from the environment, wires the cache to the HTTP
//! fetcher and endpoint resolver, and starts the Axum HTTP server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use fileproxy_api::constants::DEFAULT_PORT;
use fileproxy_api::telemetry::init_tracing;
use fileproxy_api::{
    create_router, ApiError, ApiResult, AppState, EndpointResolver, HttpFetcher, ProxyConfig,
};
use fileproxy_cache::RetrievalService;

#[tokio::main]
async fn main() -> ApiResult<()> {
    init_tracing()?;

    let config = ProxyConfig::from_env();
    if config.endpoints.is_empty() {
        tracing::warn!("No FILEPROXY_ENDPOINT_* configured; every file request will fail to resolve");
    }

    let fetcher = Arc::new(HttpFetcher::from_config(&config)?);
    let resolver = Arc::new(EndpointResolver::new(
        config.endpoints.clone(),
        config.default_provider,
    ));
    let sweep_interval = config.sweep_interval;

    let state = AppState::new(config, fetcher, resolver);
    let janitor = tokio::spawn(sweep_expired(Arc::clone(&state.retrieval), sweep_interval));

    let app = create_router(state);

    let addr = resolve_bind_addr()?;
    tracing::info!(%addr, "Starting file proxy server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ApiError::unknown(format!("Failed to bind {}: {}", addr, e)))?;

    let server = axum::serve(listener, app);
    tokio::select! {
        result = server => {
            result.map_err(|e| ApiError::unknown(format!("Server error: {}", e)))?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    janitor.abort();
    Ok(())
}

/// Periodically drop expired objects so idle keys do not pin memory until
/// their next read.
async fn sweep_expired(retrieval: Arc<RetrievalService>, every: Duration) {
    let mut ticker = tokio::time::interval(every.max(Duration::from_secs(1)));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        let purged = retrieval.purge_expired();
        if purged > 0 {
            tracing::debug!(purged, "Expired cache entries swept");
        }
    }
}

fn resolve_bind_addr() -> ApiResult<SocketAddr> {
    let host = std::env::var("FILEPROXY_BIND").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port_str = std::env::var("PORT")
        .ok()
        .or_else(|| std::env::var("FILEPROXY_PORT").ok())
        .unwrap_or_else(|| DEFAULT_PORT.to_string());
    let port = port_str
        .parse::<u16>()
        .map_err(|_| ApiError::unknown(format!("Invalid port value: {}", port_str)))?;

    let addr = format!("{}:{}", host, port);
    addr.parse::<SocketAddr>()
        .map_err(|e| ApiError::unknown(format!("Invalid bind address {}: {}", addr, e)))
}
