//! Tracing Subscriber Initialization
//!
//! Installs a JSON formatter filtered by `RUST_LOG`. Falls back to debug
//! output for the proxy crates and info for everything else.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::{ApiError, ApiResult};

/// Filter used when `RUST_LOG` is unset or invalid.
pub const DEFAULT_LOG_FILTER: &str =
    "fileproxy_api=debug,fileproxy_cache=debug,tower_http=info,info";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
}

/// Initialize the global tracing subscriber.
///
/// Call once at startup, before anything logs. A second call fails because
/// a global subscriber is already installed.
pub fn init_tracing() -> ApiResult<()> {
    tracing_subscriber::registry()
        .with(env_filter())
        .with(tracing_subscriber::fmt::layer().json())
        .try_init()
        .map_err(|e| ApiError::unknown(format!("Failed to init subscriber: {}", e)))?;

    tracing::info!(
        service_name = env!("CARGO_PKG_NAME"),
        service_version = env!("CARGO_PKG_VERSION"),
        "Telemetry initialized"
    );

    Ok(())
}
