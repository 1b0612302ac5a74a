//! File Proxy API - HTTP front end for the object cache
//!
//! Serves objects from S3-compatible storage through an in-memory,
//! request-collapsing cache:
//!
//! - `routes`: the axum router, proxy handler and admin endpoints
//! - `fetcher`: reqwest-backed `Fetcher`
//! - `resolver`: signed URL resolution seam and a static endpoint resolver
//! - `access_log`: bounded access log with on-demand aggregates
//! - `telemetry`: tracing subscriber and Prometheus metrics

pub mod access_log;
pub mod config;
pub mod constants;
pub mod error;
pub mod fetcher;
pub mod resolver;
pub mod routes;
pub mod state;
pub mod telemetry;
pub mod validation;

pub use access_log::{AccessLogEntry, AccessLogger, AccessMetrics, ProviderMetrics};
pub use config::ProxyConfig;
pub use error::{ApiError, ApiResult, ErrorBody, ErrorCode};
pub use fetcher::HttpFetcher;
pub use resolver::{EndpointResolver, ResolveError, ResolvedUrl, UrlResolver};
pub use routes::create_router;
pub use state::AppState;
