//! Cache and Access Log Administration
//!
//! Introspection and maintenance endpoints mounted next to the proxy:
//! - GET    {prefix}/cache/stats
//! - DELETE {prefix}/cache
//! - DELETE {prefix}/cache/file/*file_key[?provider=]
//! - GET    {prefix}/logs/metrics
//! - GET    {prefix}/logs/recent?limit=
//! - GET    {prefix}/logs/failed?limit=
//! - GET    {prefix}/logs/slow?threshold_ms=&limit=

use axum::{
    extract::{
        rejection::{PathRejection, QueryRejection},
        Path, Query, State,
    },
    Json,
};
use fileproxy_cache::{CacheKey, CacheStats};
use serde::{Deserialize, Serialize};

use crate::access_log::{AccessLogEntry, AccessMetrics};
use crate::constants::DEFAULT_LOG_LIMIT;
use crate::error::{ApiError, ApiResult};
use crate::routes::file::FileQuery;
use crate::state::AppState;
use crate::validation::{parse_provider, validate_file_key};

// ============================================================================
// TYPES
// ============================================================================

/// Query parameters for the log listing endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogQuery {
    pub limit: Option<usize>,
    pub threshold_ms: Option<u64>,
}

impl LogQuery {
    fn limit(&self) -> usize {
        self.limit.unwrap_or(DEFAULT_LOG_LIMIT)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClearResponse {
    pub cleared: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvalidateResponse {
    pub invalidated: bool,
}

// ============================================================================
// CACHE HANDLERS
// ============================================================================

/// GET {prefix}/cache/stats
pub async fn cache_stats(State(state): State<AppState>) -> Json<CacheStats> {
    Json(state.retrieval.stats())
}

/// DELETE {prefix}/cache
pub async fn clear_cache(State(state): State<AppState>) -> Json<ClearResponse> {
    let cleared = state.retrieval.clear();
    tracing::info!(cleared, "Cache cleared");
    Json(ClearResponse { cleared })
}

/// DELETE {prefix}/cache/file/*file_key
///
/// Without `?provider=` the entry is looked up under the resolver's default
/// provider, which is where a plain GET would have cached it.
pub async fn invalidate_file(
    State(state): State<AppState>,
    path: Result<Path<String>, PathRejection>,
    query: Result<Query<FileQuery>, QueryRejection>,
) -> ApiResult<Json<InvalidateResponse>> {
    let Path(file_key) = path.map_err(|e| ApiError::invalid_key(e.body_text()))?;
    validate_file_key(&file_key)?;
    let Query(query) = query.map_err(|e| ApiError::invalid_provider(e.body_text()))?;
    let provider = parse_provider(query.provider.as_deref())?
        .unwrap_or_else(|| state.resolver.default_provider());

    let key = CacheKey::new(provider, file_key);
    let invalidated = state.retrieval.invalidate(&key);
    tracing::info!(key = %key, invalidated, "Cache entry invalidated");
    Ok(Json(InvalidateResponse { invalidated }))
}

// ============================================================================
// ACCESS LOG HANDLERS
// ============================================================================

/// GET {prefix}/logs/metrics
pub async fn log_metrics(State(state): State<AppState>) -> Json<AccessMetrics> {
    Json(state.access_log.metrics())
}

/// GET {prefix}/logs/recent
pub async fn recent_logs(
    State(state): State<AppState>,
    Query(query): Query<LogQuery>,
) -> Json<Vec<AccessLogEntry>> {
    Json(state.access_log.recent_logs(query.limit()))
}

/// GET {prefix}/logs/failed
pub async fn failed_logs(
    State(state): State<AppState>,
    Query(query): Query<LogQuery>,
) -> Json<Vec<AccessLogEntry>> {
    Json(state.access_log.failed_logs(query.limit()))
}

/// GET {prefix}/logs/slow
///
/// `threshold_ms` defaults to the configured slow-request threshold.
pub async fn slow_logs(
    State(state): State<AppState>,
    Query(query): Query<LogQuery>,
) -> Json<Vec<AccessLogEntry>> {
    let threshold_ms = query
        .threshold_ms
        .unwrap_or(state.access_log.slow_threshold().as_millis() as u64);
    Json(state.access_log.slow_logs(threshold_ms, query.limit()))
}
