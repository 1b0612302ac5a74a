//! File Proxy Endpoint
//!
//! `GET {prefix}/file/*file_key[?provider=<name>]`
//!
//! Each request moves through `Received -> Validated -> Resolved` and ends
//! in exactly one of `Served` or `Failed`. The [`RequestLifecycle`] value
//! tracks the stage and is consumed by [`RequestLifecycle::respond`], so a
//! request can produce at most one response. If the handler future is
//! dropped before that (the client hung up), the lifecycle's `Drop` records
//! a `CLIENT_CLOSED` access entry instead. Any backend fetch already started
//! keeps running in its own task and still fills the cache.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Body,
    extract::{
        rejection::{PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::{header, HeaderMap, HeaderName, StatusCode},
    response::{IntoResponse, Response},
};
use chrono::Utc;
use fileproxy_cache::{CacheKey, CacheStatus, Retrieved, StorageProvider};
use serde::Deserialize;
use uuid::Uuid;

use crate::access_log::{AccessLogEntry, AccessLogger};
use crate::constants::{CACHE_STATUS_HEADER, IMMUTABLE_CACHE_CONTROL, REQUEST_ID_HEADER};
use crate::error::{ApiError, ApiResult, ErrorCode};
use crate::state::AppState;
use crate::telemetry::METRICS;
use crate::validation::{parse_provider, validate_file_key};

// ============================================================================
// TYPES
// ============================================================================

/// Query parameters accepted by the proxy endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FileQuery {
    pub provider: Option<String>,
}

/// Non-terminal request stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Received,
    Validated,
    Resolved,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Received => "received",
            Stage::Validated => "validated",
            Stage::Resolved => "resolved",
        }
    }
}

/// Caller details captured for the access log.
#[derive(Debug, Clone, Default)]
struct ClientInfo {
    ip: Option<String>,
    user_agent: Option<String>,
}

impl ClientInfo {
    fn from_headers(headers: &HeaderMap) -> Self {
        let header_str = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
        };

        let ip = header_str("x-forwarded-for")
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .or_else(|| header_str("x-real-ip"))
            .map(str::to_string);

        Self {
            ip,
            user_agent: header_str(header::USER_AGENT.as_str()).map(str::to_string),
        }
    }
}

// ============================================================================
// LIFECYCLE
// ============================================================================

/// Tracks one proxy request from arrival to its single response.
pub struct RequestLifecycle {
    request_id: Uuid,
    started: Instant,
    stage: Stage,
    key: String,
    provider: Option<StorageProvider>,
    client: ClientInfo,
    access_log: Arc<AccessLogger>,
    finished: bool,
}

impl RequestLifecycle {
    fn received(access_log: Arc<AccessLogger>, headers: &HeaderMap) -> Self {
        Self {
            request_id: Uuid::now_v7(),
            started: Instant::now(),
            stage: Stage::Received,
            key: String::new(),
            provider: None,
            client: ClientInfo::from_headers(headers),
            access_log,
            finished: false,
        }
    }

    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    fn validated(&mut self, key: &str, provider: Option<StorageProvider>) {
        self.key = key.to_string();
        self.provider = provider;
        self.stage = Stage::Validated;
    }

    fn resolved(&mut self, provider: StorageProvider) {
        self.provider = Some(provider);
        self.stage = Stage::Resolved;
    }

    fn entry(&self, duration_ms: u64, status_code: u16) -> AccessLogEntry {
        AccessLogEntry {
            request_id: self.request_id,
            timestamp: Utc::now(),
            key: self.key.clone(),
            provider: self.provider,
            success: false,
            duration_ms,
            status_code,
            error_code: None,
            error_message: None,
            client_ip: self.client.ip.clone(),
            user_agent: self.client.user_agent.clone(),
            cache_status: None,
            slow: false,
        }
    }

    fn provider_label(&self) -> &'static str {
        self.provider.map(|p| p.as_str()).unwrap_or("unresolved")
    }

    /// Produce the one response for this request.
    pub fn respond(mut self, outcome: ApiResult<Retrieved>) -> Response {
        self.finished = true;
        let elapsed = self.started.elapsed();
        let duration_ms = elapsed.as_millis() as u64;

        let (response, entry) = match outcome {
            Ok(retrieved) => {
                let mut entry = self.entry(duration_ms, StatusCode::OK.as_u16());
                entry.success = true;
                entry.cache_status = Some(retrieved.status);

                tracing::info!(
                    request_id = %self.request_id,
                    key = %self.key,
                    provider = self.provider_label(),
                    cache = retrieved.status.as_str(),
                    size = retrieved.object.size(),
                    duration_ms,
                    "File served"
                );
                if let Ok(metrics) = METRICS.as_ref() {
                    metrics.record_cache_lookup(retrieved.status.as_str());
                }
                (served_response(self.request_id, retrieved), entry)
            }
            Err(err) => {
                let status = err.status_code();
                let mut entry = self.entry(duration_ms, status.as_u16());
                entry.error_code = Some(err.code);
                entry.error_message = Some(err.message.clone());

                if status.is_server_error() {
                    tracing::error!(
                        request_id = %self.request_id,
                        key = %self.key,
                        provider = self.provider_label(),
                        stage = self.stage.as_str(),
                        error = %err,
                        duration_ms,
                        "File request failed"
                    );
                } else {
                    tracing::warn!(
                        request_id = %self.request_id,
                        key = %self.key,
                        provider = self.provider_label(),
                        stage = self.stage.as_str(),
                        error = %err,
                        duration_ms,
                        "File request rejected"
                    );
                }
                (err.with_request_id(self.request_id).into_response(), entry)
            }
        };

        if let Ok(metrics) = METRICS.as_ref() {
            metrics.record_request(self.provider_label(), entry.status_code, elapsed.as_secs_f64());
        }
        self.access_log.record(entry);
        response
    }
}

impl Drop for RequestLifecycle {
    fn drop(&mut self) {
        if self.finished {
            return;
        }

        let elapsed = self.started.elapsed();
        let code = ErrorCode::ClientClosed;
        let mut entry = self.entry(elapsed.as_millis() as u64, code.status_code().as_u16());
        entry.error_code = Some(code);
        entry.error_message = Some(code.default_message().to_string());

        tracing::info!(
            request_id = %self.request_id,
            key = %self.key,
            provider = self.provider_label(),
            stage = self.stage.as_str(),
            duration_ms = entry.duration_ms,
            "Client disconnected before response"
        );
        if let Ok(metrics) = METRICS.as_ref() {
            metrics.record_request(self.provider_label(), entry.status_code, elapsed.as_secs_f64());
        }
        self.access_log.record(entry);
    }
}

fn served_response(request_id: Uuid, retrieved: Retrieved) -> Response {
    let Retrieved { object, status } = retrieved;
    let preserved = object.headers();

    let mut builder = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, object.content_type())
        .header(header::CONTENT_LENGTH, object.size())
        .header(header::CACHE_CONTROL, IMMUTABLE_CACHE_CONTROL)
        .header(HeaderName::from_static(REQUEST_ID_HEADER), request_id.to_string())
        .header(HeaderName::from_static(CACHE_STATUS_HEADER), status.as_str());

    if let Some(value) = &preserved.last_modified {
        builder = builder.header(header::LAST_MODIFIED, value);
    }
    if let Some(value) = &preserved.etag {
        builder = builder.header(header::ETAG, value);
    }
    if let Some(value) = &preserved.content_disposition {
        builder = builder.header(header::CONTENT_DISPOSITION, value);
    }

    builder
        .body(Body::from(object.body().clone()))
        .unwrap_or_else(|e| {
            ApiError::unknown(format!("Failed to build response: {}", e))
                .with_request_id(request_id)
                .into_response()
        })
}

// ============================================================================
// HANDLER
// ============================================================================

/// GET {prefix}/file/*file_key - Serve a stored object through the cache.
pub async fn proxy_file(
    State(state): State<AppState>,
    path: Result<Path<String>, PathRejection>,
    query: Result<Query<FileQuery>, QueryRejection>,
    headers: HeaderMap,
) -> Response {
    let mut lifecycle = RequestLifecycle::received(Arc::clone(&state.access_log), &headers);
    let outcome = retrieve(&state, &mut lifecycle, path, query).await;
    lifecycle.respond(outcome)
}

async fn retrieve(
    state: &AppState,
    lifecycle: &mut RequestLifecycle,
    path: Result<Path<String>, PathRejection>,
    query: Result<Query<FileQuery>, QueryRejection>,
) -> ApiResult<Retrieved> {
    let Path(file_key) = path.map_err(|e| ApiError::invalid_key(e.body_text()))?;
    lifecycle.key = file_key.clone();
    validate_file_key(&file_key)?;

    let Query(query) = query.map_err(|e| ApiError::invalid_provider(e.body_text()))?;
    let requested = parse_provider(query.provider.as_deref())?;
    lifecycle.validated(&file_key, requested);

    let resolved = state
        .resolver
        .resolve_signed_url(&file_key, requested)
        .await?;
    lifecycle.resolved(resolved.provider);

    let key = CacheKey::new(resolved.provider, file_key);
    let url = resolved.url;
    let retrieved = state.retrieval.get_or_fetch(&key, move || url).await?;

    if retrieved.status != CacheStatus::Hit {
        tracing::debug!(
            request_id = %lifecycle.request_id(),
            key = %key,
            cache = retrieved.status.as_str(),
            "Object fetched from storage backend"
        );
    }
    Ok(retrieved)
}
