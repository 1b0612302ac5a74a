//! Error Types for the File Proxy API
//!
//! This module defines error handling for the HTTP layer, including:
//! - ErrorCode enum for the proxy's error taxonomy
//! - ApiError struct carrying code, message and request correlation
//! - IntoResponse implementation producing the JSON error body
//!
//! Every failure response carries `X-Request-ID` and `X-Error-Type` headers
//! and a body of the form
//! `{statusCode, message, error, timestamp, requestId}`.

use axum::{
    http::{HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use fileproxy_cache::{FetchError, UnknownProvider};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::constants::{ERROR_TYPE_HEADER, REQUEST_ID_HEADER};
use crate::resolver::ResolveError;

// ============================================================================
// ERROR CODE ENUM
// ============================================================================

/// Error codes for proxy responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Malformed or unsafe object key
    InvalidKey,

    /// Provider name outside the supported set
    InvalidProvider,

    /// Storage backend reports the object does not exist
    NotFound,

    /// Signed URL could not be produced
    SigningError,

    /// Storage backend unreachable or returned an error status
    StorageError,

    /// Storage backend fetch exceeded its timeout
    Timeout,

    /// Anything uncategorized
    Unknown,

    /// Client went away before a response was produced. Only ever recorded
    /// in the access log; no response is written for it.
    ClientClosed,
}

impl ErrorCode {
    /// Get the HTTP status code for this error code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorCode::InvalidKey | ErrorCode::InvalidProvider => StatusCode::BAD_REQUEST,
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::SigningError | ErrorCode::Unknown => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorCode::StorageError => StatusCode::SERVICE_UNAVAILABLE,
            ErrorCode::Timeout => StatusCode::GATEWAY_TIMEOUT,
            ErrorCode::ClientClosed => {
                StatusCode::from_u16(499).unwrap_or(StatusCode::BAD_REQUEST)
            }
        }
    }

    /// Get a default message for this error code.
    pub fn default_message(&self) -> &'static str {
        match self {
            ErrorCode::InvalidKey => "Invalid file key",
            ErrorCode::InvalidProvider => "Unsupported storage provider",
            ErrorCode::NotFound => "File not found",
            ErrorCode::SigningError => "Failed to generate file access URL",
            ErrorCode::StorageError => "Storage service unavailable",
            ErrorCode::Timeout => "Storage backend timed out",
            ErrorCode::Unknown => "Internal server error",
            ErrorCode::ClientClosed => "Client closed request",
        }
    }

    /// The wire form used in the `error` field and `X-Error-Type` header.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::InvalidKey => "INVALID_KEY",
            ErrorCode::InvalidProvider => "INVALID_PROVIDER",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::SigningError => "SIGNING_ERROR",
            ErrorCode::StorageError => "STORAGE_ERROR",
            ErrorCode::Timeout => "TIMEOUT",
            ErrorCode::Unknown => "UNKNOWN",
            ErrorCode::ClientClosed => "CLIENT_CLOSED",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// API ERROR STRUCT
// ============================================================================

/// Structured error for proxy operations.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiError {
    /// Error code categorizing the error
    pub code: ErrorCode,

    /// Human-readable error message
    pub message: String,

    /// Correlation id of the request that failed, when known
    pub request_id: Option<Uuid>,
}

/// JSON body written for failed requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub status_code: u16,
    pub message: String,
    pub error: ErrorCode,
    pub timestamp: DateTime<Utc>,
    pub request_id: Uuid,
}

impl ApiError {
    /// Create a new API error with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            request_id: None,
        }
    }

    /// Create a new API error with the given code, using the default message.
    pub fn from_code(code: ErrorCode) -> Self {
        Self::new(code, code.default_message())
    }

    /// Attach the request correlation id.
    pub fn with_request_id(mut self, request_id: Uuid) -> Self {
        self.request_id = Some(request_id);
        self
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        self.code.status_code()
    }

    pub fn invalid_key(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidKey, message)
    }

    pub fn invalid_provider(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidProvider, message)
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unknown, message)
    }

    /// Build the JSON body for this error.
    pub fn body(&self, request_id: Uuid) -> ErrorBody {
        ErrorBody {
            status_code: self.status_code().as_u16(),
            message: self.message.clone(),
            error: self.code,
            timestamp: Utc::now(),
            request_id,
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

// ============================================================================
// AXUM INTEGRATION
// ============================================================================

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let request_id = self.request_id.unwrap_or_else(Uuid::now_v7);
        let status = self.status_code();
        let mut response = (status, Json(self.body(request_id))).into_response();

        let headers = response.headers_mut();
        if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
            headers.insert(HeaderName::from_static(REQUEST_ID_HEADER), value);
        }
        headers.insert(
            HeaderName::from_static(ERROR_TYPE_HEADER),
            HeaderValue::from_static(self.code.as_str()),
        );
        response
    }
}

// ============================================================================
// CONVERSIONS FROM LOWER LAYERS
// ============================================================================

impl From<FetchError> for ApiError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::NotFound => ApiError::from_code(ErrorCode::NotFound),
            FetchError::Status { status } => ApiError::new(
                ErrorCode::StorageError,
                format!("Storage backend returned status {}", status),
            ),
            FetchError::Timeout => ApiError::from_code(ErrorCode::Timeout),
            FetchError::Connection(reason) => {
                tracing::debug!(reason = %reason, "Storage backend connection failure");
                ApiError::from_code(ErrorCode::StorageError)
            }
            FetchError::Unknown(reason) => {
                tracing::debug!(reason = %reason, "Unclassified fetch failure");
                ApiError::from_code(ErrorCode::Unknown)
            }
        }
    }
}

impl From<ResolveError> for ApiError {
    fn from(err: ResolveError) -> Self {
        match err {
            ResolveError::Configuration(reason) | ResolveError::Signing(reason) => {
                tracing::debug!(reason = %reason, "Signed URL resolution failed");
                ApiError::from_code(ErrorCode::SigningError)
            }
            ResolveError::Unavailable(reason) => {
                tracing::debug!(reason = %reason, "Storage service unavailable for signing");
                ApiError::from_code(ErrorCode::StorageError)
            }
        }
    }
}

impl From<UnknownProvider> for ApiError {
    fn from(err: UnknownProvider) -> Self {
        ApiError::invalid_provider(err.to_string())
    }
}

// ============================================================================
// RESULT TYPE ALIAS
// ============================================================================

/// Result type alias for API operations.
pub type ApiResult<T> = Result<T, ApiError>;
