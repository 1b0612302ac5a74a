//! Constants for the File Proxy API
//!
//! Centralizing constants makes them easy to find, modify, and test.

// ============================================================================
// HEADERS
// ============================================================================

/// Request correlation header, present on every proxy response
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Error classification header, present on every failure response
pub const ERROR_TYPE_HEADER: &str = "x-error-type";

/// Reports whether the body came from the cache (HIT, MISS, JOINED)
pub const CACHE_STATUS_HEADER: &str = "x-cache";

/// Proxied objects are treated as content-addressed and never change
pub const IMMUTABLE_CACHE_CONTROL: &str = "public, max-age=31536000, immutable";

/// Used when the backend does not report a content type
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

// ============================================================================
// KEY VALIDATION
// ============================================================================

/// Maximum accepted length of a file key, in bytes
pub const MAX_FILE_KEY_LENGTH: usize = 1024;

// ============================================================================
// CACHE DEFAULTS
// ============================================================================

/// Default maximum number of cached objects
pub const DEFAULT_CACHE_MAX_ENTRIES: usize = 100;

/// Default total cache budget (100MB)
pub const DEFAULT_CACHE_MAX_BYTES: usize = 100 * 1024 * 1024;

/// Default largest cacheable single object (10MB)
pub const DEFAULT_CACHE_MAX_OBJECT_BYTES: usize = 10 * 1024 * 1024;

/// Default time-to-live for cached objects (30 minutes)
pub const DEFAULT_CACHE_TTL_SECS: u64 = 30 * 60;

/// Default worth of one access, in milliseconds of idleness, for eviction
pub const DEFAULT_FREQUENCY_WEIGHT_MS: u64 = 1000;

/// Default interval of the expired-entry sweep
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 60;

// ============================================================================
// BACKEND FETCH
// ============================================================================

/// Default backend fetch timeout
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 30;

/// Default number of redirects followed on a backend fetch
pub const DEFAULT_FETCH_MAX_REDIRECTS: usize = 5;

// ============================================================================
// ACCESS LOG
// ============================================================================

/// Requests at or above this duration are flagged slow
pub const DEFAULT_SLOW_REQUEST_MS: u64 = 2000;

/// Default ring-buffer capacity of the access log
pub const DEFAULT_ACCESS_LOG_CAPACITY: usize = 1000;

/// Default number of entries returned by log listing endpoints
pub const DEFAULT_LOG_LIMIT: usize = 50;

// ============================================================================
// SERVER
// ============================================================================

/// Default mount point of the proxy routes
pub const DEFAULT_PROXY_PREFIX: &str = "/proxy";

/// Default listen port
pub const DEFAULT_PORT: u16 = 3000;
