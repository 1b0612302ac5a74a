//! Proxy Configuration Module
//!
//! Configuration for the cache, backend fetches, access logging and storage
//! endpoints. Values are loaded from `FILEPROXY_*` environment variables with
//! the defaults in `constants`.

use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use fileproxy_cache::{CacheConfig, StorageProvider};

use crate::constants::*;

// ============================================================================
// PROXY CONFIGURATION
// ============================================================================

/// Runtime configuration for the file proxy.
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    // ========================================================================
    // Cache
    // ========================================================================
    /// Maximum number of resident objects.
    pub cache_max_entries: usize,

    /// Maximum total bytes of resident objects.
    pub cache_max_bytes: usize,

    /// Objects larger than this are served but never cached.
    pub cache_max_object_bytes: usize,

    /// Lifetime of a cached object, measured from when it was fetched.
    pub cache_ttl: Duration,

    /// Eviction weighting: one access is worth this many idle milliseconds.
    pub frequency_weight_ms: u64,

    /// How often expired objects are swept in the background.
    pub sweep_interval: Duration,

    // ========================================================================
    // Backend fetch
    // ========================================================================
    /// Timeout of a single backend fetch.
    pub fetch_timeout: Duration,

    /// Redirects followed before a fetch is failed.
    pub fetch_max_redirects: usize,

    // ========================================================================
    // Access log
    // ========================================================================
    /// Requests at or above this duration are flagged slow.
    pub slow_request_threshold: Duration,

    /// Ring-buffer capacity of the access log.
    pub access_log_capacity: usize,

    // ========================================================================
    // Routing / storage
    // ========================================================================
    /// Provider used when a request does not name one.
    pub default_provider: StorageProvider,

    /// Mount point of the proxy routes, e.g. "/proxy".
    pub proxy_prefix: String,

    /// Base URL per storage provider.
    /// Example: FILEPROXY_ENDPOINT_MINIO="https://minio.internal/bucket"
    pub endpoints: HashMap<StorageProvider, String>,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            cache_max_entries: DEFAULT_CACHE_MAX_ENTRIES,
            cache_max_bytes: DEFAULT_CACHE_MAX_BYTES,
            cache_max_object_bytes: DEFAULT_CACHE_MAX_OBJECT_BYTES,
            cache_ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
            frequency_weight_ms: DEFAULT_FREQUENCY_WEIGHT_MS,
            sweep_interval: Duration::from_secs(DEFAULT_SWEEP_INTERVAL_SECS),
            fetch_timeout: Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS),
            fetch_max_redirects: DEFAULT_FETCH_MAX_REDIRECTS,
            slow_request_threshold: Duration::from_millis(DEFAULT_SLOW_REQUEST_MS),
            access_log_capacity: DEFAULT_ACCESS_LOG_CAPACITY,
            default_provider: StorageProvider::Minio,
            proxy_prefix: DEFAULT_PROXY_PREFIX.to_string(),
            endpoints: HashMap::new(),
        }
    }
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

impl ProxyConfig {
    /// Create ProxyConfig from environment variables.
    ///
    /// Environment variables:
    /// - `FILEPROXY_CACHE_MAX_ENTRIES` (default: 100)
    /// - `FILEPROXY_CACHE_MAX_BYTES` (default: 104857600)
    /// - `FILEPROXY_CACHE_MAX_OBJECT_BYTES` (default: 10485760)
    /// - `FILEPROXY_CACHE_TTL_SECS` (default: 1800)
    /// - `FILEPROXY_CACHE_FREQUENCY_WEIGHT_MS` (default: 1000)
    /// - `FILEPROXY_CACHE_SWEEP_INTERVAL_SECS` (default: 60)
    /// - `FILEPROXY_FETCH_TIMEOUT_SECS` (default: 30)
    /// - `FILEPROXY_FETCH_MAX_REDIRECTS` (default: 5)
    /// - `FILEPROXY_SLOW_REQUEST_MS` (default: 2000)
    /// - `FILEPROXY_ACCESS_LOG_CAPACITY` (default: 1000)
    /// - `FILEPROXY_DEFAULT_PROVIDER` (default: minio)
    /// - `FILEPROXY_PROXY_PREFIX` (default: /proxy)
    /// - `FILEPROXY_ENDPOINT_<PROVIDER>`: base URL for each provider
    pub fn from_env() -> Self {
        let default_provider = std::env::var("FILEPROXY_DEFAULT_PROVIDER")
            .ok()
            .and_then(|s| match s.parse::<StorageProvider>() {
                Ok(provider) => Some(provider),
                Err(e) => {
                    tracing::warn!(error = %e, "Ignoring FILEPROXY_DEFAULT_PROVIDER");
                    None
                }
            })
            .unwrap_or(StorageProvider::Minio);

        let proxy_prefix = std::env::var("FILEPROXY_PROXY_PREFIX")
            .map(|s| normalize_prefix(&s))
            .unwrap_or_else(|_| DEFAULT_PROXY_PREFIX.to_string());

        let endpoints = StorageProvider::ALL
            .into_iter()
            .filter_map(|provider| {
                let var = format!("FILEPROXY_ENDPOINT_{}", provider.as_str().to_uppercase());
                std::env::var(var)
                    .ok()
                    .map(|url| url.trim().trim_end_matches('/').to_string())
                    .filter(|url| !url.is_empty())
                    .map(|url| (provider, url))
            })
            .collect();

        Self {
            cache_max_entries: env_or("FILEPROXY_CACHE_MAX_ENTRIES", DEFAULT_CACHE_MAX_ENTRIES),
            cache_max_bytes: env_or("FILEPROXY_CACHE_MAX_BYTES", DEFAULT_CACHE_MAX_BYTES),
            cache_max_object_bytes: env_or(
                "FILEPROXY_CACHE_MAX_OBJECT_BYTES",
                DEFAULT_CACHE_MAX_OBJECT_BYTES,
            ),
            cache_ttl: Duration::from_secs(env_or(
                "FILEPROXY_CACHE_TTL_SECS",
                DEFAULT_CACHE_TTL_SECS,
            )),
            frequency_weight_ms: env_or(
                "FILEPROXY_CACHE_FREQUENCY_WEIGHT_MS",
                DEFAULT_FREQUENCY_WEIGHT_MS,
            ),
            sweep_interval: Duration::from_secs(env_or(
                "FILEPROXY_CACHE_SWEEP_INTERVAL_SECS",
                DEFAULT_SWEEP_INTERVAL_SECS,
            )),
            fetch_timeout: Duration::from_secs(env_or(
                "FILEPROXY_FETCH_TIMEOUT_SECS",
                DEFAULT_FETCH_TIMEOUT_SECS,
            )),
            fetch_max_redirects: env_or(
                "FILEPROXY_FETCH_MAX_REDIRECTS",
                DEFAULT_FETCH_MAX_REDIRECTS,
            ),
            slow_request_threshold: Duration::from_millis(env_or(
                "FILEPROXY_SLOW_REQUEST_MS",
                DEFAULT_SLOW_REQUEST_MS,
            )),
            access_log_capacity: env_or(
                "FILEPROXY_ACCESS_LOG_CAPACITY",
                DEFAULT_ACCESS_LOG_CAPACITY,
            ),
            default_provider,
            proxy_prefix,
            endpoints,
        }
    }

    /// Cache store settings derived from this configuration.
    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig::new()
            .with_max_entries(self.cache_max_entries)
            .with_max_bytes(self.cache_max_bytes)
            .with_max_object_bytes(self.cache_max_object_bytes)
            .with_ttl(self.cache_ttl)
            .with_frequency_weight_ms(self.frequency_weight_ms)
    }
}

/// Ensure a leading slash and no trailing slash. An empty prefix mounts the
/// proxy at the root.
fn normalize_prefix(raw: &str) -> String {
    let trimmed = raw.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{}", trimmed)
    }
}
