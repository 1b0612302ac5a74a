//! Prometheus Metrics Definitions
//!
//! Defines the proxy metrics and the `/metrics` endpoint for Prometheus
//! scraping. Labels are bounded: providers are a closed set, statuses are
//! HTTP codes, lookup results are HIT/MISS/JOINED.

use axum::{http::StatusCode, response::IntoResponse};
use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram_vec, register_int_counter, CounterVec, Encoder,
    HistogramVec, IntCounter, TextEncoder,
};

use crate::error::{ApiError, ApiResult};

/// Proxy request latency buckets (seconds)
/// Covers: 1ms up to 30s, the default backend timeout.
const REQUEST_LATENCY_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0, 2.5, 5.0, 10.0, 30.0,
];

/// Global metrics instance - initialized once at startup
pub static METRICS: Lazy<ApiResult<ProxyMetrics>> = Lazy::new(ProxyMetrics::new);

/// Container for all proxy metrics.
#[derive(Clone)]
pub struct ProxyMetrics {
    /// Proxy request counter - labels: provider, status
    pub requests_total: CounterVec,

    /// Proxy request duration histogram - labels: provider
    pub request_duration_seconds: HistogramVec,

    /// Cache lookup counter - labels: result
    pub cache_lookups_total: CounterVec,

    /// Bytes read from storage backends
    pub backend_fetch_bytes_total: IntCounter,
}

impl ProxyMetrics {
    /// Create and register all metrics with Prometheus.
    pub fn new() -> ApiResult<Self> {
        Ok(Self {
            requests_total: register_counter_vec!(
                "fileproxy_requests_total",
                "Total number of proxied file requests",
                &["provider", "status"]
            )
            .map_err(|e| ApiError::unknown(format!("Failed to register requests_total: {}", e)))?,

            request_duration_seconds: register_histogram_vec!(
                "fileproxy_request_duration_seconds",
                "Proxied file request duration in seconds",
                &["provider"],
                REQUEST_LATENCY_BUCKETS.to_vec()
            )
            .map_err(|e| {
                ApiError::unknown(format!("Failed to register request_duration_seconds: {}", e))
            })?,

            cache_lookups_total: register_counter_vec!(
                "fileproxy_cache_lookups_total",
                "Cache lookups by result",
                &["result"]
            )
            .map_err(|e| {
                ApiError::unknown(format!("Failed to register cache_lookups_total: {}", e))
            })?,

            backend_fetch_bytes_total: register_int_counter!(
                "fileproxy_backend_fetch_bytes_total",
                "Total bytes fetched from storage backends"
            )
            .map_err(|e| {
                ApiError::unknown(format!("Failed to register backend_fetch_bytes_total: {}", e))
            })?,
        })
    }

    /// Record a finished proxy request.
    pub fn record_request(&self, provider: &str, status: u16, duration_secs: f64) {
        let status_str = status.to_string();
        self.requests_total
            .with_label_values(&[provider, &status_str])
            .inc();
        self.request_duration_seconds
            .with_label_values(&[provider])
            .observe(duration_secs);
    }

    /// Record how a cache lookup was satisfied.
    pub fn record_cache_lookup(&self, result: &str) {
        self.cache_lookups_total.with_label_values(&[result]).inc();
    }

    pub fn record_backend_bytes(&self, bytes: usize) {
        self.backend_fetch_bytes_total.inc_by(bytes as u64);
    }
}

/// Handler for GET /metrics endpoint.
///
/// Returns Prometheus text format metrics.
pub async fn metrics_handler() -> impl IntoResponse {
    // Registration happens on first touch; make sure the families exist
    // even before the first proxied request.
    if let Err(e) = METRICS.as_ref() {
        tracing::error!(error = %e, "Metrics registry unavailable");
    }

    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    match encoder.encode(&metric_families, &mut buffer) {
        Ok(_) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            buffer,
        ),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [("content-type", "text/plain")],
                format!("Failed to encode metrics: {}", e).into_bytes(),
            )
        }
    }
}
