//! Access Log
//!
//! Bounded in-memory record of proxied requests. Every request the proxy
//! finishes (served, failed, or abandoned by the client) lands here once.
//! Aggregates are computed from the buffer on demand, so they always
//! describe exactly the entries currently retained.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use fileproxy_cache::{CacheStatus, StorageProvider};
use serde::Serialize;
use uuid::Uuid;

use crate::error::ErrorCode;

/// Label used in breakdowns for requests that never resolved a provider.
const UNRESOLVED_PROVIDER: &str = "unresolved";

// ============================================================================
// TYPES
// ============================================================================

/// One finished proxy request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessLogEntry {
    pub request_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub key: String,
    pub provider: Option<StorageProvider>,
    pub success: bool,
    pub duration_ms: u64,
    pub status_code: u16,
    pub error_code: Option<ErrorCode>,
    pub error_message: Option<String>,
    pub client_ip: Option<String>,
    pub user_agent: Option<String>,
    pub cache_status: Option<CacheStatus>,
    /// Set by the logger when the entry is recorded.
    pub slow: bool,
}

/// Per-provider slice of [`AccessMetrics`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderMetrics {
    pub total: usize,
    pub success: usize,
    pub failure: usize,
    pub average_duration_ms: f64,
}

/// Aggregate view over the retained entries.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessMetrics {
    pub total_requests: usize,
    pub successful_requests: usize,
    pub failed_requests: usize,
    pub success_rate: f64,
    pub average_duration_ms: f64,
    pub slow_requests: usize,
    pub by_provider: BTreeMap<String, ProviderMetrics>,
    pub by_error: BTreeMap<String, usize>,
}

// ============================================================================
// LOGGER
// ============================================================================

/// Fixed-capacity ring buffer of [`AccessLogEntry`].
#[derive(Debug)]
pub struct AccessLogger {
    entries: Mutex<VecDeque<AccessLogEntry>>,
    capacity: usize,
    slow_threshold: Duration,
}

impl AccessLogger {
    pub fn new(capacity: usize, slow_threshold: Duration) -> Self {
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity.min(4096))),
            capacity,
            slow_threshold,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn slow_threshold(&self) -> Duration {
        self.slow_threshold
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<AccessLogEntry>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Append an entry, dropping the oldest one when full.
    pub fn record(&self, mut entry: AccessLogEntry) {
        entry.slow = u128::from(entry.duration_ms) >= self.slow_threshold.as_millis();
        if entry.slow {
            tracing::warn!(
                request_id = %entry.request_id,
                key = %entry.key,
                provider = ?entry.provider,
                duration_ms = entry.duration_ms,
                threshold_ms = self.slow_threshold.as_millis() as u64,
                "Slow file request"
            );
        }

        if self.capacity == 0 {
            return;
        }

        let mut entries = self.lock();
        while entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Compute aggregates over the retained entries.
    pub fn metrics(&self) -> AccessMetrics {
        let entries = self.lock();
        if entries.is_empty() {
            return AccessMetrics::default();
        }

        let mut metrics = AccessMetrics {
            total_requests: entries.len(),
            ..Default::default()
        };
        let mut total_duration: u64 = 0;
        let mut provider_durations: BTreeMap<String, u64> = BTreeMap::new();

        for entry in entries.iter() {
            total_duration = total_duration.saturating_add(entry.duration_ms);
            if entry.success {
                metrics.successful_requests += 1;
            } else {
                metrics.failed_requests += 1;
            }
            if entry.slow {
                metrics.slow_requests += 1;
            }

            let provider = entry
                .provider
                .map(|p| p.as_str())
                .unwrap_or(UNRESOLVED_PROVIDER)
                .to_string();
            let slice = metrics.by_provider.entry(provider.clone()).or_default();
            slice.total += 1;
            if entry.success {
                slice.success += 1;
            } else {
                slice.failure += 1;
            }
            let duration = provider_durations.entry(provider).or_default();
            *duration = duration.saturating_add(entry.duration_ms);

            if let Some(code) = entry.error_code {
                *metrics.by_error.entry(code.as_str().to_string()).or_default() += 1;
            }
        }

        for (provider, slice) in metrics.by_provider.iter_mut() {
            let duration = provider_durations.get(provider).copied().unwrap_or(0);
            slice.average_duration_ms = duration as f64 / slice.total as f64;
        }

        let total = metrics.total_requests as f64;
        metrics.success_rate = metrics.successful_requests as f64 / total;
        metrics.average_duration_ms = total_duration as f64 / total;
        metrics
    }

    /// Newest `limit` entries, newest first.
    pub fn recent_logs(&self, limit: usize) -> Vec<AccessLogEntry> {
        self.lock().iter().rev().take(limit).cloned().collect()
    }

    /// Newest `limit` failed entries, newest first.
    pub fn failed_logs(&self, limit: usize) -> Vec<AccessLogEntry> {
        self.lock()
            .iter()
            .rev()
            .filter(|entry| !entry.success)
            .take(limit)
            .cloned()
            .collect()
    }

    /// Newest `limit` entries that took at least `threshold_ms`, newest first.
    pub fn slow_logs(&self, threshold_ms: u64, limit: usize) -> Vec<AccessLogEntry> {
        self.lock()
            .iter()
            .rev()
            .filter(|entry| entry.duration_ms >= threshold_ms)
            .take(limit)
            .cloned()
            .collect()
    }

    /// Drop every retained entry, returning how many there were.
    pub fn clear(&self) -> usize {
        let mut entries = self.lock();
        let count = entries.len();
        entries.clear();
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(key: &str, provider: Option<StorageProvider>, duration_ms: u64, error: Option<ErrorCode>) -> AccessLogEntry {
        AccessLogEntry {
            request_id: Uuid::now_v7(),
            timestamp: Utc::now(),
            key: key.to_string(),
            provider,
            success: error.is_none(),
            duration_ms,
            status_code: error.map(|c| c.status_code().as_u16()).unwrap_or(200),
            error_code: error,
            error_message: error.map(|c| c.default_message().to_string()),
            client_ip: None,
            user_agent: None,
            cache_status: error.is_none().then_some(CacheStatus::Miss),
            slow: false,
        }
    }

    fn logger() -> AccessLogger {
        AccessLogger::new(3, Duration::from_millis(100))
    }

    #[test]
    fn test_ring_buffer_drops_oldest() {
        let log = logger();
        for i in 0..5 {
            log.record(entry(&format!("k{}", i), Some(StorageProvider::Minio), 1, None));
        }
        assert_eq!(log.len(), 3);
        let keys: Vec<_> = log.recent_logs(10).into_iter().map(|e| e.key).collect();
        assert_eq!(keys, vec!["k4", "k3", "k2"]);
    }

    #[test]
    fn test_slow_flag_set_at_record_time() {
        let log = logger();
        log.record(entry("fast", Some(StorageProvider::Aws), 99, None));
        log.record(entry("slow", Some(StorageProvider::Aws), 100, None));

        let recent = log.recent_logs(2);
        assert!(recent[0].slow);
        assert!(!recent[1].slow);
    }

    #[test]
    fn test_metrics_breakdown() {
        let log = AccessLogger::new(10, Duration::from_millis(100));
        log.record(entry("a", Some(StorageProvider::Minio), 10, None));
        log.record(entry("b", Some(StorageProvider::Minio), 30, Some(ErrorCode::NotFound)));
        log.record(entry("c", Some(StorageProvider::Aliyun), 200, None));
        log.record(entry("../x", None, 0, Some(ErrorCode::InvalidKey)));

        let metrics = log.metrics();
        assert_eq!(metrics.total_requests, 4);
        assert_eq!(metrics.successful_requests, 2);
        assert_eq!(metrics.failed_requests, 2);
        assert_eq!(metrics.slow_requests, 1);
        assert!((metrics.success_rate - 0.5).abs() < f64::EPSILON);
        assert!((metrics.average_duration_ms - 60.0).abs() < f64::EPSILON);

        let minio = &metrics.by_provider["minio"];
        assert_eq!((minio.total, minio.success, minio.failure), (2, 1, 1));
        assert!((minio.average_duration_ms - 20.0).abs() < f64::EPSILON);
        assert_eq!(metrics.by_provider[UNRESOLVED_PROVIDER].failure, 1);

        assert_eq!(metrics.by_error["NOT_FOUND"], 1);
        assert_eq!(metrics.by_error["INVALID_KEY"], 1);
    }

    #[test]
    fn test_empty_metrics() {
        let metrics = logger().metrics();
        assert_eq!(metrics.total_requests, 0);
        assert_eq!(metrics.success_rate, 0.0);
    }

    #[test]
    fn test_filtered_views() {
        let log = AccessLogger::new(10, Duration::from_secs(5));
        log.record(entry("ok", Some(StorageProvider::Tencent), 5, None));
        log.record(entry("gone", Some(StorageProvider::Tencent), 50, Some(ErrorCode::NotFound)));
        log.record(entry("late", Some(StorageProvider::Tencent), 900, Some(ErrorCode::Timeout)));

        let failed: Vec<_> = log.failed_logs(10).into_iter().map(|e| e.key).collect();
        assert_eq!(failed, vec!["late", "gone"]);
        assert_eq!(log.failed_logs(1).len(), 1);

        let slow: Vec<_> = log.slow_logs(50, 10).into_iter().map(|e| e.key).collect();
        assert_eq!(slow, vec!["late", "gone"]);
    }

    #[test]
    fn test_clear() {
        let log = logger();
        log.record(entry("a", None, 1, None));
        assert_eq!(log.clear(), 1);
        assert!(log.is_empty());
    }

    #[test]
    fn test_zero_capacity_retains_nothing() {
        let log = AccessLogger::new(0, Duration::from_millis(100));
        log.record(entry("a", None, 1, None));
        assert!(log.is_empty());
    }

    #[test]
    fn test_entry_serializes_camel_case() -> Result<(), serde_json::Error> {
        let json = serde_json::to_value(entry("a.png", Some(StorageProvider::Aws), 3, None))?;
        assert_eq!(json["provider"], "aws");
        assert_eq!(json["cacheStatus"], "MISS");
        assert_eq!(json["statusCode"], 200);
        assert!(json["errorCode"].is_null());
        Ok(())
    }
}
