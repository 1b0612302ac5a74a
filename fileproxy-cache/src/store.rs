//! Bounded in-memory object store.
//!
//! The store enforces two capacity limits at once (entry count and total
//! bytes), expires entries lazily by TTL, and evicts under pressure using a
//! frequency-weighted recency score:
//!
//! ```text
//! score = access_count * frequency_weight_ms - millis_since_last_access
//! ```
//!
//! The lowest score goes first. A hot object that has been idle for a moment
//! outranks a cold one that was touched once just now. Ties fall back to
//! `CacheKey` ordering (provider in declaration order, then object key) so
//! the victim is deterministic for a given snapshot.
//!
//! All operations are synchronous and hold the internal lock only for the
//! duration of a map operation; nothing here ever awaits.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::clock::{Clock, SystemClock};
use crate::key::CacheKey;
use crate::object::CachedObject;

/// Configuration for the cache store.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of resident entries.
    pub max_entries: usize,
    /// Maximum sum of payload sizes across resident entries.
    pub max_bytes: usize,
    /// Largest single object the fetch path will offer to the store.
    pub max_object_bytes: usize,
    /// Entries older than this (measured from creation) are never served.
    pub ttl: Duration,
    /// How many milliseconds of idleness one extra access is worth when
    /// ranking eviction candidates.
    pub frequency_weight_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 100,
            max_bytes: 100 * 1024 * 1024,
            max_object_bytes: 10 * 1024 * 1024,
            ttl: Duration::from_secs(30 * 60),
            frequency_weight_ms: 1000,
        }
    }
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_entries(mut self, max: usize) -> Self {
        self.max_entries = max;
        self
    }

    pub fn with_max_bytes(mut self, max: usize) -> Self {
        self.max_bytes = max;
        self
    }

    pub fn with_max_object_bytes(mut self, max: usize) -> Self {
        self.max_object_bytes = max;
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_frequency_weight_ms(mut self, weight: u64) -> Self {
        self.frequency_weight_ms = weight;
        self
    }
}

/// Point-in-time cache statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Hits over total lookups, 0.0 when nothing has been looked up yet.
    pub hit_rate: f64,
    pub resident_count: usize,
    pub resident_bytes: usize,
    /// Filled in by `RetrievalService`; the store alone always reports 0.
    pub in_flight_count: usize,
    pub evictions: u64,
    pub expirations: u64,
}

#[derive(Debug, Default)]
struct StoreInner {
    entries: HashMap<CacheKey, CachedObject>,
    total_bytes: usize,
}

impl StoreInner {
    fn remove(&mut self, key: &CacheKey) -> Option<CachedObject> {
        let removed = self.entries.remove(key)?;
        self.total_bytes -= removed.size();
        Some(removed)
    }

    fn purge_expired(&mut self, now: Instant, ttl: Duration) -> usize {
        let expired: Vec<CacheKey> = self
            .entries
            .iter()
            .filter(|(_, object)| is_expired(object, now, ttl))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            self.remove(key);
        }
        expired.len()
    }

    fn eviction_candidate(&self, now: Instant, weight_ms: u64) -> Option<CacheKey> {
        self.entries
            .iter()
            .min_by(|(ka, a), (kb, b)| {
                eviction_score(a, now, weight_ms)
                    .cmp(&eviction_score(b, now, weight_ms))
                    .then_with(|| ka.cmp(kb))
            })
            .map(|(key, _)| key.clone())
    }
}

fn is_expired(object: &CachedObject, now: Instant, ttl: Duration) -> bool {
    now.saturating_duration_since(object.created_at()) >= ttl
}

/// Lower scores are evicted first.
fn eviction_score(object: &CachedObject, now: Instant, weight_ms: u64) -> i128 {
    let idle_ms = now.saturating_duration_since(object.last_accessed()).as_millis() as i128;
    object.access_count() as i128 * weight_ms as i128 - idle_ms
}

/// Thread-safe, capacity-bounded object store.
pub struct CacheStore {
    config: CacheConfig,
    clock: Arc<dyn Clock>,
    inner: Mutex<StoreInner>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    expirations: AtomicU64,
}

impl CacheStore {
    pub fn new(config: CacheConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: CacheConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            inner: Mutex::new(StoreInner::default()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            expirations: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// The store's time source. Objects admitted via `put` should be
    /// stamped with this clock.
    pub fn now(&self) -> Instant {
        self.clock.now()
    }

    // A panic while holding the lock cannot leave the map half-updated in a
    // way that breaks accounting, so poisoning is ignored.
    fn lock(&self) -> MutexGuard<'_, StoreInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Look up a live entry.
    ///
    /// An expired entry is removed and reported as a miss. On a hit the
    /// entry's last-access time and access count are updated and a snapshot
    /// clone is returned.
    pub fn get(&self, key: &CacheKey) -> Option<CachedObject> {
        let now = self.clock.now();
        let mut inner = self.lock();

        let expired = match inner.entries.get(key) {
            Some(object) => is_expired(object, now, self.config.ttl),
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                return None;
            }
        };

        if expired {
            inner.remove(key);
            self.expirations.fetch_add(1, Ordering::Relaxed);
            self.misses.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(key = %key, "Cache entry expired");
            return None;
        }

        let object = inner.entries.get_mut(key)?;
        object.touch(now);
        self.hits.fetch_add(1, Ordering::Relaxed);
        Some(object.clone())
    }

    /// Whether a live entry exists, without touching access statistics.
    pub fn contains(&self, key: &CacheKey) -> bool {
        let now = self.clock.now();
        self.lock()
            .entries
            .get(key)
            .is_some_and(|object| !is_expired(object, now, self.config.ttl))
    }

    /// Admit an object, evicting as needed.
    ///
    /// Returns `false` without touching the store when the object alone is
    /// larger than the byte budget. A resident entry under the same key is
    /// replaced.
    pub fn put(&self, key: CacheKey, object: CachedObject) -> bool {
        let size = object.size();
        if size > self.config.max_bytes || self.config.max_entries == 0 {
            tracing::debug!(key = %key, size, max_bytes = self.config.max_bytes, "Object exceeds cache budget, not caching");
            return false;
        }

        let now = self.clock.now();
        let mut inner = self.lock();

        let expired = inner.purge_expired(now, self.config.ttl);
        if expired > 0 {
            self.expirations.fetch_add(expired as u64, Ordering::Relaxed);
        }

        inner.remove(&key);

        while inner.entries.len() + 1 > self.config.max_entries
            || inner.total_bytes + size > self.config.max_bytes
        {
            let Some(victim) = inner.eviction_candidate(now, self.config.frequency_weight_ms) else {
                break;
            };
            inner.remove(&victim);
            self.evictions.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(key = %victim, "Evicted cache entry");
        }

        inner.total_bytes += size;
        inner.entries.insert(key, object);
        true
    }

    /// Remove an entry. Returns whether it was resident.
    pub fn invalidate(&self, key: &CacheKey) -> bool {
        self.lock().remove(key).is_some()
    }

    /// Remove every entry, returning how many were dropped.
    pub fn clear(&self) -> usize {
        let mut inner = self.lock();
        let count = inner.entries.len();
        inner.entries.clear();
        inner.total_bytes = 0;
        count
    }

    /// Drop all expired entries now instead of waiting for the next read.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let purged = self.lock().purge_expired(now, self.config.ttl);
        if purged > 0 {
            self.expirations.fetch_add(purged as u64, Ordering::Relaxed);
        }
        purged
    }

    pub fn stats(&self) -> CacheStats {
        let (resident_count, resident_bytes) = {
            let inner = self.lock();
            (inner.entries.len(), inner.total_bytes)
        };
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;

        CacheStats {
            hits,
            misses,
            hit_rate: if total == 0 {
                0.0
            } else {
                hits as f64 / total as f64
            },
            resident_count,
            resident_bytes,
            in_flight_count: 0,
            evictions: self.evictions.load(Ordering::Relaxed),
            expirations: self.expirations.load(Ordering::Relaxed),
        }
    }
}
