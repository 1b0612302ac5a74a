//! Cache-fronted retrieval.
//!
//! `RetrievalService` ties the store, the in-flight coordinator and a
//! `Fetcher` into one `get_or_fetch` call:
//!
//! 1. Look in the store. A hit returns immediately.
//! 2. On a miss, hand off to the coordinator. Only the caller that starts the
//!    fetch resolves the signed URL and talks to the backend; the result is
//!    admitted to the store unless it was flagged too large.
//! 3. Every waiter gets the same object or the same error.
//!
//! Two callers can both miss the store before either reaches the
//! coordinator. That is fine: the coordinator, not the store, decides who
//! fetches.

use std::sync::Arc;

use serde::Serialize;

use crate::fetch::{FetchError, Fetcher};
use crate::inflight::InFlight;
use crate::key::CacheKey;
use crate::object::CachedObject;
use crate::store::{CacheStats, CacheStore};

/// Where a retrieved object came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CacheStatus {
    /// Served from the store.
    Hit,
    /// This caller fetched it from the backend.
    Miss,
    /// Another caller's in-flight fetch produced it.
    Joined,
}

impl CacheStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheStatus::Hit => "HIT",
            CacheStatus::Miss => "MISS",
            CacheStatus::Joined => "JOINED",
        }
    }
}

/// An object together with how it was obtained.
#[derive(Debug, Clone)]
pub struct Retrieved {
    pub object: CachedObject,
    pub status: CacheStatus,
}

/// Fetch-through cache over a storage backend.
pub struct RetrievalService {
    store: Arc<CacheStore>,
    inflight: InFlight<CacheKey, CachedObject, FetchError>,
    fetcher: Arc<dyn Fetcher>,
}

impl RetrievalService {
    pub fn new(store: Arc<CacheStore>, fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            store,
            inflight: InFlight::new(),
            fetcher,
        }
    }

    pub fn store(&self) -> &CacheStore {
        &self.store
    }

    /// Return the object for `key`, fetching it on a miss.
    ///
    /// `signed_url` is only called when this caller ends up starting the
    /// backend fetch.
    pub async fn get_or_fetch<S>(&self, key: &CacheKey, signed_url: S) -> Result<Retrieved, FetchError>
    where
        S: FnOnce() -> String + Send,
    {
        if let Some(object) = self.store.get(key) {
            return Ok(Retrieved {
                object,
                status: CacheStatus::Hit,
            });
        }

        let store = Arc::clone(&self.store);
        let fetcher = Arc::clone(&self.fetcher);
        let cache_key = key.clone();

        let settled = self
            .inflight
            .fetch_or_join(key.clone(), move || {
                let url = signed_url();
                async move {
                    let fetched = fetcher.fetch(&url).await?;
                    let object = CachedObject::new(
                        fetched.body,
                        fetched.content_type,
                        fetched.headers,
                        store.now(),
                    );

                    if fetched.cacheable && object.size() <= store.config().max_object_bytes {
                        store.put(cache_key, object.clone());
                    } else {
                        tracing::debug!(
                            key = %cache_key,
                            size = object.size(),
                            "Object too large to cache, serving uncached"
                        );
                    }
                    Ok(object)
                }
            })
            .await;

        let status = if settled.joined {
            CacheStatus::Joined
        } else {
            CacheStatus::Miss
        };
        settled.result.map(|object| Retrieved { object, status })
    }

    pub fn invalidate(&self, key: &CacheKey) -> bool {
        self.store.invalidate(key)
    }

    pub fn clear(&self) -> usize {
        self.store.clear()
    }

    pub fn purge_expired(&self) -> usize {
        self.store.purge_expired()
    }

    /// Store statistics plus the number of fetches currently in flight.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            in_flight_count: self.inflight.len(),
            ..self.store.stats()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{Clock, ManualClock};
    use crate::key::StorageProvider;
    use crate::object::PreservedHeaders;
    use crate::store::CacheConfig;
    use async_trait::async_trait;
    use bytes::Bytes;
    use futures_util::future::join_all;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct MockFetcher {
        calls: AtomicUsize,
        response: Result<FetchedBody, FetchError>,
        delay: Duration,
    }

    #[derive(Clone)]
    struct FetchedBody {
        bytes: &'static [u8],
        cacheable: bool,
    }

    impl MockFetcher {
        fn ok(bytes: &'static [u8]) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                response: Ok(FetchedBody {
                    bytes,
                    cacheable: true,
                }),
                delay: Duration::from_millis(20),
            }
        }

        fn oversized(bytes: &'static [u8]) -> Self {
            Self {
                response: Ok(FetchedBody {
                    bytes,
                    cacheable: false,
                }),
                ..Self::ok(bytes)
            }
        }

        fn failing(err: FetchError) -> Self {
            Self {
                response: Err(err),
                ..Self::ok(b"")
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl crate::fetch::Fetcher for MockFetcher {
        async fn fetch(&self, _url: &str) -> Result<crate::fetch::FetchedObject, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            let body = self.response.clone()?;
            Ok(crate::fetch::FetchedObject {
                body: Bytes::from_static(body.bytes),
                content_type: "image/png".to_string(),
                headers: PreservedHeaders {
                    etag: Some("\"abc\"".to_string()),
                    ..Default::default()
                },
                cacheable: body.cacheable,
            })
        }
    }

    fn service(fetcher: Arc<MockFetcher>, config: CacheConfig) -> (RetrievalService, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let store = Arc::new(CacheStore::with_clock(config, clock.clone()));
        (RetrievalService::new(store, fetcher), clock)
    }

    fn key(name: &str) -> CacheKey {
        CacheKey::new(StorageProvider::Minio, name)
    }

    fn url() -> String {
        "https://storage.example.com/signed".to_string()
    }

    #[tokio::test]
    async fn test_miss_then_hit() {
        let fetcher = Arc::new(MockFetcher::ok(b"png-bytes"));
        let (service, _) = service(fetcher.clone(), CacheConfig::default());

        let first = service.get_or_fetch(&key("a.png"), url).await.unwrap();
        assert_eq!(first.status, CacheStatus::Miss);
        assert_eq!(first.object.body().as_ref(), b"png-bytes");
        assert_eq!(first.object.headers().etag.as_deref(), Some("\"abc\""));

        let second = service.get_or_fetch(&key("a.png"), url).await.unwrap();
        assert_eq!(second.status, CacheStatus::Hit);
        assert_eq!(second.object.access_count(), 1);
        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test]
    async fn test_hit_path_never_calls_fetcher_or_supplier() {
        let fetcher = Arc::new(MockFetcher::ok(b"x"));
        let (service, clock) = service(fetcher.clone(), CacheConfig::default());
        let object = CachedObject::new(
            Bytes::from_static(b"preloaded"),
            "text/plain",
            PreservedHeaders::default(),
            clock.now(),
        );
        service.store().put(key("p"), object);

        let hit = service
            .get_or_fetch(&key("p"), || panic!("supplier must not run on a hit"))
            .await
            .unwrap();
        assert_eq!(hit.status, CacheStatus::Hit);
        assert_eq!(hit.object.body().as_ref(), b"preloaded");
        assert_eq!(fetcher.calls(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_misses_fetch_once() {
        let fetcher = Arc::new(MockFetcher::ok(b"shared"));
        let (service, _) = service(fetcher.clone(), CacheConfig::default());
        let supplier_calls = AtomicUsize::new(0);

        let k = key("hot.png");
        let requests = (0..10).map(|_| {
            service.get_or_fetch(&k, || {
                supplier_calls.fetch_add(1, Ordering::SeqCst);
                url()
            })
        });
        let results = join_all(requests).await;

        assert_eq!(fetcher.calls(), 1);
        assert_eq!(supplier_calls.load(Ordering::SeqCst), 1);
        for result in &results {
            let retrieved = result.as_ref().unwrap();
            assert_eq!(retrieved.object.body().as_ref(), b"shared");
        }
        let leaders = results
            .iter()
            .filter(|r| r.as_ref().map(|r| r.status) == Ok(CacheStatus::Miss))
            .count();
        assert_eq!(leaders, 1);
        assert_eq!(service.stats().in_flight_count, 0);
    }

    #[tokio::test]
    async fn test_concurrent_failures_are_identical() {
        let fetcher = Arc::new(MockFetcher::failing(FetchError::Timeout));
        let (service, _) = service(fetcher.clone(), CacheConfig::default());

        let k = key("slow.bin");
        let results = join_all((0..5).map(|_| service.get_or_fetch(&k, url))).await;

        assert_eq!(fetcher.calls(), 1);
        assert!(results
            .iter()
            .all(|r| matches!(r, Err(FetchError::Timeout))));
    }

    #[tokio::test]
    async fn test_backend_404_leaves_store_untouched() {
        let fetcher = Arc::new(MockFetcher::failing(FetchError::NotFound));
        let (service, _) = service(fetcher.clone(), CacheConfig::default());

        let err = service.get_or_fetch(&key("missing"), url).await.unwrap_err();
        assert_eq!(err, FetchError::NotFound);
        assert!(!service.store().contains(&key("missing")));
        assert_eq!(service.stats().resident_count, 0);
    }

    #[tokio::test]
    async fn test_oversized_object_served_but_not_cached() {
        let fetcher = Arc::new(MockFetcher::oversized(b"huge-payload"));
        let (service, _) = service(fetcher.clone(), CacheConfig::default());

        let retrieved = service.get_or_fetch(&key("big"), url).await.unwrap();
        assert_eq!(retrieved.object.body().as_ref(), b"huge-payload");
        assert_eq!(service.stats().resident_count, 0);

        service.get_or_fetch(&key("big"), url).await.unwrap();
        assert_eq!(fetcher.calls(), 2);
    }

    #[tokio::test]
    async fn test_object_over_max_object_bytes_is_not_cached() {
        let fetcher = Arc::new(MockFetcher::ok(b"0123456789"));
        let config = CacheConfig::default().with_max_object_bytes(4);
        let (service, _) = service(fetcher.clone(), config);

        service.get_or_fetch(&key("a"), url).await.unwrap();
        assert_eq!(service.stats().resident_count, 0);
    }

    #[tokio::test]
    async fn test_invalidate_forces_refetch() {
        let fetcher = Arc::new(MockFetcher::ok(b"v1"));
        let (service, _) = service(fetcher.clone(), CacheConfig::default());

        service.get_or_fetch(&key("doc"), url).await.unwrap();
        assert!(service.invalidate(&key("doc")));
        assert!(service.store().get(&key("doc")).is_none());

        let again = service.get_or_fetch(&key("doc"), url).await.unwrap();
        assert_eq!(again.status, CacheStatus::Miss);
        assert_eq!(fetcher.calls(), 2);
    }

    #[tokio::test]
    async fn test_expired_entry_is_refetched() {
        let fetcher = Arc::new(MockFetcher::ok(b"data"));
        let config = CacheConfig::default().with_ttl(Duration::from_secs(60));
        let (service, clock) = service(fetcher.clone(), config);

        service.get_or_fetch(&key("a"), url).await.unwrap();
        clock.advance(Duration::from_secs(60));

        let again = service.get_or_fetch(&key("a"), url).await.unwrap();
        assert_eq!(again.status, CacheStatus::Miss);
        assert_eq!(fetcher.calls(), 2);
    }

    #[tokio::test]
    async fn test_providers_are_isolated() {
        let fetcher = Arc::new(MockFetcher::ok(b"img"));
        let (service, _) = service(fetcher.clone(), CacheConfig::default());

        service
            .get_or_fetch(&CacheKey::new(StorageProvider::Minio, "a.png"), url)
            .await
            .unwrap();
        let other = service
            .get_or_fetch(&CacheKey::new(StorageProvider::Aliyun, "a.png"), url)
            .await
            .unwrap();

        assert_eq!(other.status, CacheStatus::Miss);
        assert_eq!(fetcher.calls(), 2);
        assert_eq!(service.stats().resident_count, 2);
    }
}
