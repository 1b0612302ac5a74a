//! In-process stand-ins for the storage backend and URL signer.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::Request;
use axum::Router;
use bytes::Bytes;
use fileproxy_api::{create_router, AppState, ProxyConfig, ResolveError, ResolvedUrl, UrlResolver};
use fileproxy_cache::{FetchError, FetchedObject, Fetcher, PreservedHeaders, StorageProvider};

/// Fetcher that answers from memory and counts calls.
#[derive(Default)]
pub struct MockFetcher {
    calls: AtomicUsize,
    delay: Mutex<Duration>,
    failure: Mutex<Option<FetchError>>,
    body_size: Mutex<Option<usize>>,
}

impl MockFetcher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }

    pub fn fail_with(&self, err: FetchError) {
        *self.failure.lock().unwrap() = Some(err);
    }

    pub fn succeed(&self) {
        *self.failure.lock().unwrap() = None;
    }

    pub fn set_body_size(&self, size: usize) {
        *self.body_size.lock().unwrap() = Some(size);
    }
}

#[async_trait]
impl Fetcher for MockFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedObject, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if let Some(err) = self.failure.lock().unwrap().clone() {
            return Err(err);
        }

        let body = match *self.body_size.lock().unwrap() {
            Some(size) => Bytes::from(vec![b'x'; size]),
            None => Bytes::from(format!("body of {}", url)),
        };
        Ok(FetchedObject {
            body,
            content_type: "image/png".to_string(),
            headers: PreservedHeaders {
                last_modified: Some("Wed, 21 Oct 2015 07:28:00 GMT".to_string()),
                etag: Some("\"abc123\"".to_string()),
                content_disposition: None,
            },
            cacheable: true,
        })
    }
}

/// Resolver that builds `mock://<provider>/<key>` URLs.
pub struct MockResolver {
    calls: AtomicUsize,
    default_provider: StorageProvider,
    failure: Mutex<Option<ResolveError>>,
}

impl MockResolver {
    pub fn new(default_provider: StorageProvider) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            default_provider,
            failure: Mutex::new(None),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn fail_with(&self, err: ResolveError) {
        *self.failure.lock().unwrap() = Some(err);
    }
}

#[async_trait]
impl UrlResolver for MockResolver {
    async fn resolve_signed_url(
        &self,
        file_key: &str,
        provider: Option<StorageProvider>,
    ) -> Result<ResolvedUrl, ResolveError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.failure.lock().unwrap().clone() {
            return Err(err);
        }
        let provider = provider.unwrap_or(self.default_provider);
        Ok(ResolvedUrl {
            url: format!("mock://{}/{}", provider, file_key),
            provider,
        })
    }

    fn default_provider(&self) -> StorageProvider {
        self.default_provider
    }
}

/// A router over mocks, plus handles to inspect them.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub fetcher: Arc<MockFetcher>,
    pub resolver: Arc<MockResolver>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(ProxyConfig::default())
    }

    pub fn with_config(config: ProxyConfig) -> Self {
        let resolver = MockResolver::new(config.default_provider);
        Self::with_resolver(config, resolver)
    }

    /// Build over a resolver whose default provider may differ from the
    /// config's.
    pub fn with_resolver(config: ProxyConfig, resolver: Arc<MockResolver>) -> Self {
        let fetcher = MockFetcher::new();
        let state = AppState::new(config, fetcher.clone(), resolver.clone());
        Self {
            router: create_router(state.clone()),
            state,
            fetcher,
            resolver,
        }
    }
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub fn delete(uri: &str) -> Request<Body> {
    Request::builder()
        .method("DELETE")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

pub async fn body_bytes(response: axum::response::Response) -> Bytes {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
}

pub async fn body_json(response: axum::response::Response) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}
