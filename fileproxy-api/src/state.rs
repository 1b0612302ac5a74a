//! Shared application state for Axum routers.

use std::sync::Arc;

use fileproxy_cache::{CacheStore, Fetcher, RetrievalService};

use crate::access_log::AccessLogger;
use crate::config::ProxyConfig;
use crate::resolver::UrlResolver;

/// Application-wide state shared across all routes.
///
/// Each server owns its own cache and access log. Nothing here is a
/// process-wide singleton, so tests can build as many independent states as
/// they need.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ProxyConfig>,
    /// Cache store, in-flight coordinator and backend fetcher.
    pub retrieval: Arc<RetrievalService>,
    /// Turns file keys into signed backend URLs.
    pub resolver: Arc<dyn UrlResolver>,
    pub access_log: Arc<AccessLogger>,
    pub start_time: std::time::Instant,
}

impl AppState {
    /// Assemble state from configuration and the two backend collaborators.
    pub fn new(config: ProxyConfig, fetcher: Arc<dyn Fetcher>, resolver: Arc<dyn UrlResolver>) -> Self {
        let store = Arc::new(CacheStore::new(config.cache_config()));
        Self::with_store(config, store, fetcher, resolver)
    }

    /// Like [`AppState::new`] but around an existing store, e.g. one driven
    /// by a manual clock.
    pub fn with_store(
        config: ProxyConfig,
        store: Arc<CacheStore>,
        fetcher: Arc<dyn Fetcher>,
        resolver: Arc<dyn UrlResolver>,
    ) -> Self {
        let access_log = Arc::new(AccessLogger::new(
            config.access_log_capacity,
            config.slow_request_threshold,
        ));

        Self {
            retrieval: Arc::new(RetrievalService::new(store, fetcher)),
            resolver,
            access_log,
            config: Arc::new(config),
            start_time: std::time::Instant::now(),
        }
    }
}
