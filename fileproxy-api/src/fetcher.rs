//! HTTP backend fetcher.
//!
//! Retrieves objects from signed storage URLs with reqwest. The client has a
//! bounded timeout and redirect count; only 2xx answers count as success.
//! Bodies are read chunk by chunk into memory. A body over the cacheable
//! size is still returned in full but flagged so it is not cached.

use std::time::Duration;

use async_trait::async_trait;
use bytes::BytesMut;
use fileproxy_cache::{FetchError, FetchedObject, Fetcher, PreservedHeaders};
use reqwest::header::{HeaderMap, CONTENT_DISPOSITION, CONTENT_TYPE, ETAG, LAST_MODIFIED};
use reqwest::StatusCode;

use crate::config::ProxyConfig;
use crate::constants::DEFAULT_CONTENT_TYPE;
use crate::error::{ApiError, ApiResult};
use crate::telemetry::METRICS;

/// `Fetcher` backed by a shared reqwest client.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    max_object_bytes: usize,
}

impl HttpFetcher {
    pub fn new(timeout: Duration, max_redirects: usize, max_object_bytes: usize) -> ApiResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(max_redirects))
            .build()
            .map_err(|e| ApiError::unknown(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            max_object_bytes,
        })
    }

    pub fn from_config(config: &ProxyConfig) -> ApiResult<Self> {
        Self::new(
            config.fetch_timeout,
            config.fetch_max_redirects,
            config.cache_max_object_bytes,
        )
    }
}

fn classify(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout
    } else if err.is_connect() || err.is_request() || err.is_body() || err.is_redirect() {
        FetchError::Connection(err.to_string())
    } else {
        FetchError::Unknown(err.to_string())
    }
}

fn header_string(headers: &HeaderMap, name: reqwest::header::HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedObject, FetchError> {
        let mut response = self.client.get(url).send().await.map_err(classify)?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(FetchError::NotFound);
        }
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
            });
        }

        let headers = response.headers();
        let content_type = header_string(headers, CONTENT_TYPE)
            .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string());
        let preserved = PreservedHeaders {
            last_modified: header_string(headers, LAST_MODIFIED),
            etag: header_string(headers, ETAG),
            content_disposition: header_string(headers, CONTENT_DISPOSITION),
        };

        let capacity = response
            .content_length()
            .map(|len| (len as usize).min(self.max_object_bytes))
            .unwrap_or(0);
        let mut body = BytesMut::with_capacity(capacity);
        while let Some(chunk) = response.chunk().await.map_err(classify)? {
            body.extend_from_slice(&chunk);
        }

        let cacheable = body.len() <= self.max_object_bytes;
        if !cacheable {
            tracing::info!(
                size = body.len(),
                max_object_bytes = self.max_object_bytes,
                "Fetched object exceeds cacheable size"
            );
        }
        if let Ok(metrics) = METRICS.as_ref() {
            metrics.record_backend_bytes(body.len());
        }

        Ok(FetchedObject {
            body: body.freeze(),
            content_type,
            headers: preserved,
            cacheable,
        })
    }
}
