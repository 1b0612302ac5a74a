//! Signed URL resolution.
//!
//! The proxy does not sign URLs itself. A `UrlResolver` turns a file key
//! (and optionally a provider) into a temporary backend URL. The bundled
//! `EndpointResolver` maps each provider to a configured base URL, which is
//! enough for buckets that sit behind a private network or a signing
//! gateway.

use std::collections::HashMap;

use async_trait::async_trait;
use fileproxy_cache::StorageProvider;

/// A backend URL ready to fetch, and the provider that will serve it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedUrl {
    pub url: String,
    pub provider: StorageProvider,
}

/// Failure resolving a file key to a backend URL.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    /// The provider is not configured (missing endpoint, credentials, ...).
    #[error("Storage provider misconfigured: {0}")]
    Configuration(String),

    /// The signing step itself failed.
    #[error("Failed to sign URL: {0}")]
    Signing(String),

    /// The signing service could not be reached.
    #[error("Signing service unavailable: {0}")]
    Unavailable(String),
}

/// Resolves file keys to temporary backend URLs.
#[async_trait]
pub trait UrlResolver: Send + Sync {
    /// Resolve `file_key`. When `provider` is `None` the resolver picks its
    /// default provider.
    async fn resolve_signed_url(
        &self,
        file_key: &str,
        provider: Option<StorageProvider>,
    ) -> Result<ResolvedUrl, ResolveError>;

    /// Provider used when a request names none.
    fn default_provider(&self) -> StorageProvider;
}

/// Resolver that joins a per-provider base URL with the file key.
#[derive(Debug, Clone)]
pub struct EndpointResolver {
    endpoints: HashMap<StorageProvider, String>,
    default_provider: StorageProvider,
}

impl EndpointResolver {
    pub fn new(endpoints: HashMap<StorageProvider, String>, default_provider: StorageProvider) -> Self {
        Self {
            endpoints,
            default_provider,
        }
    }
}

/// Percent-encode each path segment, keeping the separators.
fn encode_key(file_key: &str) -> String {
    file_key
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

#[async_trait]
impl UrlResolver for EndpointResolver {
    async fn resolve_signed_url(
        &self,
        file_key: &str,
        provider: Option<StorageProvider>,
    ) -> Result<ResolvedUrl, ResolveError> {
        let provider = provider.unwrap_or(self.default_provider);
        let base = self.endpoints.get(&provider).ok_or_else(|| {
            ResolveError::Configuration(format!("No endpoint configured for provider '{}'", provider))
        })?;

        Ok(ResolvedUrl {
            url: format!("{}/{}", base.trim_end_matches('/'), encode_key(file_key)),
            provider,
        })
    }

    fn default_provider(&self) -> StorageProvider {
        self.default_provider
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> EndpointResolver {
        let mut endpoints = HashMap::new();
        endpoints.insert(StorageProvider::Minio, "https://minio.local/bucket/".to_string());
        endpoints.insert(StorageProvider::Aws, "https://s3.example.com/b".to_string());
        EndpointResolver::new(endpoints, StorageProvider::Minio)
    }

    #[tokio::test]
    async fn test_default_provider_is_used() {
        let resolved = resolver().resolve_signed_url("a/b.png", None).await.unwrap();
        assert_eq!(resolved.provider, StorageProvider::Minio);
        assert_eq!(resolved.url, "https://minio.local/bucket/a/b.png");
    }

    #[test]
    fn test_reports_default_provider() {
        let resolver = EndpointResolver::new(HashMap::new(), StorageProvider::Tencent);
        assert_eq!(resolver.default_provider(), StorageProvider::Tencent);
    }

    #[tokio::test]
    async fn test_explicit_provider() {
        let resolved = resolver()
            .resolve_signed_url("x.txt", Some(StorageProvider::Aws))
            .await
            .unwrap();
        assert_eq!(resolved.provider, StorageProvider::Aws);
        assert_eq!(resolved.url, "https://s3.example.com/b/x.txt");
    }

    #[tokio::test]
    async fn test_segments_are_percent_encoded() {
        let resolved = resolver()
            .resolve_signed_url("docs/my report?.pdf", None)
            .await
            .unwrap();
        assert_eq!(resolved.url, "https://minio.local/bucket/docs/my%20report%3F.pdf");
    }

    #[tokio::test]
    async fn test_unconfigured_provider_is_configuration_error() {
        let err = resolver()
            .resolve_signed_url("x", Some(StorageProvider::Tencent))
            .await
            .unwrap_err();
        assert!(matches!(err, ResolveError::Configuration(_)));
    }
}
