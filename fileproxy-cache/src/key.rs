//! Provider-scoped cache keys.
//!
//! A `CacheKey` can only be built from a `StorageProvider` and an object key
//! together, so two providers serving the same object key never share an
//! entry.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Object-storage backends the proxy can serve from.
///
/// This is a closed set: requests naming anything else are rejected before
/// a cache key is ever built. Ordering follows declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageProvider {
    Minio,
    Aliyun,
    Tencent,
    Aws,
}

impl StorageProvider {
    /// Every supported provider, in declaration order.
    pub const ALL: [StorageProvider; 4] = [
        StorageProvider::Minio,
        StorageProvider::Aliyun,
        StorageProvider::Tencent,
        StorageProvider::Aws,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StorageProvider::Minio => "minio",
            StorageProvider::Aliyun => "aliyun",
            StorageProvider::Tencent => "tencent",
            StorageProvider::Aws => "aws",
        }
    }
}

impl fmt::Display for StorageProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a provider name is not in the supported set.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unsupported storage provider: {0}")]
pub struct UnknownProvider(pub String);

impl FromStr for StorageProvider {
    type Err = UnknownProvider;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        StorageProvider::ALL
            .into_iter()
            .find(|p| p.as_str() == normalized)
            .ok_or_else(|| UnknownProvider(s.to_string()))
    }
}

/// A cache key scoped to a storage provider.
///
/// Ordering is provider first, then object key. The store relies on this
/// ordering to break eviction ties deterministically.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey {
    inner: CacheKeyInner,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
struct CacheKeyInner {
    provider: StorageProvider,
    object_key: String,
}

impl CacheKey {
    pub fn new(provider: StorageProvider, object_key: impl Into<String>) -> Self {
        Self {
            inner: CacheKeyInner {
                provider,
                object_key: object_key.into(),
            },
        }
    }

    pub fn provider(&self) -> StorageProvider {
        self.inner.provider
    }

    pub fn object_key(&self) -> &str {
        &self.inner.object_key
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.inner.provider, self.inner.object_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_parse_is_case_insensitive() {
        assert_eq!("MinIO".parse::<StorageProvider>(), Ok(StorageProvider::Minio));
        assert_eq!(" aliyun ".parse::<StorageProvider>(), Ok(StorageProvider::Aliyun));
        assert_eq!("aws".parse::<StorageProvider>(), Ok(StorageProvider::Aws));
    }

    #[test]
    fn test_provider_parse_rejects_unknown() {
        let err = "dropbox".parse::<StorageProvider>().unwrap_err();
        assert_eq!(err, UnknownProvider("dropbox".to_string()));
    }

    #[test]
    fn test_same_object_key_different_provider_is_distinct() {
        let minio = CacheKey::new(StorageProvider::Minio, "a.png");
        let aliyun = CacheKey::new(StorageProvider::Aliyun, "a.png");
        assert_ne!(minio, aliyun);
        assert_eq!(minio.object_key(), aliyun.object_key());
    }

    #[test]
    fn test_ordering_is_provider_then_key() {
        // Providers order by declaration: minio, aliyun, tencent, aws.
        let a = CacheKey::new(StorageProvider::Minio, "z");
        let b = CacheKey::new(StorageProvider::Aliyun, "a");
        let c = CacheKey::new(StorageProvider::Minio, "a");
        assert!(a < b);
        assert!(c < a);
        assert!(StorageProvider::Tencent < StorageProvider::Aws);
    }

    #[test]
    fn test_display() {
        let key = CacheKey::new(StorageProvider::Tencent, "docs/report.pdf");
        assert_eq!(key.to_string(), "tencent:docs/report.pdf");
    }
}
