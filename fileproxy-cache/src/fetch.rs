//! Backend fetch abstraction.
//!
//! The cache only needs "give me the bytes behind this signed URL". The HTTP
//! implementation lives in the API crate; tests plug in their own.

use async_trait::async_trait;
use bytes::Bytes;

use crate::inflight::FetchAborted;
use crate::object::PreservedHeaders;

/// An object retrieved from the storage backend.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedObject {
    pub body: Bytes,
    pub content_type: String,
    pub headers: PreservedHeaders,
    /// `false` when the payload exceeded the maximum cacheable size. The
    /// bytes are still complete and must be served; they just must not be
    /// admitted to the store.
    pub cacheable: bool,
}

/// Failure retrieving an object from the backend.
///
/// Errors are `Clone` because one failure is handed to every caller that
/// joined the same in-flight fetch.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    /// The backend reported that the object does not exist.
    #[error("Object not found in storage backend")]
    NotFound,

    /// The backend answered with a non-2xx status other than 404.
    #[error("Storage backend returned status {status}")]
    Status { status: u16 },

    /// The backend did not answer within the fetch timeout.
    #[error("Storage backend fetch timed out")]
    Timeout,

    /// The backend could not be reached or the transfer broke off.
    #[error("Storage backend unreachable: {0}")]
    Connection(String),

    /// Anything else.
    #[error("Fetch failed: {0}")]
    Unknown(String),
}

impl From<FetchAborted> for FetchError {
    fn from(err: FetchAborted) -> Self {
        FetchError::Unknown(err.to_string())
    }
}

/// Retrieves objects from a storage backend by signed URL.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedObject, FetchError>;
}
