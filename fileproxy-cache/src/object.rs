//! Cached object payload and metadata.

use std::time::Instant;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Response headers carried over from the storage backend.
///
/// Only these three are ever replayed to clients, so they are named fields
/// rather than an open header map.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreservedHeaders {
    pub last_modified: Option<String>,
    pub etag: Option<String>,
    pub content_disposition: Option<String>,
}

/// A binary object held by the cache store.
///
/// The store hands out clones of this value; `body` is reference counted,
/// so a clone never copies the payload.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedObject {
    body: Bytes,
    content_type: String,
    headers: PreservedHeaders,
    created_at: Instant,
    last_accessed: Instant,
    access_count: u64,
}

impl CachedObject {
    pub fn new(
        body: Bytes,
        content_type: impl Into<String>,
        headers: PreservedHeaders,
        now: Instant,
    ) -> Self {
        Self {
            body,
            content_type: content_type.into(),
            headers,
            created_at: now,
            last_accessed: now,
            access_count: 0,
        }
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Payload length in bytes.
    pub fn size(&self) -> usize {
        self.body.len()
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn headers(&self) -> &PreservedHeaders {
        &self.headers
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    pub fn last_accessed(&self) -> Instant {
        self.last_accessed
    }

    pub fn access_count(&self) -> u64 {
        self.access_count
    }

    pub(crate) fn touch(&mut self, now: Instant) {
        self.last_accessed = now;
        self.access_count = self.access_count.saturating_add(1);
    }
}
