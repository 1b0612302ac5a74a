//! In-memory fetch-through cache for objects served from remote storage.
//!
//! The crate has no HTTP knowledge. It provides:
//!
//! - [`CacheStore`]: a bounded key/value store with TTL expiry and
//!   frequency-weighted LRU eviction under both an entry and a byte limit.
//! - [`InFlight`]: per-key request collapsing so N concurrent misses cost
//!   one backend fetch.
//! - [`Fetcher`]: the seam to the storage backend.
//! - [`RetrievalService`]: the three combined into `get_or_fetch`.
//!
//! Every component is an ordinary value. Construct one per server (or per
//! test) and share it through an `Arc`.

pub mod clock;
pub mod fetch;
pub mod inflight;
pub mod key;
pub mod object;
pub mod retrieval;
pub mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use fetch::{FetchError, FetchedObject, Fetcher};
pub use inflight::{FetchAborted, InFlight, Settled};
pub use key::{CacheKey, StorageProvider, UnknownProvider};
pub use object::{CachedObject, PreservedHeaders};
pub use retrieval::{CacheStatus, RetrievalService, Retrieved};
pub use store::{CacheConfig, CacheStats, CacheStore};
