//! In-flight request collapsing.
//!
//! Concurrent callers asking for the same key share a single fetch. The
//! first caller registers a shared handle and starts the fetch as a detached
//! task; later callers clone the handle and await the same result.
//!
//! The fetch task removes its own registration before publishing the
//! result, so no caller can ever join a fetch that has already settled.
//! Because the work runs in its own task, dropping every waiter (clients
//! disconnecting) does not cancel it.

use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures_util::future::{BoxFuture, FutureExt, Shared};
use tokio::sync::oneshot;

/// The fetch task ended without producing a result (it panicked or was
/// aborted by runtime shutdown).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("In-flight fetch ended without a result")]
pub struct FetchAborted;

type SharedFetch<T, E> = Shared<BoxFuture<'static, Result<T, E>>>;

/// Result of `InFlight::fetch_or_join`.
#[derive(Debug, Clone)]
pub struct Settled<T, E> {
    pub result: Result<T, E>,
    /// `true` when this caller joined a fetch started by someone else.
    pub joined: bool,
}

/// Registry of fetches currently in progress, keyed by `K`.
pub struct InFlight<K, T, E> {
    pending: Arc<DashMap<K, SharedFetch<T, E>>>,
}

/// Removes a key's registration when dropped, including on panic unwind.
struct Registration<K: Eq + Hash, T, E> {
    pending: Arc<DashMap<K, SharedFetch<T, E>>>,
    key: Option<K>,
}

impl<K: Eq + Hash, T, E> Drop for Registration<K, T, E> {
    fn drop(&mut self) {
        if let Some(key) = self.key.take() {
            self.pending.remove(&key);
        }
    }
}

impl<K, T, E> InFlight<K, T, E>
where
    K: Eq + Hash + Clone + std::fmt::Display + Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
    E: Clone + From<FetchAborted> + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            pending: Arc::new(DashMap::new()),
        }
    }

    /// Number of fetches currently in progress.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn contains(&self, key: &K) -> bool {
        self.pending.contains_key(key)
    }

    /// Join the fetch in progress for `key`, or start one with `fetch`.
    ///
    /// `fetch` is only invoked when no fetch is registered for `key`. Every
    /// caller, leader or follower, observes the same result.
    ///
    /// Must be called from within a tokio runtime.
    pub async fn fetch_or_join<F, Fut>(&self, key: K, fetch: F) -> Settled<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let (shared, sender) = match self.pending.entry(key.clone()) {
            Entry::Occupied(entry) => (entry.get().clone(), None),
            Entry::Vacant(entry) => {
                let (tx, rx) = oneshot::channel::<Result<T, E>>();
                let shared = async move {
                    match rx.await {
                        Ok(result) => result,
                        Err(_) => Err(E::from(FetchAborted)),
                    }
                }
                .boxed()
                .shared();
                entry.insert(shared.clone());
                (shared, Some(tx))
            }
        };

        let joined = sender.is_none();
        if let Some(tx) = sender {
            tracing::debug!(key = %key, "Starting backend fetch");
            // Guard first: if `fetch` itself panics, unwinding drops it and
            // the key is free again.
            let registration = Registration {
                pending: Arc::clone(&self.pending),
                key: Some(key),
            };
            let work = fetch();
            tokio::spawn(async move {
                let result = work.await;
                drop(registration);
                let _ = tx.send(result);
            });
        } else {
            tracing::debug!(key = %key, "Joining in-flight fetch");
        }

        Settled {
            result: shared.await,
            joined,
        }
    }
}

impl<K, T, E> Default for InFlight<K, T, E>
where
    K: Eq + Hash + Clone + std::fmt::Display + Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
    E: Clone + From<FetchAborted> + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}
