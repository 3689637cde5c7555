//! FetchCoordinator - at most one transport operation per key.
//!
//! The first caller for a missing key becomes the leader and installs a
//! shared future in the in-flight map; later callers for the same key join
//! that future instead of issuing their own request. Whatever the leader
//! produces, success or failure, is stored in the cache before the key
//! leaves the in-flight map, so no caller can slip between the two and
//! start a second fetch.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use lightbox_model::CacheKey;
use log::{debug, warn};
use parking_lot::Mutex;

use crate::cache::{ByteSizedCache, CacheEntry};
use crate::error::{CacheError, FetchError};
use crate::resource::ResourceHandle;
use crate::transport::Transport;

type FetchOutcome = Result<ResourceHandle, FetchError>;
type SharedFetch = Shared<BoxFuture<'static, FetchOutcome>>;

/// Deduplicating front door to the cache.
#[derive(Clone)]
pub struct FetchCoordinator {
    inner: Arc<CoordinatorInner>,
}

struct CoordinatorInner {
    cache: Arc<ByteSizedCache>,
    transport: Arc<dyn Transport>,
    in_flight: Mutex<HashMap<CacheKey, SharedFetch>>,
    transport_calls: AtomicU64,
}

impl FetchCoordinator {
    pub fn new(cache: Arc<ByteSizedCache>, transport: Arc<dyn Transport>) -> Self {
        Self {
            inner: Arc::new(CoordinatorInner {
                cache,
                transport,
                in_flight: Mutex::new(HashMap::new()),
                transport_calls: AtomicU64::new(0),
            }),
        }
    }

    pub fn cache(&self) -> &Arc<ByteSizedCache> {
        &self.inner.cache
    }

    /// Cached handle for `key`, fetching it first if nothing is stored.
    ///
    /// A stored failure is replayed as [`CacheError::CachedFailure`]
    /// without touching the network. Concurrent calls for the same key share
    /// one transport operation and all observe its outcome.
    pub async fn fetch_or_get(
        &self,
        key: &CacheKey,
    ) -> Result<ResourceHandle, CacheError> {
        let pending = {
            let mut in_flight = self.inner.in_flight.lock();
            if let Some(stored) = self.inner.cache.lookup(key) {
                return stored.map_err(CacheError::CachedFailure);
            }
            match in_flight.get(key) {
                Some(pending) => {
                    debug!("fetch join: key={}", key);
                    pending.clone()
                }
                None => {
                    debug!("fetch lead: key={}", key);
                    let leader =
                        Self::run(Arc::clone(&self.inner), key.clone())
                            .boxed()
                            .shared();
                    in_flight.insert(key.clone(), leader.clone());
                    leader
                }
            }
        };

        pending.await.map_err(CacheError::FetchFailed)
    }

    pub fn is_in_flight(&self, key: &CacheKey) -> bool {
        self.inner.in_flight.lock().contains_key(key)
    }

    pub fn in_flight_len(&self) -> usize {
        self.inner.in_flight.lock().len()
    }

    /// Transport requests issued since construction.
    pub fn transport_calls(&self) -> u64 {
        self.inner.transport_calls.load(Ordering::Relaxed)
    }

    async fn run(inner: Arc<CoordinatorInner>, key: CacheKey) -> FetchOutcome {
        // A panicking transport is recorded like any other transport failure
        // so the key still leaves the in-flight map.
        let entry = match AssertUnwindSafe(inner.fetch_entry(&key))
            .catch_unwind()
            .await
        {
            Ok(entry) => entry,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                warn!("fetch panicked: key={}, panic={}", key, message);
                CacheEntry::failed(FetchError::Transport {
                    message: format!("transport panicked: {message}"),
                })
            }
        };
        let outcome = entry.outcome();
        {
            let mut in_flight = inner.in_flight.lock();
            inner.cache.store(key.clone(), entry);
            in_flight.remove(&key);
        }
        if let Err(err) = &outcome {
            debug!("fetch failed: key={}, status={}, err={}", key, err.status_code(), err);
        }
        outcome
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

impl CoordinatorInner {
    /// Turn one transport round trip into a cache entry.
    async fn fetch_entry(&self, key: &CacheKey) -> CacheEntry {
        self.transport_calls.fetch_add(1, Ordering::Relaxed);

        let response = match self.transport.request(key).await {
            Ok(response) => response,
            Err(err) => {
                return CacheEntry::failed(FetchError::Transport {
                    message: err.message,
                });
            }
        };

        let status = response.status();
        if !(200..300).contains(&status) {
            return CacheEntry::failed(FetchError::Http { status });
        }

        let body = match response.body().await {
            Ok(body) => body,
            Err(err) => {
                return CacheEntry::failed(FetchError::Decode {
                    status,
                    message: err.message,
                });
            }
        };

        match self.cache.surface().materialize(key, body) {
            Ok(handle) => CacheEntry::loaded(handle, status),
            Err(message) => {
                CacheEntry::failed(FetchError::Decode { status, message })
            }
        }
    }
}

impl fmt::Debug for FetchCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchCoordinator")
            .field("cache", &self.inner.cache)
            .field("transport", &self.inner.transport)
            .field("in_flight", &self.in_flight_len())
            .field("transport_calls", &self.transport_calls())
            .finish()
    }
}
