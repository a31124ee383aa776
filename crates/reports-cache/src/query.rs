//! Keyed query cache with single-flight request de-duplication.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use reports_core::{ReportsError, Result};
use tokio::sync::{Mutex, watch};
use tracing::{debug, instrument, trace, warn};

use crate::retry::RetryPolicy;

/// Where a cache entry is in its fetch lifecycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum FetchStatus {
    /// Never fetched, or invalidated before a request settled.
    #[default]
    Idle,
    /// A request is in flight.
    Loading,
    /// The last request succeeded.
    Success,
    /// The last request failed after its retries.
    Error,
}

/// State of one cached query.
///
/// `data` keeps the last successful value even after a later request fails,
/// so a read can show stale data next to an error.
#[derive(Clone, Debug, PartialEq)]
pub struct CacheEntry<V> {
    /// Fetch lifecycle status.
    pub status: FetchStatus,
    /// Last successfully fetched value.
    pub data: Option<V>,
    /// Error of the last request, cleared on success.
    pub error: Option<ReportsError>,
    /// When the last request settled.
    pub updated_at: Option<DateTime<Utc>>,
    /// True after an invalidation, until the next request settles.
    pub stale: bool,
    /// Generation of the request currently in flight.
    pub in_flight: Option<u64>,
}

impl<V> Default for CacheEntry<V> {
    fn default() -> Self {
        Self {
            status: FetchStatus::Idle,
            data: None,
            error: None,
            updated_at: None,
            stale: false,
            in_flight: None,
        }
    }
}

impl<V: Clone> CacheEntry<V> {
    /// Returns true while a request is in flight.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.status == FetchStatus::Loading
    }

    /// Converts the entry into the outcome of its last request, if any.
    #[must_use]
    pub fn result(&self) -> Option<Result<V>> {
        match self.status {
            FetchStatus::Success => self.data.clone().map(Ok),
            FetchStatus::Error => self.error.clone().map(Err),
            FetchStatus::Idle | FetchStatus::Loading => None,
        }
    }

    fn settle(&mut self, result: &Result<V>) {
        match result {
            Ok(value) => {
                self.status = FetchStatus::Success;
                self.data = Some(value.clone());
                self.error = None;
            }
            Err(err) => {
                self.status = FetchStatus::Error;
                self.error = Some(err.clone());
            }
        }
        self.updated_at = Some(Utc::now());
        self.stale = false;
        self.in_flight = None;
    }
}

/// Per-call options for [`QueryCache::fetch`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QueryOptions {
    /// When false, the fetch is skipped entirely.
    pub enabled: bool,
    /// Retry policy for the request this call may start.
    pub retry: RetryPolicy,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self::new(RetryPolicy::default())
    }
}

impl QueryOptions {
    /// Enabled options with the given retry policy.
    #[must_use]
    pub const fn new(retry: RetryPolicy) -> Self {
        Self {
            enabled: true,
            retry,
        }
    }

    /// Sets whether the fetch should run.
    #[must_use]
    pub const fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

type SharedRequest<V> = Shared<BoxFuture<'static, Result<V>>>;

struct Slot<V> {
    generation: u64,
    in_flight: Option<SharedRequest<V>>,
    state: watch::Sender<CacheEntry<V>>,
}

impl<V> Slot<V> {
    fn new(generation: u64) -> Self {
        let (state, _) = watch::channel(CacheEntry::default());
        Self {
            generation,
            in_flight: None,
            state,
        }
    }
}

/// Keyed cache over asynchronous reads.
///
/// At most one request per key is in flight at any time; callers that ask for
/// a key while its request is running await the same result. Every request
/// belongs to a generation. [`invalidate`](Self::invalidate),
/// [`refetch`](Self::refetch) and [`remove`](Self::remove) move the key to a
/// new generation, and results from older generations are dropped instead of
/// being written to the entry.
///
/// The cache is cheap to clone; clones share the same entries.
pub struct QueryCache<K, V> {
    slots: Arc<Mutex<HashMap<K, Slot<V>>>>,
    generations: Arc<AtomicU64>,
}

impl<K, V> Clone for QueryCache<K, V> {
    fn clone(&self) -> Self {
        Self {
            slots: Arc::clone(&self.slots),
            generations: Arc::clone(&self.generations),
        }
    }
}

impl<K, V> fmt::Debug for QueryCache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryCache")
            .field("generation", &self.generations.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl<K, V> Default for QueryCache<K, V> {
    fn default() -> Self {
        Self {
            slots: Arc::new(Mutex::new(HashMap::new())),
            generations: Arc::new(AtomicU64::new(0)),
        }
    }
}

impl<K, V> QueryCache<K, V>
where
    K: Clone + Eq + Hash + fmt::Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Create a new empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn next_generation(&self) -> u64 {
        self.generations.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Fetches `key`, joining the in-flight request if there is one.
    ///
    /// Returns `None` without calling `producer` when `options.enabled` is
    /// false. Otherwise behaves like [`load`](Self::load).
    pub async fn fetch<F, Fut>(&self, key: K, options: &QueryOptions, producer: F) -> Option<Result<V>>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<V>> + Send + 'static,
    {
        if !options.enabled {
            trace!(key = ?key, "Query disabled, skipping fetch");
            return None;
        }
        Some(self.load(key, options.retry, producer).await)
    }

    /// Loads `key`, joining the in-flight request if there is one.
    ///
    /// Returns the outcome of the request this call started or joined. That
    /// outcome is only written to the entry if the key was not invalidated or
    /// removed while the request ran.
    #[instrument(skip_all, fields(key = ?key))]
    pub async fn load<F, Fut>(&self, key: K, retry: RetryPolicy, producer: F) -> Result<V>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<V>> + Send + 'static,
    {
        let request = {
            let mut slots = self.slots.lock().await;
            let slot = slots
                .entry(key.clone())
                .or_insert_with(|| Slot::new(self.next_generation()));

            match slot.in_flight.clone() {
                Some(request) => {
                    debug!(generation = slot.generation, "Joining in-flight request");
                    request
                }
                None => {
                    let generation = slot.generation;
                    let request = self.spawn_request(key, generation, retry, producer);
                    slot.in_flight = Some(request.clone());
                    slot.state.send_modify(|entry| {
                        entry.status = FetchStatus::Loading;
                        entry.in_flight = Some(generation);
                    });
                    debug!(generation, "Started request");
                    request
                }
            }
        };

        request.await
    }

    /// Invalidates `key` and fetches it again in a new generation.
    ///
    /// A request that was in flight keeps running, but its result is
    /// discarded.
    pub async fn refetch<F, Fut>(&self, key: K, options: &QueryOptions, producer: F) -> Option<Result<V>>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<V>> + Send + 'static,
    {
        self.invalidate(&key).await;
        self.fetch(key, options, producer).await
    }

    /// Invalidates `key` and loads it again in a new generation.
    pub async fn reload<F, Fut>(&self, key: K, retry: RetryPolicy, producer: F) -> Result<V>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<V>> + Send + 'static,
    {
        self.invalidate(&key).await;
        self.load(key, retry, producer).await
    }

    /// Moves `key` to a new generation and marks its data stale.
    ///
    /// Returns true if a request was in flight and is now superseded.
    #[instrument(skip(self))]
    pub async fn invalidate(&self, key: &K) -> bool {
        let mut slots = self.slots.lock().await;
        let Some(slot) = slots.get_mut(key) else {
            return false;
        };

        slot.generation = self.next_generation();
        let superseded = slot.in_flight.take().is_some();
        slot.state.send_modify(|entry| {
            entry.stale = true;
            entry.in_flight = None;
            if entry.status == FetchStatus::Loading {
                entry.status = FetchStatus::Idle;
            }
        });

        if superseded {
            debug!(generation = slot.generation, "Superseded in-flight request");
        }
        superseded
    }

    /// Drops the entry for `key`. Any in-flight result for it is discarded
    /// and its pending retries are abandoned.
    #[instrument(skip(self))]
    pub async fn remove(&self, key: &K) -> bool {
        let removed = self.slots.lock().await.remove(key).is_some();
        if removed {
            debug!("Removed cache entry");
        }
        removed
    }

    /// Returns a copy of the entry for `key`, if one exists.
    pub async fn snapshot(&self, key: &K) -> Option<CacheEntry<V>> {
        let slots = self.slots.lock().await;
        slots.get(key).map(|slot| slot.state.borrow().clone())
    }

    /// Subscribes to changes of the entry for `key`, creating it if needed.
    ///
    /// The receiver closes when the entry is removed.
    pub async fn subscribe(&self, key: K) -> watch::Receiver<CacheEntry<V>> {
        let mut slots = self.slots.lock().await;
        slots
            .entry(key)
            .or_insert_with(|| Slot::new(self.next_generation()))
            .state
            .subscribe()
    }

    /// Returns true while a request for `key` is in flight.
    pub async fn is_fetching(&self, key: &K) -> bool {
        let slots = self.slots.lock().await;
        slots.get(key).is_some_and(|slot| slot.in_flight.is_some())
    }

    /// Number of entries in the cache.
    pub async fn len(&self) -> usize {
        self.slots.lock().await.len()
    }

    /// Returns true if the cache has no entries.
    pub async fn is_empty(&self) -> bool {
        self.slots.lock().await.is_empty()
    }

    /// Drops every entry.
    pub async fn clear(&self) {
        let mut slots = self.slots.lock().await;
        let count = slots.len();
        slots.clear();
        debug!("Cleared {} cache entries", count);
    }

    /// Builds the shared request for one generation of `key` and spawns it,
    /// so it settles even if every caller stops awaiting it.
    fn spawn_request<F, Fut>(
        &self,
        key: K,
        generation: u64,
        retry: RetryPolicy,
        producer: F,
    ) -> SharedRequest<V>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<V>> + Send + 'static,
    {
        let slots = Arc::clone(&self.slots);

        let work = async move {
            let mut attempt = 0;
            let result = loop {
                match producer().await {
                    Err(err) if retry.should_retry(attempt, &err) => {
                        let delay = retry.delay(attempt);
                        attempt += 1;
                        warn!(
                            key = ?key,
                            attempt,
                            max_retries = retry.max_retries,
                            error = %err,
                            "Transient failure, retrying in {:?}",
                            delay
                        );
                        tokio::time::sleep(delay).await;
                        if !is_current(&slots, &key, generation).await {
                            debug!(key = ?key, generation, "Request superseded, abandoning retries");
                            break Err(err);
                        }
                    }
                    outcome => break outcome,
                }
            };

            let mut slots = slots.lock().await;
            match slots.get_mut(&key) {
                Some(slot) if slot.generation == generation => {
                    slot.in_flight = None;
                    slot.state.send_modify(|entry| entry.settle(&result));
                }
                _ => debug!(key = ?key, generation, "Discarding result of superseded request"),
            }
            result
        };

        let request = work.boxed().shared();
        tokio::spawn(request.clone());
        request
    }
}

async fn is_current<K, V>(slots: &Mutex<HashMap<K, Slot<V>>>, key: &K, generation: u64) -> bool
where
    K: Eq + Hash,
{
    slots
        .lock()
        .await
        .get(key)
        .is_some_and(|slot| slot.generation == generation)
}
