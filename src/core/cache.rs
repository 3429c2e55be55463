//! Named, byte-bounded cache groups with single-flight loading.
//!
//! A [`QueryCache`] stores raw tool output keyed by [`CacheKey`]. Concurrent
//! misses for the same key are coalesced so the tool runs once per process,
//! and with a [`PeerPicker`] that spreads keys over a set of peers, once per
//! mesh: a non-owner asks the owner instead of running the tool itself.
//!
//! Because keys embed their time bucket, an entry is never served outside the
//! bucket it was produced in. Entries from past buckets are simply never asked
//! for again and leave through LRU eviction.

mod flight;
pub mod registry;
mod store;

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use self::flight::{FlightGroup, Role};
use self::store::ByteLru;
use super::error::QueryError;
use super::executor::{execute_key, Executor};
use super::key::CacheKey;
use super::peer::PeerPicker;

pub use registry::CachePool;

/// Share of a group's byte budget reserved for values fetched from peers.
const HOT_CACHE_DIVISOR: usize = 8;

/// Point-in-time statistics for one cache group.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Calls to [`QueryCache::get`].
    pub gets: u64,
    /// Calls answered from the local cache.
    pub cache_hits: u64,
    /// Calls answered by waiting on another caller's load.
    pub coalesced: u64,
    /// Successful local executions.
    pub local_loads: u64,
    /// Failed local executions.
    pub local_load_errors: u64,
    /// Values fetched from a peer.
    pub peer_loads: u64,
    /// Failed peer fetches (the value is then loaded locally).
    pub peer_errors: u64,
    /// Entries evicted to stay within the byte budget.
    pub evictions: u64,
    /// Bytes currently held, main and hot caches combined.
    pub bytes: usize,
    /// Entries currently held, main and hot caches combined.
    pub entries: usize,
    /// Keys with a load in progress.
    pub in_flight: usize,
}

#[derive(Default)]
struct CacheCounters {
    gets: AtomicU64,
    cache_hits: AtomicU64,
    coalesced: AtomicU64,
    local_loads: AtomicU64,
    local_load_errors: AtomicU64,
    peer_loads: AtomicU64,
    peer_errors: AtomicU64,
    evictions: AtomicU64,
}

fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

type LoadResult = Result<Bytes, QueryError>;

/// A named cache group.
pub struct QueryCache {
    name: String,
    capacity_bytes: usize,
    executor: Arc<dyn Executor>,
    peers: Arc<dyn PeerPicker>,
    main: Mutex<ByteLru>,
    hot: Mutex<ByteLru>,
    flights: FlightGroup<LoadResult>,
    counters: CacheCounters,
}

impl QueryCache {
    /// Create a group holding at most `capacity_bytes` of keys and values.
    /// One eighth of the budget is reserved for values owned by peers.
    pub fn new(
        name: impl Into<String>,
        capacity_bytes: usize,
        executor: Arc<dyn Executor>,
        peers: Arc<dyn PeerPicker>,
    ) -> Self {
        let hot_bytes = capacity_bytes / HOT_CACHE_DIVISOR;
        Self {
            name: name.into(),
            capacity_bytes,
            executor,
            peers,
            main: Mutex::new(ByteLru::new(capacity_bytes - hot_bytes)),
            hot: Mutex::new(ByteLru::new(hot_bytes)),
            flights: FlightGroup::default(),
            counters: CacheCounters::default(),
        }
    }

    /// Group name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Total byte budget.
    #[must_use]
    pub const fn capacity_bytes(&self) -> usize {
        self.capacity_bytes
    }

    /// Return the output for `key`, loading it at most once per process no
    /// matter how many callers ask concurrently.
    ///
    /// Errors are handed to every caller waiting on the failed load and are
    /// never cached; the next call tries again.
    ///
    /// # Errors
    ///
    /// [`QueryError::Cancelled`] when `cancel` fires, and any error from
    /// decoding the key or running the tool.
    pub async fn get(&self, key: &CacheKey, cancel: CancellationToken) -> LoadResult {
        bump(&self.counters.gets);
        if let Some(value) = self.lookup(key) {
            bump(&self.counters.cache_hits);
            debug!(group = %self.name, key = %key.as_str().escape_debug(), "cache hit");
            return Ok(value);
        }
        loop {
            match self.flights.join(key.as_str()) {
                Role::Leader(guard) => {
                    let result = self.load(key, cancel.clone()).await;
                    let waiters = guard.complete(&result);
                    if waiters > 0 {
                        debug!(group = %self.name, waiters, "flight completed");
                    }
                    return result;
                }
                Role::Follower(rx) => {
                    let received = tokio::select! {
                        biased;
                        () = cancel.cancelled() => return Err(QueryError::Cancelled),
                        received = rx => received,
                    };
                    match received {
                        Ok(Err(QueryError::Cancelled)) | Err(_) => {
                            debug!(group = %self.name, "leader abandoned its load, retrying");
                        }
                        Ok(result) => {
                            bump(&self.counters.coalesced);
                            return result;
                        }
                    }
                }
            }
        }
    }

    /// Read a cached value without loading it or touching statistics.
    #[must_use]
    pub fn peek(&self, key: &CacheKey) -> Option<Bytes> {
        let main = self.main.lock().peek(key.as_str());
        main.or_else(|| self.hot.lock().peek(key.as_str()))
    }

    /// Drop every cached value.
    pub fn clear(&self) {
        self.main.lock().clear();
        self.hot.lock().clear();
    }

    /// Snapshot of this group's statistics.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        let (main_bytes, main_len) = {
            let main = self.main.lock();
            (main.bytes(), main.len())
        };
        let (hot_bytes, hot_len) = {
            let hot = self.hot.lock();
            (hot.bytes(), hot.len())
        };
        let c = &self.counters;
        CacheStats {
            gets: c.gets.load(Ordering::Relaxed),
            cache_hits: c.cache_hits.load(Ordering::Relaxed),
            coalesced: c.coalesced.load(Ordering::Relaxed),
            local_loads: c.local_loads.load(Ordering::Relaxed),
            local_load_errors: c.local_load_errors.load(Ordering::Relaxed),
            peer_loads: c.peer_loads.load(Ordering::Relaxed),
            peer_errors: c.peer_errors.load(Ordering::Relaxed),
            evictions: c.evictions.load(Ordering::Relaxed),
            bytes: main_bytes + hot_bytes,
            entries: main_len + hot_len,
            in_flight: self.flights.in_flight(),
        }
    }

    fn lookup(&self, key: &CacheKey) -> Option<Bytes> {
        let main = self.main.lock().get(key.as_str());
        main.or_else(|| self.hot.lock().get(key.as_str()))
    }

    fn populate(&self, store: &Mutex<ByteLru>, key: &CacheKey, value: Bytes) {
        let evicted = store.lock().insert(key.as_str().to_string(), value);
        if evicted > 0 {
            self.counters
                .evictions
                .fetch_add(evicted as u64, Ordering::Relaxed);
            debug!(group = %self.name, evicted, "evicted cache entries");
        }
    }

    async fn load(&self, key: &CacheKey, cancel: CancellationToken) -> LoadResult {
        // another flight may have filled the key between lookup and join
        if let Some(value) = self.lookup(key) {
            bump(&self.counters.cache_hits);
            return Ok(value);
        }
        if let Some(peer) = self.peers.pick_peer(key) {
            match peer.get(&self.name, key, cancel.clone()).await {
                Ok(value) => {
                    bump(&self.counters.peer_loads);
                    self.populate(&self.hot, key, value.clone());
                    return Ok(value);
                }
                Err(QueryError::Cancelled) => return Err(QueryError::Cancelled),
                Err(e) => {
                    bump(&self.counters.peer_errors);
                    warn!(group = %self.name, error = %e, "peer load failed, loading locally");
                }
            }
        }
        match execute_key(self.executor.as_ref(), key, cancel).await {
            Ok(value) => {
                bump(&self.counters.local_loads);
                self.populate(&self.main, key, value.clone());
                Ok(value)
            }
            Err(e) => {
                bump(&self.counters.local_load_errors);
                debug!(group = %self.name, error = %e, "local load failed");
                Err(e)
            }
        }
    }
}

impl fmt::Debug for QueryCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryCache")
            .field("name", &self.name)
            .field("capacity_bytes", &self.capacity_bytes)
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}
