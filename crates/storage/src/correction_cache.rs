//! In-memory LRU cache of correction sets with single-flight computation.
//!
//! At most one computation runs per tile coordinate. Requests arriving
//! while it runs wait on the same shared future instead of starting their
//! own. The computation is spawned as its own task, so it completes and
//! populates the cache even when every waiting request has gone away.
//!
//! Successful results are kept under LRU eviction; failures are handed to
//! the current waiters and then forgotten, so the next request retries.

use futures::future::{BoxFuture, FutureExt, Shared};
use lru::LruCache;
use std::collections::HashMap;
use std::fmt::Display;
use std::future::Future;
use std::num::NonZeroUsize;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use tile_common::TileCoord;

use crate::CorrectionSet;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
    #[error("correction lookup failed: {0}")]
    Compute(String),

    #[error("correction lookup panicked")]
    Panicked,

    #[error("correction task did not complete: {0}")]
    Aborted(String),
}

pub type CacheResult<T> = Result<T, CacheError>;

/// How a lookup was satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheOutcome {
    Hit,
    /// This request started the computation
    Miss,
    /// Joined a computation another request started
    Coalesced,
}

type PendingResult = Shared<BoxFuture<'static, CacheResult<Arc<CorrectionSet>>>>;

struct CacheState {
    entries: LruCache<TileCoord, Arc<CorrectionSet>>,
    in_flight: HashMap<TileCoord, PendingResult>,
}

/// Statistics for the correction cache.
#[derive(Debug, Default)]
pub struct CorrectionCacheStats {
    pub hits: AtomicU64,
    pub misses: AtomicU64,
    pub coalesced: AtomicU64,
    pub evictions: AtomicU64,
    pub failures: AtomicU64,
}

/// Point-in-time copy of the cache statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStatsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub coalesced: u64,
    pub evictions: u64,
    pub failures: u64,
    pub entries: usize,
    pub capacity: usize,
}

impl CacheStatsSnapshot {
    /// Hit rate as a percentage (0-100). Coalesced waits count as hits.
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits + self.coalesced;
        let total = hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (hits as f64 / total as f64) * 100.0
        }
    }
}

/// Bounded cache of [`CorrectionSet`]s keyed by tile coordinate.
#[derive(Clone)]
pub struct CorrectionCache {
    state: Arc<Mutex<CacheState>>,
    stats: Arc<CorrectionCacheStats>,
    capacity: usize,
}

impl CorrectionCache {
    /// Create a cache holding at most `capacity` tiles (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            state: Arc::new(Mutex::new(CacheState {
                entries: LruCache::new(capacity),
                in_flight: HashMap::new(),
            })),
            stats: Arc::new(CorrectionCacheStats::default()),
            capacity: capacity.get(),
        }
    }

    /// Return the cached set for `coord`, or run `compute` to produce it.
    ///
    /// `compute` is only invoked when the coordinate is neither cached nor
    /// already being computed.
    pub async fn get_or_compute<F, Fut, E>(
        &self,
        coord: TileCoord,
        compute: F,
    ) -> CacheResult<(Arc<CorrectionSet>, CacheOutcome)>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<CorrectionSet, E>> + Send + 'static,
        E: Display + Send + 'static,
    {
        let (pending, outcome) = {
            let mut state = self.state.lock().await;

            if let Some(set) = state.entries.get(&coord) {
                self.stats.hits.fetch_add(1, Ordering::Relaxed);
                return Ok((set.clone(), CacheOutcome::Hit));
            }

            if let Some(pending) = state.in_flight.get(&coord) {
                self.stats.coalesced.fetch_add(1, Ordering::Relaxed);
                debug!(tile = %coord, "Joining in-flight correction lookup");
                (pending.clone(), CacheOutcome::Coalesced)
            } else {
                self.stats.misses.fetch_add(1, Ordering::Relaxed);
                let pending = self.spawn_compute(coord, compute());
                // Registered before the lock is released, so the task's own
                // removal always happens after this insert.
                state.in_flight.insert(coord, pending.clone());
                (pending, CacheOutcome::Miss)
            }
        };

        pending.await.map(|set| (set, outcome))
    }

    fn spawn_compute<Fut, E>(&self, coord: TileCoord, fut: Fut) -> PendingResult
    where
        Fut: Future<Output = Result<CorrectionSet, E>> + Send + 'static,
        E: Display + Send + 'static,
    {
        let state = self.state.clone();
        let stats = self.stats.clone();

        let handle = tokio::spawn(async move {
            let result = match AssertUnwindSafe(fut).catch_unwind().await {
                Ok(Ok(set)) => Ok(Arc::new(set)),
                Ok(Err(e)) => Err(CacheError::Compute(e.to_string())),
                Err(_) => Err(CacheError::Panicked),
            };

            let mut state = state.lock().await;
            state.in_flight.remove(&coord);
            match &result {
                Ok(set) => {
                    if let Some((evicted, _)) = state.entries.push(coord, set.clone()) {
                        if evicted != coord {
                            stats.evictions.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                }
                Err(e) => {
                    stats.failures.fetch_add(1, Ordering::Relaxed);
                    warn!(tile = %coord, error = %e, "Correction lookup failed, not caching");
                }
            }
            result
        });

        async move {
            match handle.await {
                Ok(result) => result,
                Err(e) => Err(CacheError::Aborted(e.to_string())),
            }
        }
        .boxed()
        .shared()
    }

    /// Cached set for `coord` without computing or touching LRU order.
    pub async fn peek(&self, coord: &TileCoord) -> Option<Arc<CorrectionSet>> {
        self.state.lock().await.entries.peek(coord).cloned()
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Number of computations currently running.
    pub async fn in_flight(&self) -> usize {
        self.state.lock().await.in_flight.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub async fn clear(&self) {
        self.state.lock().await.entries.clear();
    }

    pub async fn stats(&self) -> CacheStatsSnapshot {
        CacheStatsSnapshot {
            hits: self.stats.hits.load(Ordering::Relaxed),
            misses: self.stats.misses.load(Ordering::Relaxed),
            coalesced: self.stats.coalesced.load(Ordering::Relaxed),
            evictions: self.stats.evictions.load(Ordering::Relaxed),
            failures: self.stats.failures.load(Ordering::Relaxed),
            entries: self.len().await,
            capacity: self.capacity,
        }
    }
}

impl std::fmt::Debug for CorrectionCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CorrectionCache")
            .field("capacity", &self.capacity)
            .field("stats", &self.stats)
            .finish()
    }
}
