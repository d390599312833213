//! Thread-Safe Cache Engine
//!
//! Wraps an [`LruSegment`] in a single `parking_lot::Mutex` and adds the
//! compute-on-miss protocol used by memoized calls.
//!
//! ```text
//!   get_or_compute(key, compute)
//!        │
//!        ▼
//!   lock ─▶ hit? ──yes──▶ move to MRU, hits += 1 ─▶ unlock ─▶ (value, true)
//!        │
//!        no
//!        ▼
//!   unlock ─▶ compute() ─▶ lock ─▶ key inserted meanwhile? ──yes──▶ keep theirs
//!                                          │
//!                                          no ─▶ insert (may evict LRU)
//!                                          ▼
//!                                   misses += 1 ─▶ unlock ─▶ (value, false)
//! ```
//!
//! The lock is only ever held for O(1) bookkeeping. The computation runs
//! unlocked, so two threads missing on the same key may both compute; the
//! first to re-acquire the lock stores its result and the other returns its
//! own value without touching the structure. This is only indistinguishable
//! from a single computation when the computation is pure.
//!
//! ## Why Mutex Instead of RwLock?
//!
//! A hit reorders the recency list, so every lookup mutates. An `RwLock`
//! would need the write half for every operation anyway.

use crate::config::Capacity;
use crate::lru::LruSegment;
use crate::metrics::{CacheInfo, CacheMetrics};
use core::borrow::Borrow;
use core::hash::{BuildHasher, Hash};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use tracing::trace;

#[cfg(feature = "hashbrown")]
use hashbrown::DefaultHashBuilder;

#[cfg(not(feature = "hashbrown"))]
use std::collections::hash_map::RandomState as DefaultHashBuilder;

/// A thread-safe LRU store with compute-on-miss semantics.
///
/// # Type Parameters
///
/// - `K`: Key type. Must implement `Hash + Eq + Clone`.
/// - `V`: Value type. Must implement `Clone`; hits return a clone.
/// - `S`: Hash builder type. Defaults to `DefaultHashBuilder`.
///
/// # Example
///
/// ```
/// use memo_cache::config::Capacity;
/// use memo_cache::engine::CacheEngine;
/// use std::convert::Infallible;
///
/// let engine: CacheEngine<u32, u64> = CacheEngine::new(Capacity::Bounded(2));
///
/// let (v, hit) = engine.get_or_compute(1, || Ok::<_, Infallible>(10)).unwrap();
/// assert_eq!((v, hit), (10, false));
///
/// let (v, hit) = engine.get_or_compute(1, || Ok::<_, Infallible>(99)).unwrap();
/// assert_eq!((v, hit), (10, true));
/// ```
pub struct CacheEngine<K, V, S = DefaultHashBuilder> {
    segment: Mutex<LruSegment<K, V, S>>,
}

impl<K, V> CacheEngine<K, V, DefaultHashBuilder>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    /// Creates an engine with the default hasher.
    pub fn new(capacity: Capacity) -> Self {
        CacheEngine {
            segment: Mutex::new(LruSegment::new(capacity)),
        }
    }
}

impl<K, V, S> CacheEngine<K, V, S>
where
    K: Hash + Eq + Clone,
    V: Clone,
    S: BuildHasher,
{
    /// Creates an engine with a custom hash builder.
    pub fn with_hasher(capacity: Capacity, hash_builder: S) -> Self {
        CacheEngine {
            segment: Mutex::new(LruSegment::with_hasher(capacity, hash_builder)),
        }
    }

    /// Returns the cached value for `key`, computing and storing it on a miss.
    ///
    /// The second element of the tuple is `true` when the value came from
    /// the cache. If `compute` fails its error is returned as is, nothing
    /// is stored and no statistic changes.
    pub fn get_or_compute<F, E>(&self, key: K, compute: F) -> Result<(V, bool), E>
    where
        F: FnOnce() -> Result<V, E>,
    {
        if let Some(value) = self.segment.lock().get(&key) {
            return Ok((value.clone(), true));
        }

        let value = compute()?;

        let mut segment = self.segment.lock();
        if segment.contains(&key) {
            trace!("result for key computed concurrently, keeping the stored one");
        } else if segment.insert(key, value.clone()).is_some() {
            trace!(len = segment.len(), "evicted least recently used entry");
        }
        segment.record_miss();
        Ok((value, false))
    }

    /// Returns a clone of the value for `key` and marks it most recently used.
    ///
    /// Counts as a hit when present; an absent key is not counted.
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.segment.lock().get(key).cloned()
    }

    /// Returns a clone of the value for `key` without touching recency or statistics.
    pub fn peek<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.segment.lock().peek(key).cloned()
    }

    /// Checks for `key` without touching recency or statistics.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.segment.lock().contains(key)
    }

    /// Removes all entries and resets hits, misses and evictions.
    pub fn clear(&self) {
        self.segment.lock().clear();
    }

    /// Returns a consistent snapshot of the statistics.
    pub fn info(&self) -> CacheInfo {
        self.segment.lock().info()
    }

    /// Returns the configured capacity.
    pub fn capacity(&self) -> Capacity {
        self.segment.lock().capacity()
    }

    /// Returns the number of stored entries.
    pub fn len(&self) -> usize {
        self.segment.lock().len()
    }

    /// Returns `true` if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.segment.lock().is_empty()
    }

    /// Snapshot of the keys from most to least recently used.
    pub fn keys_by_recency(&self) -> Vec<K> {
        self.segment.lock().keys().cloned().collect()
    }
}

impl<K, V, S> CacheMetrics for CacheEngine<K, V, S>
where
    K: Hash + Eq + Clone,
    V: Clone,
    S: BuildHasher,
{
    fn metrics(&self) -> BTreeMap<String, f64> {
        self.segment.lock().metrics()
    }

    fn algorithm_name(&self) -> &'static str {
        "LRU"
    }
}

impl<K, V, S> core::fmt::Debug for CacheEngine<K, V, S> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CacheEngine")
            .field("segment", &*self.segment.lock())
            .finish()
    }
}
