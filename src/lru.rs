//! Least Recently Used (LRU) Segment
//!
//! The single-threaded core of the cache: a hash index from key to arena slot
//! plus a recency list threaded through the arena. Every operation is O(1).
//!
//! # Algorithm
//!
//! - **Hit**: look the slot up in the index, splice it to the front of the
//!   recency list.
//! - **Miss with room**: push a new node at the front.
//! - **Miss when full**: the node at the back of the list is the least
//!   recently used. Its key is removed from the index and the slot is
//!   overwritten in place with the new entry, then moved to the front.
//!
//! Unbounded segments always push; a zero-capacity segment never stores.
//!
//! # Thread Safety
//!
//! Not thread-safe on its own. [`CacheEngine`](crate::engine::CacheEngine)
//! puts a segment behind a `parking_lot::Mutex`.

use crate::config::Capacity;
use crate::list::List;
use crate::metrics::{CacheInfo, CoreCacheMetrics};
use core::borrow::Borrow;
use core::hash::{BuildHasher, Hash};
use std::collections::BTreeMap;

#[cfg(feature = "hashbrown")]
use hashbrown::DefaultHashBuilder;
#[cfg(feature = "hashbrown")]
use hashbrown::HashMap;

#[cfg(not(feature = "hashbrown"))]
use std::collections::hash_map::RandomState as DefaultHashBuilder;
#[cfg(not(feature = "hashbrown"))]
use std::collections::HashMap;

/// Upper bound on slots reserved up front, so a huge capacity does not
/// allocate before it is used.
const MAX_PREALLOC: usize = 1024;

/// Internal LRU segment containing the actual cache algorithm.
///
/// Invariants, upheld by every method:
/// - `map.len() == list.len()`
/// - every slot in `map` holds a `(key, value)` whose key equals the map key
/// - `list.len() <= capacity` when bounded
pub(crate) struct LruSegment<K, V, S = DefaultHashBuilder> {
    capacity: Capacity,
    list: List<(K, V)>,
    map: HashMap<K, usize, S>,
    metrics: CoreCacheMetrics,
}

impl<K: Hash + Eq, V> LruSegment<K, V> {
    pub(crate) fn new(capacity: Capacity) -> Self {
        Self::with_hasher(capacity, DefaultHashBuilder::default())
    }
}

impl<K: Hash + Eq, V, S: BuildHasher> LruSegment<K, V, S> {
    pub(crate) fn with_hasher(capacity: Capacity, hash_builder: S) -> Self {
        let prealloc = capacity.limit().unwrap_or(0).min(MAX_PREALLOC);
        LruSegment {
            capacity,
            list: List::with_capacity(prealloc),
            map: HashMap::with_capacity_and_hasher(prealloc, hash_builder),
            metrics: CoreCacheMetrics::default(),
        }
    }

    #[inline]
    pub(crate) fn capacity(&self) -> Capacity {
        self.capacity
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.map.len()
    }

    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Looks up `key`, marks it most recently used and records a hit.
    ///
    /// A miss is not recorded here: the caller records it once the result
    /// has been computed, see [`record_miss`](Self::record_miss).
    pub(crate) fn get<Q>(&mut self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let idx = self.map.get(key).copied()?;
        self.list.move_to_front(idx);
        self.metrics.record_hit();
        self.list.get(idx).map(|(_, v)| v)
    }

    /// Looks up `key` without touching recency or statistics.
    pub(crate) fn peek<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let idx = self.map.get(key).copied()?;
        self.list.get(idx).map(|(_, v)| v)
    }

    #[inline]
    pub(crate) fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.map.contains_key(key)
    }

    #[inline]
    pub(crate) fn record_miss(&mut self) {
        self.metrics.record_miss();
    }

    /// Stores a result for a key that is known to be absent.
    ///
    /// Returns the evicted entry when the segment was full.
    pub(crate) fn insert(&mut self, key: K, value: V) -> Option<(K, V)>
    where
        K: Clone,
    {
        debug_assert!(!self.map.contains_key(&key), "insert of a present key");

        match self.capacity {
            Capacity::Bounded(0) => None,
            Capacity::Bounded(cap) if self.map.len() >= cap => self.recycle_oldest(key, value),
            _ => {
                let idx = self.list.push_front((key.clone(), value));
                self.map.insert(key, idx);
                None
            }
        }
    }

    /// Overwrites the least recently used slot with the new entry.
    fn recycle_oldest(&mut self, key: K, value: V) -> Option<(K, V)>
    where
        K: Clone,
    {
        let Some(idx) = self.list.back() else {
            let idx = self.list.push_front((key.clone(), value));
            self.map.insert(key, idx);
            return None;
        };
        let evicted = self.list.replace(idx, (key.clone(), value));
        if let Some((old_key, _)) = &evicted {
            self.map.remove(old_key);
            self.metrics.record_eviction();
        }
        self.map.insert(key, idx);
        evicted
    }

    /// Removes every entry and zeroes the statistics. Capacity is kept.
    pub(crate) fn clear(&mut self) {
        self.map.clear();
        self.list.clear();
        self.metrics.reset();
    }

    /// Keys ordered from most to least recently used.
    pub(crate) fn keys(&self) -> impl Iterator<Item = &K> + '_ {
        self.list.iter().map(|(k, _)| k)
    }

    pub(crate) fn info(&self) -> CacheInfo {
        CacheInfo {
            hits: self.metrics.hits,
            misses: self.metrics.misses,
            capacity: self.capacity,
            current_size: self.map.len(),
        }
    }

    pub(crate) fn metrics(&self) -> BTreeMap<String, f64> {
        self.metrics.to_btreemap(self.capacity, self.map.len())
    }
}

impl<K, V, S> core::fmt::Debug for LruSegment<K, V, S> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("LruSegment")
            .field("capacity", &self.capacity)
            .field("len", &self.map.len())
            .field("list", &self.list)
            .finish()
    }
}
