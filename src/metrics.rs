//! Cache Statistics and Metrics
//!
//! Two views of the same counters:
//!
//! - [`CacheInfo`] is the fixed `{hits, misses, capacity, current_size}`
//!   snapshot returned by `stats()`.
//! - [`CacheMetrics`] reports a wider set of values as a `BTreeMap`, so
//!   output always comes out in the same key order for logs and tests.
//!
//! Counters only move forward, except on an explicit clear or an expiry,
//! which zero everything but the capacity.

use crate::config::Capacity;
use std::collections::BTreeMap;
use std::fmt;

/// A consistent snapshot of cache statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheInfo {
    /// Calls served from the cache.
    pub hits: u64,
    /// Calls that ran the computation.
    pub misses: u64,
    /// Configured capacity.
    pub capacity: Capacity,
    /// Number of stored results.
    pub current_size: usize,
}

impl CacheInfo {
    /// Total number of calls since the last clear.
    #[inline]
    pub fn requests(&self) -> u64 {
        self.hits + self.misses
    }

    /// Fraction of calls served from the cache, between 0.0 and 1.0.
    pub fn hit_rate(&self) -> f64 {
        match self.requests() {
            0 => 0.0,
            total => self.hits as f64 / total as f64,
        }
    }
}

impl fmt::Display for CacheInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CacheInfo(hits={}, misses={}, capacity={}, current_size={})",
            self.hits, self.misses, self.capacity, self.current_size
        )
    }
}

/// Counters owned by a cache segment and mutated only under its lock.
#[derive(Debug, Default, Clone)]
pub(crate) struct CoreCacheMetrics {
    pub(crate) hits: u64,
    pub(crate) misses: u64,
    pub(crate) evictions: u64,
}

impl CoreCacheMetrics {
    #[inline]
    pub(crate) fn record_hit(&mut self) {
        self.hits += 1;
    }

    #[inline]
    pub(crate) fn record_miss(&mut self) {
        self.misses += 1;
    }

    #[inline]
    pub(crate) fn record_eviction(&mut self) {
        self.evictions += 1;
    }

    pub(crate) fn reset(&mut self) {
        *self = CoreCacheMetrics::default();
    }

    /// Converts the counters to a map, combined with the current size and capacity.
    pub(crate) fn to_btreemap(&self, capacity: Capacity, len: usize) -> BTreeMap<String, f64> {
        let mut metrics = BTreeMap::new();
        let requests = self.hits + self.misses;

        metrics.insert("cache_hits".to_string(), self.hits as f64);
        metrics.insert("cache_misses".to_string(), self.misses as f64);
        metrics.insert("evictions".to_string(), self.evictions as f64);
        metrics.insert("requests".to_string(), requests as f64);
        metrics.insert("current_size".to_string(), len as f64);

        if let Some(limit) = capacity.limit() {
            metrics.insert("capacity".to_string(), limit as f64);
            if limit > 0 {
                metrics.insert("utilization".to_string(), len as f64 / limit as f64);
            }
        }

        if requests > 0 {
            metrics.insert("hit_rate".to_string(), self.hits as f64 / requests as f64);
            metrics.insert(
                "miss_rate".to_string(),
                self.misses as f64 / requests as f64,
            );
        }

        metrics
    }
}

/// Uniform metrics reporting for the cache types in this crate.
pub trait CacheMetrics {
    /// Returns all metrics as key-value pairs in deterministic order.
    fn metrics(&self) -> BTreeMap<String, f64>;

    /// Short identifier for the cache implementation.
    fn algorithm_name(&self) -> &'static str;
}
