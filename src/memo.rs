//! Memoized Computations
//!
//! [`Memoized`] is the public face of the crate: it owns a computation and
//! the cache in front of it. A call goes through three steps:
//!
//! 1. the expiry check, which may clear the whole cache;
//! 2. key construction from the call's [`Args`];
//! 3. lookup in the LRU engine, computing and storing on a miss.
//!
//! The computation must be pure. Two threads missing on the same key may
//! both run it; only one result is kept and both callers get their own.

use crate::config::MemoConfig;
use crate::engine::CacheEngine;
use crate::error::{CallError, Result};
use crate::expiry::{Clock, ExpiringCache, SystemClock};
use crate::key::{Args, CacheKey, KeyBuilder};
use crate::metrics::{CacheInfo, CacheMetrics};
use crate::zone::{LocalZone, ZoneSource};
use core::fmt;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// A computation with a cache in front of it.
///
/// The computation receives the call's [`Args`] and returns a `Result`;
/// errors are passed back to the caller and never cached.
///
/// # Example
///
/// ```
/// use memo_cache::config::{Capacity, MemoConfig};
/// use memo_cache::key::Args;
/// use memo_cache::Memoized;
///
/// let square = Memoized::wrap(
///     |args: &Args| {
///         let x = args.get(0).and_then(|a| a.as_int()).ok_or("expected an integer")?;
///         Ok::<_, &str>(x * x)
///     },
///     MemoConfig { capacity: Capacity::Bounded(2), ..MemoConfig::default() },
/// )
/// .unwrap();
///
/// assert_eq!(square.call(&Args::new().arg(4)).unwrap(), 16);
/// assert_eq!(square.call(&Args::new().arg(4)).unwrap(), 16);
///
/// let stats = square.stats();
/// assert_eq!((stats.hits, stats.misses, stats.current_size), (1, 1, 1));
///
/// square.invalidate();
/// assert_eq!(square.stats().current_size, 0);
/// ```
pub struct Memoized<F, V> {
    func: F,
    keys: KeyBuilder,
    cache: ExpiringCache<CacheKey, V>,
    config: MemoConfig,
}

impl<F, V: Clone> Memoized<F, V> {
    /// Wraps `func` using the local timezone and the system clock.
    ///
    /// # Errors
    ///
    /// [`CacheError::InvalidArgument`](crate::CacheError::InvalidArgument)
    /// if `config` does not validate.
    pub fn wrap(func: F, config: MemoConfig) -> Result<Self> {
        Self::wrap_with(func, config, Arc::new(LocalZone), Arc::new(SystemClock))
    }

    /// Wraps `func` with an explicit timezone source and clock.
    ///
    /// `zones` is only consulted when `config.geo_partitioned` is set, and
    /// `clock` only when a TTL is configured.
    pub fn wrap_with(
        func: F,
        config: MemoConfig,
        zones: Arc<dyn ZoneSource>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        config.validate()?;

        let mut keys = KeyBuilder::new(config.typed);
        if config.geo_partitioned {
            keys = keys.geo_partitioned(zones);
        }
        let engine = CacheEngine::new(config.capacity);
        let cache = ExpiringCache::with_clock(engine, config.ttl, clock)?;

        debug!(
            capacity = %config.capacity,
            typed = config.typed,
            ttl = ?config.ttl,
            geo_partitioned = config.geo_partitioned,
            "wrapped computation"
        );

        Ok(Memoized {
            func,
            keys,
            cache,
            config,
        })
    }

    /// Calls the computation, or returns the cached result for equal arguments.
    pub fn call<E>(&self, args: &Args) -> core::result::Result<V, CallError<E>>
    where
        F: Fn(&Args) -> core::result::Result<V, E>,
    {
        self.call_with_status(args).map(|(value, _)| value)
    }

    /// Like [`call`](Self::call), also reporting whether the result was cached.
    pub fn call_with_status<E>(&self, args: &Args) -> core::result::Result<(V, bool), CallError<E>>
    where
        F: Fn(&Args) -> core::result::Result<V, E>,
    {
        self.cache.check_expiry();
        let key = self.keys.build(args)?;
        self.cache
            .engine()
            .get_or_compute(key, || (self.func)(args))
            .map_err(CallError::Computation)
    }

    /// Returns hit, miss, capacity and size statistics.
    pub fn stats(&self) -> CacheInfo {
        self.cache.info()
    }

    /// Drops every cached result and resets the statistics.
    pub fn invalidate(&self) {
        self.cache.clear();
        debug!("memoized cache invalidated");
    }

    /// The wrapped computation, bypassing the cache.
    pub fn wrapped(&self) -> &F {
        &self.func
    }

    /// The configuration the cache was built with.
    pub fn config(&self) -> &MemoConfig {
        &self.config
    }

    /// Number of TTL expiries since the cache was created.
    pub fn expirations(&self) -> u64 {
        self.cache.expirations()
    }
}

impl<F, V: Clone> CacheMetrics for Memoized<F, V> {
    fn metrics(&self) -> BTreeMap<String, f64> {
        self.cache.metrics()
    }

    fn algorithm_name(&self) -> &'static str {
        self.cache.algorithm_name()
    }
}

impl<F, V> fmt::Debug for Memoized<F, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Memoized")
            .field("config", &self.config)
            .field("keys", &self.keys)
            .field("cache", &self.cache)
            .finish()
    }
}
