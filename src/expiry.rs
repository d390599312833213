//! Whole-Cache Expiry
//!
//! [`ExpiringCache`] wraps a [`CacheEngine`] with a time-to-live. There is no
//! background timer: every public operation first compares the clock with
//! the current deadline.
//!
//! ```text
//!            now < deadline
//!          ┌───────────────┐
//!          ▼               │
//!       ┌──────┐  now >= deadline  ┌─────────┐
//!       │ LIVE │ ────────────────▶ │ EXPIRED │
//!       └──────┘                   └────┬────┘
//!          ▲   clear engine,            │
//!          └── deadline = now + ttl ────┘
//! ```
//!
//! The new deadline is measured from the moment the expiry was observed, not
//! from the old deadline. A cache that is not touched for a while therefore
//! lives longer than one TTL, and a cache nobody calls keeps its stale
//! entries in memory until the next call.
//!
//! A TTL so large that `now + ttl` overflows [`Instant`] is rejected when
//! the cache is built. If a later reset would overflow, the cache stops
//! expiring instead.

use crate::engine::CacheEngine;
use crate::error::{self, CacheError};
use crate::metrics::{CacheInfo, CacheMetrics};
use core::fmt;
use core::hash::{BuildHasher, Hash};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

#[cfg(feature = "hashbrown")]
use hashbrown::DefaultHashBuilder;

#[cfg(not(feature = "hashbrown"))]
use std::collections::hash_map::RandomState as DefaultHashBuilder;

/// Source of the current time for expiry checks.
pub trait Clock: Send + Sync + fmt::Debug {
    /// Returns the current instant.
    fn now(&self) -> Instant;
}

/// The monotonic system clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    #[inline]
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A clock that only moves when told to.
///
/// ```
/// use memo_cache::expiry::{Clock, ManualClock};
/// use std::time::Duration;
///
/// let clock = ManualClock::new();
/// let start = clock.now();
/// clock.advance(Duration::from_secs(5));
/// assert_eq!(clock.now() - start, Duration::from_secs(5));
/// ```
#[derive(Debug)]
pub struct ManualClock {
    origin: Instant,
    elapsed: Mutex<Duration>,
}

impl ManualClock {
    /// Creates a clock frozen at the current instant.
    pub fn new() -> Self {
        ManualClock {
            origin: Instant::now(),
            elapsed: Mutex::new(Duration::ZERO),
        }
    }

    /// Moves the clock forward by `by`.
    pub fn advance(&self, by: Duration) {
        *self.elapsed.lock() += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + *self.elapsed.lock()
    }
}

/// TTL bookkeeping. Mutated only by [`Expiry::check`].
struct Expiry {
    ttl: Duration,
    /// `None` once the next deadline is past the end of [`Instant`].
    deadline: Mutex<Option<Instant>>,
    clock: Arc<dyn Clock>,
    expirations: AtomicU64,
}

impl Expiry {
    fn new(ttl: Duration, clock: Arc<dyn Clock>) -> error::Result<Self> {
        if ttl.is_zero() {
            return Err(CacheError::InvalidArgument(String::from(
                "ttl must be greater than zero",
            )));
        }
        let deadline = clock.now().checked_add(ttl).ok_or_else(|| {
            CacheError::InvalidArgument(format!("ttl of {ttl:?} is too large"))
        })?;
        Ok(Expiry {
            ttl,
            deadline: Mutex::new(Some(deadline)),
            clock,
            expirations: AtomicU64::new(0),
        })
    }

    /// Runs `on_expire` and pushes the deadline out if it has passed.
    ///
    /// The deadline lock is held across `on_expire`, so concurrent callers
    /// observe a single expiry.
    fn check(&self, on_expire: impl FnOnce()) -> bool {
        let now = self.clock.now();
        let mut deadline = self.deadline.lock();
        match *deadline {
            Some(at) if now >= at => {}
            _ => return false,
        }
        on_expire();
        *deadline = now.checked_add(self.ttl);
        self.expirations.fetch_add(1, Ordering::Relaxed);
        debug!(ttl = ?self.ttl, "cache expired, cleared all entries");
        true
    }
}

/// A [`CacheEngine`] whose contents are dropped wholesale every TTL.
///
/// With no TTL this is a plain pass-through.
pub struct ExpiringCache<K, V, S = DefaultHashBuilder> {
    engine: CacheEngine<K, V, S>,
    expiry: Option<Expiry>,
}

impl<K, V, S> ExpiringCache<K, V, S>
where
    K: Hash + Eq + Clone,
    V: Clone,
    S: BuildHasher,
{
    /// Wraps `engine`, timing with the system clock.
    ///
    /// # Errors
    ///
    /// [`CacheError::InvalidArgument`] if `ttl` is zero or too large to add
    /// to the current time.
    pub fn new(engine: CacheEngine<K, V, S>, ttl: Option<Duration>) -> error::Result<Self> {
        Self::with_clock(engine, ttl, Arc::new(SystemClock))
    }

    /// Wraps `engine` with an explicit clock. The first deadline is one TTL
    /// from the clock's current time.
    ///
    /// # Errors
    ///
    /// Same as [`ExpiringCache::new`].
    pub fn with_clock(
        engine: CacheEngine<K, V, S>,
        ttl: Option<Duration>,
        clock: Arc<dyn Clock>,
    ) -> error::Result<Self> {
        let expiry = ttl.map(|ttl| Expiry::new(ttl, clock)).transpose()?;
        Ok(ExpiringCache { engine, expiry })
    }

    /// Clears the engine if the deadline has passed.
    ///
    /// Returns true if an expiry happened. Every other public method calls
    /// this first.
    pub fn check_expiry(&self) -> bool {
        match &self.expiry {
            Some(expiry) => expiry.check(|| self.engine.clear()),
            None => false,
        }
    }

    /// Expiry-checked [`CacheEngine::get_or_compute`].
    pub fn get_or_compute<F, E>(&self, key: K, compute: F) -> Result<(V, bool), E>
    where
        F: FnOnce() -> Result<V, E>,
    {
        self.check_expiry();
        self.engine.get_or_compute(key, compute)
    }

    /// Expiry-checked statistics snapshot.
    pub fn info(&self) -> CacheInfo {
        self.check_expiry();
        self.engine.info()
    }

    /// Clears all entries and statistics. The deadline is left alone.
    pub fn clear(&self) {
        self.check_expiry();
        self.engine.clear();
    }

    /// The underlying engine, without expiry checks.
    pub fn engine(&self) -> &CacheEngine<K, V, S> {
        &self.engine
    }

    /// Configured time-to-live.
    pub fn ttl(&self) -> Option<Duration> {
        self.expiry.as_ref().map(|e| e.ttl)
    }

    /// Current deadline. `None` without a TTL, or once the cache has
    /// stopped expiring because the next deadline would overflow.
    pub fn deadline(&self) -> Option<Instant> {
        self.expiry.as_ref().and_then(|e| *e.deadline.lock())
    }

    /// Number of expiries since the cache was created.
    pub fn expirations(&self) -> u64 {
        self.expiry
            .as_ref()
            .map_or(0, |e| e.expirations.load(Ordering::Relaxed))
    }
}

impl<K, V, S> CacheMetrics for ExpiringCache<K, V, S>
where
    K: Hash + Eq + Clone,
    V: Clone,
    S: BuildHasher,
{
    fn metrics(&self) -> BTreeMap<String, f64> {
        self.check_expiry();
        let mut metrics = self.engine.metrics();
        metrics.insert("expirations".to_string(), self.expirations() as f64);
        if let Some(ttl) = self.ttl() {
            metrics.insert("ttl_seconds".to_string(), ttl.as_secs_f64());
        }
        metrics
    }

    fn algorithm_name(&self) -> &'static str {
        "LRU+TTL"
    }
}

impl<K, V, S> fmt::Debug for ExpiringCache<K, V, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExpiringCache")
            .field("engine", &self.engine)
            .field("ttl", &self.expiry.as_ref().map(|e| e.ttl))
            .finish()
    }
}
