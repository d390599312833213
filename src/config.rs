//! Memoization Cache Configuration
//!
//! A cache is configured once, when a computation is wrapped, through a
//! [`MemoConfig`] with public fields. Nothing in it can change for the
//! lifetime of the cache.
//!
//! | Field | Meaning |
//! |-------|---------|
//! | `capacity` | [`Capacity::Bounded`] entry limit with LRU eviction, or [`Capacity::Unbounded`] |
//! | `typed` | Arguments of different kinds are cached separately (`3` vs `3.0`) |
//! | `ttl` | Whole-cache time-to-live; `None` disables expiry |
//! | `geo_partitioned` | Keys include the caller's current timezone |
//!
//! A capacity of zero is legal: nothing is stored but misses are still
//! counted.
//!
//! # Examples
//!
//! ```
//! use memo_cache::config::{Capacity, MemoConfig};
//! use std::time::Duration;
//!
//! let config = MemoConfig {
//!     capacity: Capacity::Bounded(256),
//!     typed: true,
//!     ttl: Some(Duration::from_secs(300)),
//!     geo_partitioned: false,
//! };
//! assert!(config.validate().is_ok());
//!
//! // Signed inputs are checked at construction time.
//! assert!(Capacity::from_signed(-1).is_err());
//! ```

use crate::error::{CacheError, Result};
use core::fmt;
use std::time::{Duration, Instant};

/// Upper bound on the number of entries a cache may hold.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Capacity {
    /// At most this many entries; the least recently used one is evicted
    /// to make room. Zero disables storage entirely.
    Bounded(usize),
    /// No limit and no eviction.
    Unbounded,
}

impl Capacity {
    /// Builds a bounded capacity from a signed count, rejecting negatives.
    pub fn from_signed(n: i64) -> Result<Self> {
        usize::try_from(n).map(Capacity::Bounded).map_err(|_| {
            CacheError::InvalidArgument(format!("capacity must be non-negative, got {n}"))
        })
    }

    /// Returns the entry limit, or `None` when unbounded.
    #[inline]
    pub fn limit(&self) -> Option<usize> {
        match self {
            Capacity::Bounded(n) => Some(*n),
            Capacity::Unbounded => None,
        }
    }

    /// Returns true when no entry can ever be stored.
    #[inline]
    pub fn is_disabled(&self) -> bool {
        matches!(self, Capacity::Bounded(0))
    }
}

impl From<Option<usize>> for Capacity {
    fn from(limit: Option<usize>) -> Self {
        limit.map_or(Capacity::Unbounded, Capacity::Bounded)
    }
}

impl fmt::Display for Capacity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capacity::Bounded(n) => write!(f, "{n}"),
            Capacity::Unbounded => f.write_str("unbounded"),
        }
    }
}

/// Configuration for a memoized computation.
///
/// # Fields
///
/// - `capacity`: entry limit, see [`Capacity`].
/// - `typed`: when true, `Int(3)` and `Float(3.0)` produce different keys.
/// - `ttl`: every entry is dropped once this much time has passed since the
///   cache was created or last expired. Checked lazily on access.
/// - `geo_partitioned`: results are partitioned by the current timezone.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct MemoConfig {
    /// Maximum number of cached results.
    pub capacity: Capacity,
    /// Cache arguments of different kinds separately.
    pub typed: bool,
    /// Whole-cache time-to-live.
    pub ttl: Option<Duration>,
    /// Append the current timezone identifiers to every key.
    pub geo_partitioned: bool,
}

impl MemoConfig {
    /// Capacity used by [`MemoConfig::default`].
    pub const DEFAULT_CAPACITY: usize = 100;

    /// Sets the time-to-live from a number of seconds.
    ///
    /// Fails for negative, zero, non-finite or unrepresentably large values.
    pub fn with_ttl_secs(mut self, secs: f64) -> Result<Self> {
        if !secs.is_finite() || secs <= 0.0 {
            return Err(CacheError::InvalidArgument(format!(
                "ttl must be a positive number of seconds, got {secs}"
            )));
        }
        let ttl = Duration::try_from_secs_f64(secs).map_err(|_| {
            CacheError::InvalidArgument(format!("ttl of {secs} seconds is out of range"))
        })?;
        self.ttl = Some(ttl);
        Ok(self)
    }

    /// Checks the configuration for values that cannot be honoured.
    pub fn validate(&self) -> Result<()> {
        match self.ttl {
            Some(Duration::ZERO) => Err(CacheError::InvalidArgument(String::from(
                "ttl must be greater than zero",
            ))),
            // deadlines are computed as `now + ttl`
            Some(ttl) if Instant::now().checked_add(ttl).is_none() => Err(
                CacheError::InvalidArgument(format!("ttl of {ttl:?} is too large")),
            ),
            _ => Ok(()),
        }
    }
}

impl Default for MemoConfig {
    fn default() -> Self {
        MemoConfig {
            capacity: Capacity::Bounded(Self::DEFAULT_CAPACITY),
            typed: false,
            ttl: None,
            geo_partitioned: false,
        }
    }
}

impl fmt::Debug for MemoConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoConfig")
            .field("capacity", &self.capacity)
            .field("typed", &self.typed)
            .field("ttl", &self.ttl)
            .field("geo_partitioned", &self.geo_partitioned)
            .finish()
    }
}
