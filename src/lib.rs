#![doc = include_str!("../README.md")]
//!
//! ---
//!
//! # Code Reference
//!
//! ## Layers
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │ Memoized<F, V>          call / stats / invalidate            │
//! │   ├── KeyBuilder        Args ─▶ CacheKey (typed, geo)        │
//! │   └── ExpiringCache     whole-cache TTL, checked lazily      │
//! │         └── CacheEngine one Mutex, compute outside the lock  │
//! │               └── LruSegment   hash index + recency list     │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! | Type | Role |
//! |------|------|
//! | [`Memoized`] | Wraps a computation; the usual entry point |
//! | [`KeyBuilder`] / [`build_key`] | Turns call arguments into a hashable key |
//! | [`ExpiringCache`] | Clears everything once the TTL passes |
//! | [`CacheEngine`] | Thread-safe LRU store with compute-on-miss |
//! | [`MemoConfig`] | Capacity, typing, TTL and geo-partitioning switches |
//!
//! ## Complexity
//!
//! | Operation | Cost |
//! |-----------|------|
//! | hit | O(1) plus key construction |
//! | miss | O(1) plus the computation |
//! | eviction | O(1) |
//! | expiry / invalidate | O(n) |
//!
//! ## Using the Engine Directly
//!
//! ```rust
//! use memo_cache::{CacheEngine, Capacity};
//! use std::convert::Infallible;
//!
//! let engine: CacheEngine<&str, usize> = CacheEngine::new(Capacity::Bounded(2));
//! engine.get_or_compute("a", || Ok::<_, Infallible>(1)).unwrap();
//! engine.get_or_compute("b", || Ok::<_, Infallible>(2)).unwrap();
//! engine.get_or_compute("a", || Ok::<_, Infallible>(1)).unwrap();
//! engine.get_or_compute("c", || Ok::<_, Infallible>(3)).unwrap();
//!
//! // "b" was least recently used
//! assert_eq!(engine.keys_by_recency(), vec!["c", "a"]);
//! ```

/// Arena-backed circular doubly linked list.
///
/// Internal infrastructure for the LRU segment. Nodes live in a `Vec` and
/// link to each other by index, with slot 0 reserved for the sentinel.
pub(crate) mod list;

/// Cache configuration.
///
/// Provides [`Capacity`] and [`MemoConfig`].
pub mod config;

/// Error types.
pub mod error;

/// Statistics snapshots and the metrics reporting trait.
pub mod metrics;

/// Single-threaded LRU segment: the algorithm without locking.
pub(crate) mod lru;

/// Thread-safe engine around the LRU segment.
pub mod engine;

/// Whole-cache time-to-live.
pub mod expiry;

/// Cache key construction.
pub mod key;

/// Timezone sources for geo-partitioned keys.
pub mod zone;

/// The memoizing wrapper.
pub mod memo;

pub use config::{Capacity, MemoConfig};
pub use engine::CacheEngine;
pub use error::{CacheError, CallError};
pub use expiry::{Clock, ExpiringCache, ManualClock, SystemClock};
pub use key::{build_key, Arg, ArgKind, Args, CacheKey, KeyBuilder};
pub use memo::Memoized;
pub use metrics::{CacheInfo, CacheMetrics};
pub use zone::{FixedZone, LocalZone, ZoneSource};
