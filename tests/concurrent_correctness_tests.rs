//! Concurrent Correctness Tests
//!
//! Validates that a shared [`Memoized`] keeps its invariants while many
//! threads call, invalidate and expire it at once.
//!
//! ## Segments
//!
//! 1. **Accounting**: every call is exactly one hit or one miss
//! 2. **Locking**: a computation in progress never blocks other keys
//! 3. **Invalidation and expiry**: clears racing with calls stay consistent

use memo_cache::{
    Arg, Args, Capacity, LocalZone, ManualClock, MemoConfig, Memoized, SystemClock,
};
use scoped_threadpool::Pool;
use std::convert::Infallible;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

fn square(runs: &AtomicUsize) -> impl Fn(&Args) -> Result<i64, Infallible> + Sync + '_ {
    move |args: &Args| {
        runs.fetch_add(1, Ordering::SeqCst);
        let n = args.get(0).and_then(Arg::as_int).unwrap_or_default();
        Ok::<_, Infallible>(n * n)
    }
}

fn bounded(capacity: usize) -> MemoConfig {
    MemoConfig {
        capacity: Capacity::Bounded(capacity),
        ..MemoConfig::default()
    }
}

// ============================================================================
// SEGMENT 1: ACCOUNTING
// ============================================================================

#[test]
fn test_every_call_is_a_hit_or_a_miss() {
    const THREADS: u32 = 8;
    const CALLS: u32 = 500;

    let runs = AtomicUsize::new(0);
    let memo = Memoized::wrap(square(&runs), bounded(10)).unwrap();
    let mut pool = Pool::new(THREADS);

    pool.scoped(|scope| {
        for t in 0..THREADS {
            let memo = &memo;
            scope.execute(move || {
                for i in 0..CALLS {
                    let n = i64::from((i * 7 + t) % 20);
                    assert_eq!(memo.call(&Args::new().arg(n)).unwrap(), n * n);
                }
            });
        }
    });

    let stats = memo.stats();
    assert_eq!(stats.hits + stats.misses, u64::from(THREADS * CALLS));
    assert_eq!(stats.misses, runs.load(Ordering::SeqCst) as u64);
    assert!(stats.current_size <= 10);
}

#[test]
fn test_hot_keys_stay_resident_under_contention() {
    let runs = AtomicUsize::new(0);
    let memo = Memoized::wrap(square(&runs), bounded(16)).unwrap();

    thread::scope(|s| {
        for _ in 0..4 {
            s.spawn(|| {
                for _ in 0..1_000 {
                    for n in 0..8 {
                        memo.call(&Args::new().arg(n)).unwrap();
                    }
                }
            });
        }
    });

    let stats = memo.stats();
    assert_eq!(stats.current_size, 8);
    assert_eq!(stats.hits + stats.misses, 32_000);
    // eight keys, at most one racing computation per thread per key
    assert!(runs.load(Ordering::SeqCst) <= 32);
}

#[test]
fn test_unbounded_cache_under_concurrency() {
    let runs = AtomicUsize::new(0);
    let memo = Memoized::wrap(
        square(&runs),
        MemoConfig {
            capacity: Capacity::Unbounded,
            ..MemoConfig::default()
        },
    )
    .unwrap();
    let mut pool = Pool::new(4);

    pool.scoped(|scope| {
        for t in 0..4i64 {
            let memo = &memo;
            scope.execute(move || {
                for n in (t * 250)..((t + 1) * 250) {
                    memo.call(&Args::new().arg(n)).unwrap();
                }
            });
        }
    });

    let stats = memo.stats();
    assert_eq!(stats.current_size, 1_000);
    assert_eq!((stats.hits, stats.misses), (0, 1_000));
}

// ============================================================================
// SEGMENT 2: LOCKING
// ============================================================================

#[test]
fn test_slow_computation_does_not_block_other_keys() {
    let started = Barrier::new(2);
    let release = Barrier::new(2);
    let memo = Memoized::wrap(
        |args: &Args| {
            let n = args.get(0).and_then(Arg::as_int).unwrap_or_default();
            if n == 1 {
                started.wait();
                release.wait();
            }
            Ok::<_, Infallible>(n + 100)
        },
        MemoConfig::default(),
    )
    .unwrap();

    thread::scope(|s| {
        let slow = s.spawn(|| memo.call(&Args::new().arg(1)).unwrap());

        started.wait();
        // key 1 is mid-computation; key 2 must not wait for it
        assert_eq!(memo.call(&Args::new().arg(2)).unwrap(), 102);
        assert_eq!(memo.stats().current_size, 1);
        release.wait();

        assert_eq!(slow.join().unwrap(), 101);
    });

    let stats = memo.stats();
    assert_eq!((stats.misses, stats.current_size), (2, 2));
}

#[test]
fn test_racing_computations_store_one_result() {
    const THREADS: usize = 4;
    let gate = Barrier::new(THREADS);
    let runs = AtomicUsize::new(0);
    let memo = Memoized::wrap(
        |_: &Args| {
            runs.fetch_add(1, Ordering::SeqCst);
            gate.wait();
            Ok::<_, Infallible>(42)
        },
        MemoConfig::default(),
    )
    .unwrap();

    thread::scope(|s| {
        for _ in 0..THREADS {
            s.spawn(|| {
                assert_eq!(memo.call_with_status(&Args::new().arg("k")).unwrap(), (42, false));
            });
        }
    });

    let stats = memo.stats();
    assert_eq!(runs.load(Ordering::SeqCst), THREADS);
    assert_eq!((stats.hits, stats.misses, stats.current_size), (0, THREADS as u64, 1));
}

// ============================================================================
// SEGMENT 3: INVALIDATION AND EXPIRY
// ============================================================================

#[test]
fn test_invalidate_during_calls() {
    let runs = AtomicUsize::new(0);
    let memo = Memoized::wrap(square(&runs), bounded(8)).unwrap();

    thread::scope(|s| {
        for _ in 0..4 {
            s.spawn(|| {
                for i in 0..2_000i64 {
                    let n = i % 12;
                    assert_eq!(memo.call(&Args::new().arg(n)).unwrap(), n * n);
                }
            });
        }
        s.spawn(|| {
            for _ in 0..50 {
                memo.invalidate();
                thread::yield_now();
            }
        });
    });

    let stats = memo.stats();
    assert!(stats.current_size <= 8);
    assert!(stats.hits + stats.misses <= 8_000);

    memo.invalidate();
    let stats = memo.stats();
    assert_eq!((stats.hits, stats.misses, stats.current_size), (0, 0, 0));
}

#[test]
fn test_concurrent_observers_see_one_expiry() {
    let clock = Arc::new(ManualClock::new());
    let runs = AtomicUsize::new(0);
    let memo = Memoized::wrap_with(
        square(&runs),
        MemoConfig::default().with_ttl_secs(10.0).unwrap(),
        Arc::new(LocalZone),
        clock.clone(),
    )
    .unwrap();

    for n in 0..5 {
        memo.call(&Args::new().arg(n)).unwrap();
    }
    clock.advance(Duration::from_secs(11));

    thread::scope(|s| {
        for _ in 0..8 {
            s.spawn(|| {
                assert_eq!(memo.stats().hits, 0);
            });
        }
    });

    assert_eq!(memo.expirations(), 1);
    assert_eq!(memo.stats().current_size, 0);
}

#[test]
fn test_real_clock_expiry_with_concurrent_callers() {
    let runs = AtomicUsize::new(0);
    let memo = Memoized::wrap_with(
        square(&runs),
        MemoConfig::default().with_ttl_secs(0.02).unwrap(),
        Arc::new(LocalZone),
        Arc::new(SystemClock),
    )
    .unwrap();

    thread::scope(|s| {
        for _ in 0..4 {
            s.spawn(|| {
                for i in 0..200i64 {
                    memo.call(&Args::new().arg(i % 5)).unwrap();
                    if i % 50 == 0 {
                        thread::sleep(Duration::from_millis(10));
                    }
                }
            });
        }
    });

    let stats = memo.stats();
    assert!(stats.current_size <= 5);
    assert!(stats.hits + stats.misses <= 800);
    // every thread sleeps 40ms in total, twice the ttl
    assert!(memo.expirations() >= 1);
}
