mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;

use biglock::{BigLock, BigLockConfig, CacheMissCounters, NoCacheMisses};
use common::monotonic_fields;

const THREADS: usize = 8;
const ITERATIONS: usize = 200;

/// Runs `THREADS` workers through the lock, asserting exclusion inside.
fn hammer(lock: &BigLock, misses: &CacheMissCounters) {
    let inside = AtomicUsize::new(0);
    thread::scope(|s| {
        for worker in 0..THREADS {
            let inside = &inside;
            s.spawn(move || {
                let mut client = lock.client();
                for i in 0..ITERATIONS {
                    let _guard = client.lock();
                    let now_inside = inside.fetch_add(1, Ordering::SeqCst) + 1;
                    assert_eq!(now_inside, 1, "two threads inside the big lock");
                    if (i + worker) % 7 == 0 {
                        misses.record_miss(150);
                    }
                    thread::yield_now();
                    inside.fetch_sub(1, Ordering::SeqCst);
                }
            });
        }
    });
}

fn small_sleep_config() -> BigLockConfig {
    BigLockConfig::adaptive()
        .with_max_sleep_us(2_000)
        .with_min_backoff_us(100)
}

#[test]
fn adaptive_lock_is_mutually_exclusive() {
    let misses = Arc::new(CacheMissCounters::new());
    let lock = BigLock::new(small_sleep_config(), misses.clone());

    hammer(&lock, &misses);

    let status = lock.status();
    assert_eq!(status.lock_toggle_counter, (2 * THREADS * ITERATIONS) as u64);
    assert_eq!(status.total_distinct_threads_seen, THREADS as u64);
    assert_eq!(lock.waiters(), 0);
    assert!(status.total_sleep_time_accumulated <= status.total_sleep_events * 2_000);
    assert!(status.max_concurrent_waiters_observed < THREADS as u64);
}

#[test]
fn plain_lock_is_mutually_exclusive() {
    let misses = Arc::new(CacheMissCounters::new());
    let lock = BigLock::new(BigLockConfig::plain(), misses.clone());

    hammer(&lock, &misses);

    let status = lock.status();
    assert_eq!(status.lock_toggle_counter, (2 * THREADS * ITERATIONS) as u64);
    // The plain strategy keeps only the parity counter.
    assert_eq!(status.total_distinct_threads_seen, 0);
    assert_eq!(status.total_waiter_events, 0);
    assert_eq!(status.total_sleep_events, 0);
    assert_eq!(lock.waiters(), 0);
}

#[test]
fn status_snapshots_are_monotonic_under_load() {
    let misses = Arc::new(CacheMissCounters::new());
    let lock = BigLock::new(small_sleep_config(), misses.clone());
    let done = AtomicBool::new(false);

    thread::scope(|s| {
        let reader = s.spawn(|| {
            let mut previous = lock.status();
            let mut snapshots = 0usize;
            while !done.load(Ordering::Acquire) {
                let current = lock.status();
                for ((name, before), (_, after)) in monotonic_fields(&previous)
                    .into_iter()
                    .zip(monotonic_fields(&current))
                {
                    assert!(after >= before, "{name} went backwards: {before} -> {after}");
                }
                assert!(lock.waiters() <= THREADS as u64);
                previous = current;
                snapshots += 1;
            }
            snapshots
        });

        hammer(&lock, &misses);
        done.store(true, Ordering::Release);
        let snapshots = reader.join().expect("status reader panicked");
        assert!(snapshots > 0);
    });

    assert_eq!(lock.waiters(), 0);
}

#[test]
fn lock_can_be_shared_through_an_arc() {
    let lock = Arc::new(BigLock::new(BigLockConfig::adaptive(), Arc::new(NoCacheMisses)));
    let counter = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let lock = Arc::clone(&lock);
            let counter = Arc::clone(&counter);
            thread::spawn(move || {
                let mut client = lock.client();
                for _ in 0..50 {
                    let _guard = client.lock();
                    counter.fetch_add(1, Ordering::Relaxed);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("worker panicked");
    }

    assert_eq!(counter.load(Ordering::Relaxed), 200);
    let lock = Arc::try_unwrap(lock).expect("all workers finished");
    assert_eq!(lock.status().total_distinct_threads_seen, 4);
    lock.destroy();
}
