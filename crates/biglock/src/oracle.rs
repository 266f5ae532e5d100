//! Cache-miss accounting consumed by the adaptive timing model.
//!
//! The cache subsystem owns these counters; the lock only reads them, once
//! when a critical section starts and once when it ends.

use std::sync::atomic::{AtomicU64, Ordering};

/// Global cache-miss counters since process start.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MissTimes {
    pub count: u64,
    /// Microseconds spent waiting on those misses.
    pub time_us: u64,
}

impl MissTimes {
    pub const fn new(count: u64, time_us: u64) -> Self {
        Self { count, time_us }
    }

    /// Misses and wait time accumulated since `start`.
    #[inline]
    pub fn since(self, start: MissTimes) -> MissTimes {
        MissTimes {
            count: self.count.saturating_sub(start.count),
            time_us: self.time_us.saturating_sub(start.time_us),
        }
    }
}

/// Source of [`MissTimes`]. Both counters must be monotonically
/// non-decreasing, side-effect free, and safe to query from any thread.
pub trait MissTimeOracle: Send + Sync {
    fn miss_times(&self) -> MissTimes;
}

impl<F> MissTimeOracle for F
where
    F: Fn() -> MissTimes + Send + Sync,
{
    #[inline]
    fn miss_times(&self) -> MissTimes {
        self()
    }
}

/// Oracle for engines without a disk-backed cache: every hold looks free.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCacheMisses;

impl MissTimeOracle for NoCacheMisses {
    #[inline]
    fn miss_times(&self) -> MissTimes {
        MissTimes::default()
    }
}

/// Atomic miss counters a cache can bump as it services misses.
#[derive(Debug, Default)]
pub struct CacheMissCounters {
    count: AtomicU64,
    time_us: AtomicU64,
}

impl CacheMissCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one miss that blocked for `wait_us`.
    pub fn record_miss(&self, wait_us: u64) {
        self.count.fetch_add(1, Ordering::Relaxed);
        self.time_us.fetch_add(wait_us, Ordering::Relaxed);
    }

    /// Record misses whose wait time was not measured.
    pub fn record_untimed_misses(&self, misses: u64) {
        self.count.fetch_add(misses, Ordering::Relaxed);
    }
}

impl MissTimeOracle for CacheMissCounters {
    fn miss_times(&self) -> MissTimes {
        // Time first, so a concurrent reader never sees wait time without its miss.
        let time_us = self.time_us.load(Ordering::Relaxed);
        let count = self.count.load(Ordering::Relaxed);
        MissTimes { count, time_us }
    }
}
