//! The big lock itself, its per-thread client handle, and its guard.

use std::mem::ManuallyDrop;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{Mutex, MutexGuard};
use tracing::info;

use crate::clock::{Clock, MonotonicClock};
use crate::config::BigLockConfig;
use crate::oracle::{MissTimeOracle, MissTimes};
use crate::processor;
use crate::status::{LockStatus, StatusCounters};
use crate::strategy::{Strategy, adaptive, plain};
use crate::timing::ThreadTiming;

// ── BigLock ──────────────────────────────────────────────

/// Process-wide admission lock for a storage engine.
///
/// Construct one at subsystem start and share it by reference (or `Arc`).
/// Each worker thread takes a [`LockClient`] from it and acquires through
/// that handle. Dropping the lock (or calling [`destroy`](Self::destroy))
/// tears it down; the borrow checker guarantees no client outlives it.
pub struct BigLock {
    pub(crate) mutex: Mutex<()>,
    /// Threads blocked in the mutex right now. Threads sleeping off a
    /// backoff are not counted.
    pub(crate) waiters: AtomicU64,
    pub(crate) status: StatusCounters,
    pub(crate) config: BigLockConfig,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) oracle: Arc<dyn MissTimeOracle>,
    strategy: Strategy,
}

impl BigLock {
    /// Creates the lock, timing with a [`MonotonicClock`].
    pub fn new(config: BigLockConfig, oracle: Arc<dyn MissTimeOracle>) -> Self {
        Self::with_clock(config, oracle, Arc::new(MonotonicClock::new()))
    }

    pub fn with_clock(
        config: BigLockConfig,
        oracle: Arc<dyn MissTimeOracle>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let strategy = Strategy::for_config(&config);
        let processor_frequency_mhz = match strategy {
            Strategy::Adaptive => processor::frequency_mhz().unwrap_or(0),
            Strategy::Plain => 0,
        };
        info!(
            %strategy,
            max_sleep_us = config.max_sleep_us,
            max_held_us = config.max_held_us,
            processor_frequency_mhz,
            "big lock initialized"
        );
        Self {
            mutex: Mutex::new(()),
            waiters: AtomicU64::new(0),
            status: StatusCounters::new(config.max_sleep_us, processor_frequency_mhz),
            config,
            clock,
            oracle,
            strategy,
        }
    }

    /// A fresh per-thread handle. Keep one per worker thread for its lifetime:
    /// the backoff model learns from that thread's previous holds.
    pub fn client(&self) -> LockClient<'_> {
        LockClient {
            lock: self,
            timing: None,
        }
    }

    /// Copies the current status counters into `out`.
    ///
    /// Never blocks. Fields are read one by one while other threads keep
    /// updating them, so cross-field consistency is not guaranteed.
    pub fn get_status(&self, out: &mut LockStatus) {
        self.status.snapshot_into(out);
    }

    pub fn status(&self) -> LockStatus {
        let mut out = LockStatus::default();
        self.get_status(&mut out);
        out
    }

    /// Threads currently blocked on the mutex.
    pub fn waiters(&self) -> u64 {
        self.waiters.load(Ordering::Acquire)
    }

    pub fn config(&self) -> &BigLockConfig {
        &self.config
    }

    pub fn is_adaptive(&self) -> bool {
        self.strategy == Strategy::Adaptive
    }

    /// Tears the lock down. Equivalent to dropping it.
    pub fn destroy(self) {
        drop(self);
    }
}

impl Drop for BigLock {
    fn drop(&mut self) {
        debug_assert_eq!(
            self.waiters.load(Ordering::Relaxed),
            0,
            "big lock destroyed with waiters"
        );
        let status = self.status();
        info!(
            toggles = status.lock_toggle_counter,
            clients = status.total_distinct_threads_seen,
            sleeps = status.total_sleep_events,
            waiter_events = status.total_waiter_events,
            "big lock destroyed"
        );
    }
}

impl std::fmt::Debug for BigLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BigLock")
            .field("strategy", &self.strategy)
            .field("locked", &self.mutex.is_locked())
            .field("waiters", &self.waiters())
            .field("config", &self.config)
            .finish()
    }
}

// ── LockClient ───────────────────────────────────────────

/// One thread's entry point into a [`BigLock`].
///
/// Owns that thread's backoff state; nothing else reads or writes it.
/// Dropping the client discards the state.
#[derive(Debug)]
pub struct LockClient<'a> {
    lock: &'a BigLock,
    /// Created on the first adaptive acquisition.
    timing: Option<ThreadTiming>,
}

impl<'a> LockClient<'a> {
    /// Blocks until this thread exclusively holds the big lock.
    ///
    /// With adaptive timing, first sleeps off whatever backoff the previous
    /// release scheduled for this thread (bounded by `max_sleep_us`).
    pub fn lock(&mut self) -> BigLockGuard<'_, 'a> {
        let lock = self.lock;
        let (guard, start) = match lock.strategy {
            Strategy::Plain => (plain::acquire(lock), None),
            Strategy::Adaptive => {
                let (guard, start) = adaptive::acquire(lock, &mut self.timing);
                (guard, Some(start))
            }
        };

        let toggles = lock.status.toggle();
        debug_assert_eq!(toggles & 1, 1, "big lock acquire/release calls mis-paired");

        BigLockGuard {
            client: self,
            guard: ManuallyDrop::new(guard),
            start,
        }
    }

    /// This thread's backoff state, if it has acquired adaptively before.
    pub fn timing(&self) -> Option<ThreadTiming> {
        self.timing
    }

    pub fn big_lock(&self) -> &'a BigLock {
        self.lock
    }
}

// ── BigLockGuard ─────────────────────────────────────────

/// Proof that the big lock is held. Dropping it releases the lock.
pub struct BigLockGuard<'c, 'a> {
    client: &'c mut LockClient<'a>,
    guard: ManuallyDrop<MutexGuard<'a, ()>>,
    /// Miss counters at acquisition; `None` under the plain strategy.
    start: Option<MissTimes>,
}

impl BigLockGuard<'_, '_> {
    /// Releases the lock. Equivalent to dropping the guard.
    pub fn unlock(self) {
        drop(self);
    }
}

impl Drop for BigLockGuard<'_, '_> {
    fn drop(&mut self) {
        let lock = self.client.lock;
        let toggles = lock.status.toggle();
        debug_assert_eq!(toggles & 1, 0, "big lock acquire/release calls mis-paired");

        let Some(start) = self.start else {
            unsafe { ManuallyDrop::drop(&mut self.guard) };
            return;
        };

        let timing = self.client.timing.get_or_insert_with(ThreadTiming::default);
        let (waiters, hold) = adaptive::measure_release(lock, timing, start);
        // Release the mutex before scheduling; the backoff only concerns our next attempt.
        unsafe { ManuallyDrop::drop(&mut self.guard) };
        adaptive::schedule_next(lock, timing, waiters, hold);
    }
}

impl std::fmt::Debug for BigLockGuard<'_, '_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BigLockGuard")
            .field("start", &self.start)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::NoCacheMisses;

    #[test]
    fn plain_lock_keeps_no_thread_state() {
        let lock = BigLock::new(BigLockConfig::plain(), Arc::new(NoCacheMisses));
        assert!(!lock.is_adaptive());

        let mut client = lock.client();
        for _ in 0..3 {
            let _guard = client.lock();
        }
        assert_eq!(client.timing(), None);

        let status = lock.status();
        assert_eq!(status.lock_toggle_counter, 6);
        assert_eq!(status.total_distinct_threads_seen, 0);
        assert_eq!(status.processor_frequency_mhz, 0);
    }

    #[test]
    fn parity_tracks_held_state() {
        for config in [BigLockConfig::plain(), BigLockConfig::adaptive()] {
            let lock = BigLock::new(config, Arc::new(NoCacheMisses));
            let mut client = lock.client();
            for _ in 0..4 {
                let guard = client.lock();
                assert_eq!(lock.status().lock_toggle_counter & 1, 1);
                guard.unlock();
                assert_eq!(lock.status().lock_toggle_counter & 1, 0);
            }
        }
    }

    #[test]
    fn adaptive_client_registers_once() {
        let lock = BigLock::new(BigLockConfig::adaptive(), Arc::new(NoCacheMisses));
        let mut client = lock.client();
        assert_eq!(client.timing(), None);

        drop(client.lock());
        drop(client.lock());
        assert_eq!(client.timing(), Some(ThreadTiming::default()));
        assert_eq!(lock.status().total_distinct_threads_seen, 1);

        let mut other = lock.client();
        drop(other.lock());
        assert_eq!(lock.status().total_distinct_threads_seen, 2);
    }

    #[test]
    fn get_status_overwrites_destination() {
        let lock = BigLock::new(BigLockConfig::adaptive(), Arc::new(NoCacheMisses));
        let mut out = LockStatus {
            total_sleep_events: 99,
            ..LockStatus::default()
        };
        lock.get_status(&mut out);
        assert_eq!(out.total_sleep_events, 0);
        assert_eq!(out.max_possible_sleep, lock.config().max_sleep_us);
    }

    #[test]
    fn debug_shows_lock_state() {
        let lock = BigLock::new(BigLockConfig::plain(), Arc::new(NoCacheMisses));
        let mut client = lock.client();
        let guard = client.lock();
        let text = format!("{lock:?}");
        assert!(text.contains("locked: true"), "{text}");
        guard.unlock();
        lock.destroy();
    }
}
