#![allow(dead_code)]

use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;

use biglock::{BigLock, Clock, LockClient, LockStatus};
use parking_lot::Mutex;

/// Clock that only moves when someone sleeps on it.
#[derive(Debug)]
pub struct ManualClock {
    now: AtomicU64,
    sleeps: Mutex<Vec<u64>>,
}

impl ManualClock {
    pub fn starting_at(now_us: u64) -> Self {
        Self {
            now: AtomicU64::new(now_us),
            sleeps: Mutex::new(Vec::new()),
        }
    }

    pub fn sleeps(&self) -> Vec<u64> {
        self.sleeps.lock().clone()
    }
}

impl Clock for ManualClock {
    fn now_micros(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }

    fn sleep_micros(&self, micros: u64) {
        self.sleeps.lock().push(micros);
        self.now.fetch_add(micros, Ordering::SeqCst);
    }
}

/// Takes the lock through `client`, waits until one other thread is blocked
/// on it, runs `during_hold`, then releases and lets the blocked thread through.
pub fn hold_with_one_waiter(lock: &BigLock, client: &mut LockClient<'_>, during_hold: impl FnOnce()) {
    thread::scope(|s| {
        let guard = client.lock();
        let blocked = s.spawn(|| {
            let mut other = lock.client();
            drop(other.lock());
        });
        while lock.waiters() != 1 {
            thread::yield_now();
        }
        during_hold();
        guard.unlock();
        blocked.join().expect("blocked thread panicked");
    });
}

/// Every status field that must never decrease.
pub fn monotonic_fields(status: &LockStatus) -> [(&'static str, u64); 11] {
    [
        ("lock_toggle_counter", status.lock_toggle_counter),
        ("max_requested_sleep_observed", status.max_requested_sleep_observed),
        ("times_sleep_ceiling_applied", status.times_sleep_ceiling_applied),
        ("total_sleep_events", status.total_sleep_events),
        ("total_sleep_time_accumulated", status.total_sleep_time_accumulated),
        ("max_concurrent_waiters_observed", status.max_concurrent_waiters_observed),
        ("total_waiter_events", status.total_waiter_events),
        ("total_distinct_threads_seen", status.total_distinct_threads_seen),
        ("hold_time_unavailable_events", status.hold_time_unavailable_events),
        ("max_hold_time_observed", status.max_hold_time_observed),
        ("total_hold_time_accumulated", status.total_hold_time_accumulated),
    ]
}
