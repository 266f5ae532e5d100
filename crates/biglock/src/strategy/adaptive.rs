// ── Predictive backoff protocol ──────────────────────────

use std::sync::atomic::Ordering;

use parking_lot::MutexGuard;
use tracing::{debug, trace};

use crate::lock::BigLock;
use crate::oracle::MissTimes;
use crate::timing::{self, HoldMeasurement, ThreadTiming};

/// Sleeps off any backoff owed by this thread, takes the mutex, and returns
/// the miss counters at the start of the critical section.
pub(crate) fn acquire<'a>(
    lock: &'a BigLock,
    slot: &mut Option<ThreadTiming>,
) -> (MutexGuard<'a, ()>, MissTimes) {
    if slot.is_none() {
        lock.status.record_client();
    }
    let timing = slot.get_or_insert_with(ThreadTiming::default);

    let mut requested_us = 0;
    if let Some(plan) = timing.plan_sleep(lock.clock.now_micros(), lock.config.max_sleep_us) {
        requested_us = plan.requested_us;
        if plan.clamped {
            debug!(
                requested_us = plan.requested_us,
                ceiling_us = plan.sleep_us,
                "predicted backoff exceeds the sleep ceiling"
            );
        }
        lock.status.record_sleep(plan.sleep_us, plan.clamped);
        trace!(sleep_us = plan.sleep_us, "backing off before acquiring big lock");
        lock.clock.sleep_micros(plan.sleep_us);
    }

    let guard = match lock.mutex.try_lock() {
        Some(guard) => guard,
        None => {
            lock.waiters.fetch_add(1, Ordering::AcqRel);
            lock.status.record_waiter();
            trace!("big lock busy, blocking");
            let guard = lock.mutex.lock();
            lock.waiters.fetch_sub(1, Ordering::AcqRel);
            guard
        }
    };

    lock.status.record_requested_sleep(requested_us);
    (guard, lock.oracle.miss_times())
}

/// Measures the critical section that started at `start`. Runs while the
/// mutex is still held; returns the waiter count it was judged against.
pub(crate) fn measure_release(
    lock: &BigLock,
    timing: &mut ThreadTiming,
    start: MissTimes,
) -> (u64, HoldMeasurement) {
    let waiters = lock.waiters.load(Ordering::Acquire);
    if waiters == 0 {
        return (0, HoldMeasurement::Uncontended);
    }

    let end = lock.oracle.miss_times();
    let hold = timing::measure_hold(timing, waiters, start, end, &lock.config);
    match hold {
        HoldMeasurement::Uncontended | HoldMeasurement::NoMisses => {}
        HoldMeasurement::Measured(held_us) => {
            lock.status.record_measured_hold(held_us);
            lock.status.record_hold_time(held_us);
            lock.status.record_concurrent_waiters(waiters);
        }
        HoldMeasurement::Fallback {
            rejected_us,
            reused_us,
        } => {
            // Most likely a migration or frequency change mid-section.
            debug!(
                rejected_us,
                reused_us, "discarding implausible big lock hold time"
            );
            lock.status.record_unavailable_hold();
            lock.status.record_hold_time(reused_us);
            lock.status.record_concurrent_waiters(waiters);
        }
    }
    (waiters, hold)
}

/// Sets this thread's next allowed acquisition time. Runs after the mutex
/// has been released.
pub(crate) fn schedule_next(
    lock: &BigLock,
    timing: &mut ThreadTiming,
    waiters: u64,
    hold: HoldMeasurement,
) {
    timing.schedule_next(
        lock.clock.now_micros(),
        hold,
        waiters,
        lock.config.min_backoff_us,
    );
    if timing.next_allowed_acquire_us != 0 {
        trace!(
            waiters,
            held_us = hold.effective_us(),
            next_allowed_acquire_us = timing.next_allowed_acquire_us,
            "scheduled big lock backoff"
        );
    }
}
