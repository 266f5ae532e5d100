//! Per-thread backoff state and the prediction rules that drive it.

use crate::config::BigLockConfig;
use crate::oracle::MissTimes;

/// Backoff state owned by one client thread.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ThreadTiming {
    /// Earliest clock time this thread may try the lock again; 0 means no delay.
    pub next_allowed_acquire_us: u64,
    /// Last plausible hold duration, reused when a fresh measurement is not.
    pub previous_hold_us: u64,
}

/// How long to sleep before attempting the lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SleepPlan {
    pub(crate) requested_us: u64,
    pub(crate) sleep_us: u64,
    pub(crate) clamped: bool,
}

impl ThreadTiming {
    /// The sleep owed before the next attempt at `now_us`, if any.
    pub(crate) fn plan_sleep(&self, now_us: u64, max_sleep_us: u64) -> Option<SleepPlan> {
        if self.next_allowed_acquire_us == 0 || now_us >= self.next_allowed_acquire_us {
            return None;
        }
        let requested_us = self.next_allowed_acquire_us - now_us;
        // Timestamps can be far off after a migration or frequency change.
        let clamped = requested_us > max_sleep_us;
        Some(SleepPlan {
            requested_us,
            sleep_us: requested_us.min(max_sleep_us),
            clamped,
        })
    }

    /// Schedules the next acquisition after a release that saw `waiters`
    /// blocked threads and produced `hold`.
    pub(crate) fn schedule_next(
        &mut self,
        now_us: u64,
        hold: HoldMeasurement,
        waiters: u64,
        min_backoff_us: u64,
    ) {
        self.next_allowed_acquire_us =
            next_acquire_time(now_us, hold.effective_us(), waiters, min_backoff_us);
    }
}

/// Result of estimating how long the lock was held.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum HoldMeasurement {
    /// Nobody was waiting; contention cost is irrelevant.
    Uncontended,
    /// The section never touched the disk-backed cache.
    NoMisses,
    /// A plausible estimate, now the thread's fallback value.
    Measured(u64),
    /// An implausible estimate, replaced by the previous plausible one.
    Fallback { rejected_us: u64, reused_us: u64 },
}

impl HoldMeasurement {
    pub(crate) fn effective_us(self) -> u64 {
        match self {
            HoldMeasurement::Uncontended | HoldMeasurement::NoMisses => 0,
            HoldMeasurement::Measured(us) => us,
            HoldMeasurement::Fallback { reused_us, .. } => reused_us,
        }
    }
}

/// Estimates the hold duration from the miss counters seen at acquire
/// (`start`) and at release (`end`), updating `timing`'s fallback value.
pub(crate) fn measure_hold(
    timing: &mut ThreadTiming,
    waiters: u64,
    start: MissTimes,
    end: MissTimes,
    config: &BigLockConfig,
) -> HoldMeasurement {
    if waiters == 0 {
        return HoldMeasurement::Uncontended;
    }
    let delta = end.since(start);
    if delta.count == 0 {
        return HoldMeasurement::NoMisses;
    }

    let candidate = if delta.time_us != 0 {
        delta.time_us
    } else {
        delta.count.saturating_mul(config.miss_cost_us)
    };

    if candidate < config.max_held_us {
        timing.previous_hold_us = candidate;
        HoldMeasurement::Measured(candidate)
    } else {
        HoldMeasurement::Fallback {
            rejected_us: candidate,
            reused_us: timing.previous_hold_us,
        }
    }
}

/// `now + held * waiters`, or 0 when no backoff is worth a sleep.
pub(crate) fn next_acquire_time(
    now_us: u64,
    held_us: u64,
    waiters: u64,
    min_backoff_us: u64,
) -> u64 {
    if waiters == 0 || held_us <= min_backoff_us {
        0
    } else {
        now_us.saturating_add(held_us.saturating_mul(waiters))
    }
}
