//! Lifetime counters describing how the big lock behaves.
//!
//! Every field is updated with a relaxed atomic RMW from whichever thread
//! observes the event; nothing else guards them. A snapshot therefore reads
//! each field independently: individual fields never go backwards between
//! two snapshots taken by the same thread, but the fields of one snapshot
//! need not be mutually consistent. These numbers are for humans, never for
//! correctness decisions.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering::Relaxed};

use facet::Facet;

/// Point-in-time copy of the lock's status counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Facet)]
pub struct LockStatus {
    /// Bumped on every acquire and release: odd while held, even while free.
    pub lock_toggle_counter: u64,
    pub max_possible_sleep: u64,
    /// Descriptive only; 0 if unknown or if adaptive timing is off.
    pub processor_frequency_mhz: u64,
    pub max_requested_sleep_observed: u64,
    pub times_sleep_ceiling_applied: u64,
    pub total_sleep_events: u64,
    pub total_sleep_time_accumulated: u64,
    pub max_concurrent_waiters_observed: u64,
    pub total_waiter_events: u64,
    pub total_distinct_threads_seen: u64,
    pub hold_time_unavailable_events: u64,
    pub max_hold_time_observed: u64,
    pub total_hold_time_accumulated: u64,
}

impl fmt::Display for LockStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let held = self.lock_toggle_counter & 1 == 1;
        writeln!(
            f,
            "Big lock (toggles={}, {}):",
            self.lock_toggle_counter,
            if held { "held" } else { "free" }
        )?;
        writeln!(
            f,
            "  Sleeps: {} totaling {}us (max requested {}us, ceiling {}us hit {} times)",
            self.total_sleep_events,
            self.total_sleep_time_accumulated,
            self.max_requested_sleep_observed,
            self.max_possible_sleep,
            self.times_sleep_ceiling_applied
        )?;
        writeln!(
            f,
            "  Waiters: {} blocking acquisitions, max {} concurrent",
            self.total_waiter_events, self.max_concurrent_waiters_observed
        )?;
        writeln!(
            f,
            "  Holds: {}us total, max {}us, {} unmeasurable",
            self.total_hold_time_accumulated,
            self.max_hold_time_observed,
            self.hold_time_unavailable_events
        )?;
        write!(
            f,
            "  Clients: {} threads, cpu {} MHz",
            self.total_distinct_threads_seen, self.processor_frequency_mhz
        )
    }
}

/// The live, atomically updated counters behind [`LockStatus`].
#[derive(Debug, Default)]
pub(crate) struct StatusCounters {
    lock_toggle_counter: AtomicU64,
    max_possible_sleep: u64,
    processor_frequency_mhz: u64,
    max_requested_sleep_observed: AtomicU64,
    times_sleep_ceiling_applied: AtomicU64,
    total_sleep_events: AtomicU64,
    total_sleep_time_accumulated: AtomicU64,
    max_concurrent_waiters_observed: AtomicU64,
    total_waiter_events: AtomicU64,
    total_distinct_threads_seen: AtomicU64,
    hold_time_unavailable_events: AtomicU64,
    max_hold_time_observed: AtomicU64,
    total_hold_time_accumulated: AtomicU64,
}

impl StatusCounters {
    pub(crate) fn new(max_possible_sleep: u64, processor_frequency_mhz: u64) -> Self {
        Self {
            max_possible_sleep,
            processor_frequency_mhz,
            ..Self::default()
        }
    }

    /// Bumps the parity counter and returns its new value.
    #[inline]
    pub(crate) fn toggle(&self) -> u64 {
        self.lock_toggle_counter.fetch_add(1, Relaxed) + 1
    }

    #[inline]
    pub(crate) fn record_client(&self) {
        self.total_distinct_threads_seen.fetch_add(1, Relaxed);
    }

    #[inline]
    pub(crate) fn record_requested_sleep(&self, requested_us: u64) {
        self.max_requested_sleep_observed
            .fetch_max(requested_us, Relaxed);
    }

    pub(crate) fn record_sleep(&self, slept_us: u64, clamped: bool) {
        if clamped {
            self.times_sleep_ceiling_applied.fetch_add(1, Relaxed);
        }
        self.total_sleep_time_accumulated
            .fetch_add(slept_us, Relaxed);
        self.total_sleep_events.fetch_add(1, Relaxed);
    }

    #[inline]
    pub(crate) fn record_waiter(&self) {
        self.total_waiter_events.fetch_add(1, Relaxed);
    }

    #[inline]
    pub(crate) fn record_concurrent_waiters(&self, waiters: u64) {
        self.max_concurrent_waiters_observed
            .fetch_max(waiters, Relaxed);
    }

    #[inline]
    pub(crate) fn record_measured_hold(&self, held_us: u64) {
        self.max_hold_time_observed.fetch_max(held_us, Relaxed);
    }

    #[inline]
    pub(crate) fn record_unavailable_hold(&self) {
        self.hold_time_unavailable_events.fetch_add(1, Relaxed);
    }

    #[inline]
    pub(crate) fn record_hold_time(&self, held_us: u64) {
        self.total_hold_time_accumulated
            .fetch_add(held_us, Relaxed);
    }

    pub(crate) fn snapshot_into(&self, out: &mut LockStatus) {
        out.lock_toggle_counter = self.lock_toggle_counter.load(Relaxed);
        out.max_possible_sleep = self.max_possible_sleep;
        out.processor_frequency_mhz = self.processor_frequency_mhz;
        out.max_requested_sleep_observed = self.max_requested_sleep_observed.load(Relaxed);
        out.times_sleep_ceiling_applied = self.times_sleep_ceiling_applied.load(Relaxed);
        out.total_sleep_events = self.total_sleep_events.load(Relaxed);
        out.total_sleep_time_accumulated = self.total_sleep_time_accumulated.load(Relaxed);
        out.max_concurrent_waiters_observed = self.max_concurrent_waiters_observed.load(Relaxed);
        out.total_waiter_events = self.total_waiter_events.load(Relaxed);
        out.total_distinct_threads_seen = self.total_distinct_threads_seen.load(Relaxed);
        out.hold_time_unavailable_events = self.hold_time_unavailable_events.load(Relaxed);
        out.max_hold_time_observed = self.max_hold_time_observed.load(Relaxed);
        out.total_hold_time_accumulated = self.total_hold_time_accumulated.load(Relaxed);
    }
}
