use std::time::{Duration, Instant};

/// Time source for the adaptive timing model, in microseconds.
///
/// `now_micros` must be monotonic. Tests swap in a manual clock so sleeps
/// can be observed without actually sleeping.
pub trait Clock: Send + Sync {
    fn now_micros(&self) -> u64;

    fn sleep_micros(&self, micros: u64);
}

/// Wall-clock [`Clock`] backed by [`Instant`].
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    epoch: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    #[inline]
    fn now_micros(&self) -> u64 {
        self.epoch.elapsed().as_micros().min(u64::MAX as u128) as u64
    }

    fn sleep_micros(&self, micros: u64) {
        std::thread::sleep(Duration::from_micros(micros));
    }
}
