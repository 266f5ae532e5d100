//! biglock - a process-wide admission lock with predictive backoff
//!
//! A single [`BigLock`] serializes every entry into a storage engine's public
//! API. On top of plain mutual exclusion it can run an adaptive timing model:
//!
//! - On release, the holder estimates how long it kept the lock from the
//!   cache-miss wait time it incurred (see [`MissTimeOracle`]), and how many
//!   threads were blocked behind it.
//! - Before its next acquisition, that same thread sleeps for roughly
//!   `held * waiters`, giving the threads it stalled a head start.
//!
//! The model is chosen once from [`BigLockConfig::adaptive_timing`]. With it
//! off, the lock is a bare mutex plus the acquire/release parity counter.
//!
//! ```
//! use std::sync::Arc;
//! use biglock::{BigLock, BigLockConfig, NoCacheMisses};
//!
//! let lock = BigLock::new(BigLockConfig::default(), Arc::new(NoCacheMisses));
//! let mut client = lock.client();
//! {
//!     let _guard = client.lock();
//!     // ... storage engine work ...
//! }
//! assert_eq!(lock.status().lock_toggle_counter, 2);
//! ```

mod clock;
mod config;
mod lock;
mod oracle;
pub mod processor;
mod status;
mod strategy;
mod timing;

pub use clock::{Clock, MonotonicClock};
pub use config::{BigLockConfig, ConfigError};
pub use lock::{BigLock, BigLockGuard, LockClient};
pub use oracle::{CacheMissCounters, MissTimeOracle, MissTimes, NoCacheMisses};
pub use status::LockStatus;
pub use timing::ThreadTiming;
