// ── Bare mutex protocol ──────────────────────────────────

use parking_lot::MutexGuard;

use crate::lock::BigLock;

/// Blocks until the mutex is ours. No sleeping, no per-thread state.
#[inline]
pub(crate) fn acquire(lock: &BigLock) -> MutexGuard<'_, ()> {
    lock.mutex.lock()
}
