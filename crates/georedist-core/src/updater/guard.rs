//! RAII single-flight guard over an atomic busy flag.

use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Notify;

/// Holds `flag` set for its lifetime; clears it when dropped.
pub(crate) struct FlightGuard<'a> {
    flag: &'a AtomicBool,
    released: Option<&'a Notify>,
}

impl<'a> FlightGuard<'a> {
    /// Set `flag` if it is clear. Returns None when another holder is active.
    pub(crate) fn try_acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| FlightGuard {
                flag,
                released: None,
            })
    }

    /// Like `try_acquire`, and wakes every task waiting on `released` once the flag clears.
    pub(crate) fn try_acquire_notifying(
        flag: &'a AtomicBool,
        released: &'a Notify,
    ) -> Option<Self> {
        let mut guard = Self::try_acquire(flag)?;
        guard.released = Some(released);
        Some(guard)
    }
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
        if let Some(released) = self.released {
            released.notify_waiters();
        }
    }
}
