//! Lifecycle events broadcast by the updater.

use crate::db::DbPaths;

/// Where a reported failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureSource {
    /// A timer-driven check or download.
    Updater,
    /// A reader handle could not rebuild its reader after an update.
    Reader,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateEvent {
    /// A checksum comparison started.
    Checking,
    /// Local copies are stale or missing; a download started.
    Downloading,
    /// Local copies match the mirror.
    CheckOk(DbPaths),
    /// Fresh copies were downloaded, published and re-verified.
    Updated(DbPaths),
    /// The checksum comparison finished, whatever its outcome.
    DoneChecking,
    /// Background work failed. Foreground callers get the error directly instead.
    Failed {
        source: FailureSource,
        message: String,
    },
}

/// Result of `check_for_updates` and `update`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckOutcome {
    /// The same operation was already running; nothing was done.
    InFlight,
    /// Local copies already matched the mirror.
    UpToDate(DbPaths),
    /// Fresh copies were downloaded and verified.
    Updated(DbPaths),
}

impl CheckOutcome {
    /// Verified paths, unless the call was skipped.
    pub fn paths(&self) -> Option<&DbPaths> {
        match self {
            CheckOutcome::InFlight => None,
            CheckOutcome::UpToDate(p) | CheckOutcome::Updated(p) => Some(p),
        }
    }
}
