//! Error taxonomy for checks, downloads and reader rebuilds.

use crate::db::DbName;
use std::io;
use std::path::PathBuf;

/// Local copy is stale or absent. The only class that triggers a download.
#[derive(Debug, thiserror::Error)]
pub enum IntegrityError {
    #[error("checksum mismatch for {db}: mirror has {expected}, local copy is {actual}")]
    Mismatch {
        db: DbName,
        expected: String,
        actual: String,
    },
    #[error("local copy of {db} not found at {}", path.display())]
    Missing { db: DbName, path: PathBuf },
}

/// Error returned by the checksum store, the downloader, the updater and reader handles.
#[derive(Debug, thiserror::Error)]
pub enum UpdateError {
    /// Transport failure, non-2xx status, or a malformed digest response.
    #[error("network error for {url}: {reason}")]
    Network { url: String, reason: String },

    #[error(transparent)]
    Integrity(#[from] IntegrityError),

    /// The archive is corrupt or lacks the expected entry.
    #[error("archive for {db} unusable: {reason}")]
    Archive { db: DbName, reason: String },

    #[error("filesystem error at {}: {source}", path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The caller's reader factory failed.
    #[error("reader factory failed for {}: {cause:#}", path.display())]
    Factory { path: PathBuf, cause: anyhow::Error },
}

impl UpdateError {
    pub(crate) fn network(url: &str, reason: impl ToString) -> Self {
        UpdateError::Network {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn filesystem(path: impl Into<PathBuf>, source: io::Error) -> Self {
        UpdateError::Filesystem {
            path: path.into(),
            source,
        }
    }

    /// True for a stale or missing local copy, which a fresh download can fix.
    pub fn is_integrity(&self) -> bool {
        matches!(self, UpdateError::Integrity(_))
    }
}
