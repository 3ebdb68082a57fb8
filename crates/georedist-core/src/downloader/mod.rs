//! Database downloader.
//!
//! Fetches each database's `.tar.gz` from the mirror into a staging directory
//! next to the storage dir, extracts the one `.mmdb` entry, then publishes it
//! with a single `rename` over the canonical path. Readers of the canonical
//! path therefore see either the old file or the new one, never a partial
//! write. All databases download concurrently; the first failure aborts the
//! rest of the batch.

mod extract;

use crate::config::staging_dir_for;
use crate::db::{DbName, DbPaths};
use crate::error::UpdateError;
use crate::mirror::{self, Mirror};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinSet;

/// Remove the staging directory and everything in it. A missing directory is fine.
pub async fn cleanup_staging_dir(staging: &Path) -> Result<(), UpdateError> {
    match tokio::fs::remove_dir_all(staging).await {
        Ok(()) => {
            tracing::debug!(path = %staging.display(), "removed staging dir");
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(UpdateError::filesystem(staging, e)),
    }
}

/// Blocking variant for constructors that run outside the runtime.
pub fn cleanup_staging_dir_blocking(staging: &Path) -> Result<(), UpdateError> {
    match std::fs::remove_dir_all(staging) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(UpdateError::filesystem(staging, e)),
    }
}

/// Download `dbs` from `mirror` and publish them under `storage_dir`.
/// Returns the canonical path of every published database.
pub async fn download(
    mirror: &Mirror,
    dbs: &[DbName],
    storage_dir: &Path,
) -> Result<DbPaths, UpdateError> {
    let staging = staging_dir_for(storage_dir);
    cleanup_staging_dir(&staging).await?;

    let result = download_into(mirror, dbs, storage_dir, &staging).await;

    if let Err(e) = cleanup_staging_dir(&staging).await {
        tracing::warn!("{}", e);
    }
    result
}

async fn download_into(
    mirror: &Mirror,
    dbs: &[DbName],
    storage_dir: &Path,
    staging: &Path,
) -> Result<DbPaths, UpdateError> {
    for dir in [storage_dir, staging] {
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| UpdateError::filesystem(dir, e))?;
    }

    let abort = Arc::new(AtomicBool::new(false));
    let mut set = JoinSet::new();
    for &db in dbs {
        let url = mirror.archive_url(db)?;
        let staging = staging.to_path_buf();
        let storage_dir = storage_dir.to_path_buf();
        let abort = Arc::clone(&abort);
        set.spawn_blocking(move || {
            let res = download_one(&url, db, &staging, &storage_dir, &abort);
            (db, res)
        });
    }

    let mut paths = DbPaths::new();
    let mut first_error: Option<UpdateError> = None;
    while let Some(joined) = set.join_next().await {
        let res = match joined {
            Ok((db, res)) => res.map(|p| (db, p)),
            Err(e) => Err(UpdateError::filesystem(
                staging,
                io::Error::new(io::ErrorKind::Other, format!("download worker panicked: {}", e)),
            )),
        };
        match res {
            Ok((db, path)) => {
                paths.insert(db, path);
            }
            Err(e) => {
                abort.store(true, Ordering::Relaxed);
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(paths),
    }
}

/// Fetch, extract and publish one database. Runs on the blocking pool.
fn download_one(
    url: &str,
    db: DbName,
    staging: &Path,
    storage_dir: &Path,
    abort: &AtomicBool,
) -> Result<PathBuf, UpdateError> {
    let archive = staging.join(db.archive_resource());
    let bytes = mirror::fetch_to_file(url, &archive, abort)?;
    tracing::debug!(db = %db, bytes, "fetched archive");

    let staged = staging.join(db.file_name());
    extract::extract_db(&archive, db, &staged)?;

    if abort.load(Ordering::Relaxed) {
        return Err(UpdateError::network(url, "aborted: another download in the batch failed"));
    }

    let canonical = db.path_in(storage_dir);
    std::fs::rename(&staged, &canonical).map_err(|e| UpdateError::filesystem(&canonical, e))?;
    tracing::info!(db = %db, path = %canonical.display(), "published database");
    Ok(canonical)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cleanup_tolerates_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let staging = dir.path().join("dbs.geodownload");
        cleanup_staging_dir(&staging).await.unwrap();
        cleanup_staging_dir_blocking(&staging).unwrap();
    }

    #[tokio::test]
    async fn cleanup_removes_leftovers() {
        let dir = tempfile::tempdir().unwrap();
        let staging = dir.path().join("dbs.geodownload");
        std::fs::create_dir_all(staging.join("nested")).unwrap();
        std::fs::write(staging.join("GeoLite2-ASN.mmdb"), b"half").unwrap();
        cleanup_staging_dir(&staging).await.unwrap();
        assert!(!staging.exists());
    }

    #[tokio::test]
    async fn unreachable_mirror_fails_and_leaves_no_staging() {
        let dir = tempfile::tempdir().unwrap();
        let storage = dir.path().join("dbs");
        // Port 9 (discard) is not listening on the loopback interface.
        let mirror = Mirror::new("http://127.0.0.1:9/").unwrap();
        let err = download(&mirror, &[DbName::Asn], &storage).await.unwrap_err();
        assert!(matches!(err, UpdateError::Network { .. }));
        assert!(storage.exists());
        assert!(!staging_dir_for(&storage).exists());
        assert!(!DbName::Asn.path_in(&storage).exists());
    }
}
