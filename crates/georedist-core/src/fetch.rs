//! One-shot fetch: make sure verified copies exist locally, then return.
//!
//! Used at install time or from the CLI, without starting a background updater.

use crate::checksum;
use crate::config::UpdaterConfig;
use crate::db::DbPaths;
use crate::downloader;
use crate::error::UpdateError;
use crate::mirror::Mirror;

/// Verify the local copies of `config.dbs`; download them if stale or missing.
///
/// A freshly downloaded copy is verified once more, and a second integrity
/// failure is returned rather than retried.
pub async fn download_dbs(config: &UpdaterConfig) -> Result<DbPaths, UpdateError> {
    let mirror = Mirror::new(&config.mirror_url)?;
    match checksum::verify(&mirror, &config.dbs, &config.storage_dir).await {
        Ok(paths) => {
            tracing::info!(dir = %config.storage_dir.display(), "databases already up to date");
            Ok(paths)
        }
        Err(e) if e.is_integrity() => {
            tracing::info!("{}; downloading", e);
            let paths = downloader::download(&mirror, &config.dbs, &config.storage_dir).await?;
            checksum::verify(&mirror, &config.dbs, &config.storage_dir).await?;
            Ok(paths)
        }
        Err(e) => Err(e),
    }
}
