//! Checksum command: compute SHA-384 of a file.

use anyhow::{Context, Result};
use georedist_core::checksum;
use std::path::{Path, PathBuf};

/// Compute and print SHA-384 of the given file.
pub async fn run_checksum(path: &Path) -> Result<()> {
    let owned: PathBuf = path.to_path_buf();
    let digest = tokio::task::spawn_blocking(move || checksum::sha384_path(&owned))
        .await?
        .with_context(|| format!("hash {}", path.display()))?;
    println!("{}  {}", digest, path.display());
    Ok(())
}
