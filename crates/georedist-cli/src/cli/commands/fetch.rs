//! `georedist fetch` – one-shot verify-or-download.

use anyhow::Result;
use georedist_core::config::UpdaterConfig;
use georedist_core::download_dbs;

pub async fn run_fetch(cfg: &UpdaterConfig) -> Result<()> {
    tracing::info!(dir = %cfg.storage_dir.display(), mirror = %cfg.mirror_url, "fetching databases");
    let paths = download_dbs(cfg).await?;
    for (db, path) in &paths {
        println!("{:<18} {}", db, path.display());
    }
    Ok(())
}
