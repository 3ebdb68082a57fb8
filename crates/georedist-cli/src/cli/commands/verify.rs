//! `georedist verify` – compare local copies with the mirror, never download.

use anyhow::{bail, Result};
use georedist_core::checksum;
use georedist_core::config::UpdaterConfig;
use georedist_core::mirror::Mirror;

pub async fn run_verify(cfg: &UpdaterConfig) -> Result<()> {
    let mirror = Mirror::new(&cfg.mirror_url)?;
    match checksum::verify(&mirror, &cfg.dbs, &cfg.storage_dir).await {
        Ok(paths) => {
            for (db, path) in &paths {
                println!("{:<18} ok     {}", db, path.display());
            }
            Ok(())
        }
        Err(e) if e.is_integrity() => {
            println!("{}", e);
            bail!("local databases are out of date; run `georedist fetch`")
        }
        Err(e) => Err(e.into()),
    }
}
