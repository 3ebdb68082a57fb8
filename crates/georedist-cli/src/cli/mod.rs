//! CLI for the georedist database mirror.

mod commands;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use georedist_core::config::{self, UpdaterConfig};
use georedist_core::DbName;
use std::path::{Path, PathBuf};

use commands::{run_checksum, run_fetch, run_verify, run_watch};

/// Top-level CLI for georedist.
#[derive(Debug, Parser)]
#[command(name = "georedist")]
#[command(about = "Keep a local mirror of GeoLite2 databases up to date", long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub overrides: Overrides,

    #[command(subcommand)]
    pub command: CliCommand,
}

/// Settings that take precedence over the config file.
#[derive(Debug, Default, Args)]
pub struct Overrides {
    /// Storage directory for the `.mmdb` files.
    #[arg(long, global = true, value_name = "DIR")]
    pub dir: Option<PathBuf>,

    /// Database to manage (asn, country, city). Repeat for several; defaults to the config file's list.
    #[arg(long = "db", global = true, value_name = "NAME")]
    pub dbs: Vec<DbName>,

    /// Base URL of the redistribution mirror.
    #[arg(long, global = true, value_name = "URL")]
    pub mirror: Option<String>,
}

impl Overrides {
    fn apply(&self, mut cfg: UpdaterConfig) -> UpdaterConfig {
        if let Some(dir) = &self.dir {
            cfg.storage_dir = dir.clone();
        }
        if !self.dbs.is_empty() {
            cfg.dbs = self.dbs.clone();
        }
        if let Some(mirror) = &self.mirror {
            cfg = cfg.with_mirror_url(mirror.clone());
        }
        cfg
    }
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Download any database whose local copy is missing or stale, then exit.
    Fetch,

    /// Compare local copies against the mirror's digests without downloading.
    Verify,

    /// Compute SHA-384 of a file, in the mirror's digest format.
    Checksum {
        /// Path to the file.
        path: String,
    },

    /// Keep the databases up to date in the foreground until interrupted.
    Watch {
        /// Hours between checks (overrides the config file).
        #[arg(long, value_name = "HOURS")]
        period_hours: Option<u64>,
    },
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();

        match cli.command {
            CliCommand::Fetch => run_fetch(&resolve_config(&cli.overrides)?).await?,
            CliCommand::Verify => run_verify(&resolve_config(&cli.overrides)?).await?,
            CliCommand::Checksum { path } => run_checksum(Path::new(&path)).await?,
            CliCommand::Watch { period_hours } => {
                run_watch(resolve_config(&cli.overrides)?, period_hours).await?;
            }
        }

        Ok(())
    }
}

/// Config file (created on first use) with command-line overrides applied.
fn resolve_config(overrides: &Overrides) -> Result<UpdaterConfig> {
    let file_cfg = config::load_or_init()?;
    tracing::debug!("loaded config: {:?}", file_cfg);
    Ok(overrides.apply(file_cfg.to_updater_config()?))
}

#[cfg(test)]
mod tests;
