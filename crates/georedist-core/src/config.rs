use crate::db::DbName;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Mirror serving `<name>.mmdb.sha384` digests and `<name>.tar.gz` archives.
pub const DEFAULT_MIRROR_URL: &str =
    "https://raw.githubusercontent.com/GitSquared/node-geolite2-redist/master/redist/";

/// Period between timer-driven update checks.
pub const DEFAULT_UPDATE_PERIOD: Duration = Duration::from_secs(48 * 60 * 60);

/// Delay before the first scheduled check, so subscribers can attach.
pub const DEFAULT_INITIAL_CHECK_DELAY: Duration = Duration::from_millis(500);

/// Suffix appended to the storage dir to form its staging sibling.
pub const STAGING_SUFFIX: &str = ".geodownload";

/// Runtime settings threaded into the checksum store, downloader and updater.
#[derive(Debug, Clone)]
pub struct UpdaterConfig {
    /// Databases to track.
    pub dbs: Vec<DbName>,
    /// Directory holding the published `<name>.mmdb` files.
    pub storage_dir: PathBuf,
    /// Base URL of the mirror; resource names are joined onto it.
    pub mirror_url: String,
    pub update_period: Duration,
    pub initial_check_delay: Duration,
}

impl UpdaterConfig {
    pub fn new(dbs: Vec<DbName>, storage_dir: impl Into<PathBuf>) -> Self {
        Self {
            dbs,
            storage_dir: storage_dir.into(),
            mirror_url: DEFAULT_MIRROR_URL.to_string(),
            update_period: DEFAULT_UPDATE_PERIOD,
            initial_check_delay: DEFAULT_INITIAL_CHECK_DELAY,
        }
    }

    pub fn with_mirror_url(mut self, url: impl Into<String>) -> Self {
        self.mirror_url = url.into();
        self
    }

    pub fn with_update_period(mut self, period: Duration) -> Self {
        self.update_period = period;
        self
    }

    pub fn with_initial_check_delay(mut self, delay: Duration) -> Self {
        self.initial_check_delay = delay;
        self
    }

    /// Same settings, tracking only `dbs`.
    pub fn for_dbs(&self, dbs: &[DbName]) -> Self {
        Self {
            dbs: dbs.to_vec(),
            ..self.clone()
        }
    }

    /// Scratch directory next to the storage dir (`<storage_dir>.geodownload`).
    pub fn staging_dir(&self) -> PathBuf {
        staging_dir_for(&self.storage_dir)
    }
}

/// Staging sibling of `storage_dir`. Same parent, so publishing is a same-filesystem rename.
pub fn staging_dir_for(storage_dir: &Path) -> PathBuf {
    let mut o = storage_dir.as_os_str().to_owned();
    o.push(STAGING_SUFFIX);
    PathBuf::from(o)
}

/// Global configuration loaded from `~/.config/georedist/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeoRedistConfig {
    /// Base URL of the redistribution mirror.
    pub mirror_url: String,
    /// Databases to keep up to date.
    pub databases: Vec<DbName>,
    /// Storage directory; when missing, `~/.local/share/georedist/dbs` is used.
    #[serde(default)]
    pub storage_dir: Option<PathBuf>,
    /// Hours between background checks; when missing, 48.
    #[serde(default)]
    pub update_period_hours: Option<u64>,
}

impl Default for GeoRedistConfig {
    fn default() -> Self {
        Self {
            mirror_url: DEFAULT_MIRROR_URL.to_string(),
            databases: DbName::ALL.to_vec(),
            storage_dir: None,
            update_period_hours: None,
        }
    }
}

impl GeoRedistConfig {
    /// Resolve into runtime settings, filling the default storage dir from XDG.
    pub fn to_updater_config(&self) -> Result<UpdaterConfig> {
        let storage_dir = match &self.storage_dir {
            Some(dir) => dir.clone(),
            None => default_storage_dir()?,
        };
        let mut cfg = UpdaterConfig::new(self.databases.clone(), storage_dir)
            .with_mirror_url(self.mirror_url.clone());
        if let Some(hours) = self.update_period_hours {
            cfg = cfg.with_update_period(Duration::from_secs(hours.max(1) * 60 * 60));
        }
        Ok(cfg)
    }
}

/// `~/.local/share/georedist/dbs`.
pub fn default_storage_dir() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("georedist")?;
    Ok(xdg_dirs.get_data_home().join("dbs"))
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("georedist")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<GeoRedistConfig> {
    load_or_init_at(&config_path()?)
}

pub fn load_or_init_at(path: &Path) -> Result<GeoRedistConfig> {
    if !path.exists() {
        let default_cfg = GeoRedistConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml).with_context(|| format!("write {}", path.display()))?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: GeoRedistConfig =
        toml::from_str(&data).with_context(|| format!("parse {}", path.display()))?;
    Ok(cfg)
}
