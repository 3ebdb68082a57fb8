//! Tracked databases and their on-disk naming.
//!
//! Each [`DbName`] maps to one `<name>.mmdb` file in the storage directory,
//! one `<name>.mmdb.sha384` digest on the mirror, and one `<name>.tar.gz`
//! archive on the mirror.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Extension of the database files kept in the storage directory.
pub const DB_EXTENSION: &str = "mmdb";

/// Lowercase hex SHA-384 digest.
pub type Checksum = String;

/// Canonical absolute path of every published database, keyed by name.
pub type DbPaths = BTreeMap<DbName, PathBuf>;

/// A database tracked by the mirror.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DbName {
    #[serde(rename = "GeoLite2-ASN")]
    Asn,
    #[serde(rename = "GeoLite2-Country")]
    Country,
    #[serde(rename = "GeoLite2-City")]
    City,
}

impl DbName {
    /// Every database the mirror publishes.
    pub const ALL: [DbName; 3] = [DbName::Asn, DbName::Country, DbName::City];

    pub fn as_str(self) -> &'static str {
        match self {
            DbName::Asn => "GeoLite2-ASN",
            DbName::Country => "GeoLite2-Country",
            DbName::City => "GeoLite2-City",
        }
    }

    /// File name of the database inside the storage dir and the archive (`GeoLite2-ASN.mmdb`).
    pub fn file_name(self) -> String {
        format!("{}.{}", self.as_str(), DB_EXTENSION)
    }

    /// Name of the digest resource on the mirror.
    pub fn checksum_resource(self) -> String {
        format!("{}.sha384", self.file_name())
    }

    /// Name of the archive resource on the mirror.
    pub fn archive_resource(self) -> String {
        format!("{}.tar.gz", self.as_str())
    }

    /// Canonical location of this database under `dir`.
    pub fn path_in(self, dir: &Path) -> PathBuf {
        dir.join(self.file_name())
    }
}

impl fmt::Display for DbName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Error returned when a string names no known database.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown database '{0}' (expected one of GeoLite2-ASN, GeoLite2-Country, GeoLite2-City)")]
pub struct UnknownDbName(pub String);

impl FromStr for DbName {
    type Err = UnknownDbName;

    /// Accepts the canonical name or a short alias (`asn`, `country`, `city`), case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let short = trimmed
            .strip_prefix("GeoLite2-")
            .or_else(|| trimmed.strip_prefix("geolite2-"))
            .unwrap_or(trimmed);
        match short.to_ascii_lowercase().as_str() {
            "asn" => Ok(DbName::Asn),
            "country" => Ok(DbName::Country),
            "city" => Ok(DbName::City),
            _ => Err(UnknownDbName(s.to_string())),
        }
    }
}

/// Canonical paths for `dbs` under `dir`.
pub fn paths_in(dbs: &[DbName], dir: &Path) -> DbPaths {
    dbs.iter().map(|db| (*db, db.path_in(dir))).collect()
}
