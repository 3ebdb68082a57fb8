//! Pull a single database file out of a `.tar.gz` archive.

use crate::db::DbName;
use crate::error::UpdateError;
use flate2::read::GzDecoder;
use std::fs::File;
use std::io::{self, BufReader};
use std::path::Path;
use tar::EntryType;

/// Extract the entry named `<db>.mmdb` (at any depth) from `archive` into `dest`.
/// Every other entry is skipped.
pub(crate) fn extract_db(archive: &Path, db: DbName, dest: &Path) -> Result<u64, UpdateError> {
    let wanted = db.file_name();
    let corrupt = |e: io::Error| UpdateError::Archive {
        db,
        reason: format!("corrupt archive {}: {}", archive.display(), e),
    };

    let file = File::open(archive).map_err(|e| UpdateError::filesystem(archive, e))?;
    let mut tar = tar::Archive::new(GzDecoder::new(BufReader::new(file)));

    for entry in tar.entries().map_err(corrupt)? {
        let mut entry = entry.map_err(corrupt)?;
        if entry.header().entry_type() != EntryType::Regular {
            continue;
        }
        let matches = entry
            .path()
            .map_err(corrupt)?
            .file_name()
            .map(|name| name == wanted.as_str())
            .unwrap_or(false);
        if !matches {
            continue;
        }

        let mut out = File::create(dest).map_err(|e| UpdateError::filesystem(dest, e))?;
        let n = io::copy(&mut entry, &mut out).map_err(corrupt)?;
        out.sync_all().map_err(|e| UpdateError::filesystem(dest, e))?;
        return Ok(n);
    }

    Err(UpdateError::Archive {
        db,
        reason: format!("no {} entry in {}", wanted, archive.display()),
    })
}
