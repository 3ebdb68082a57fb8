//! Checksum store: remote digests from the mirror, local digests from disk.
//!
//! Digests are SHA-384 as lowercase hex. Local hashing streams the file in
//! chunks on the blocking pool so large databases never sit in memory.

use crate::db::{paths_in, Checksum, DbName, DbPaths};
use crate::error::{IntegrityError, UpdateError};
use crate::mirror::{self, Mirror};
use sha2::{Digest, Sha384};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use tokio::task::JoinSet;

const BUF_SIZE: usize = 64 * 1024;

/// Length of a SHA-384 digest in hex.
pub const CHECKSUM_HEX_LEN: usize = 96;

/// Compute SHA-384 of a file and return the digest as lowercase hex.
pub fn sha384_path(path: &Path) -> io::Result<Checksum> {
    let mut f = File::open(path)?;
    let mut hasher = Sha384::new();
    let mut buf = vec![0u8; BUF_SIZE];
    loop {
        let n = f.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Validate a digest response body: trimmed, exactly 96 hex chars. Normalized to lowercase.
pub fn parse_remote_checksum(url: &str, body: &str) -> Result<Checksum, UpdateError> {
    let digest = body.trim();
    if digest.len() != CHECKSUM_HEX_LEN || !digest.bytes().all(|b| b.is_ascii_hexdigit()) {
        let shown: String = digest.chars().take(120).collect();
        return Err(UpdateError::network(
            url,
            format!(
                "expected a {}-character hex digest, received {:?}",
                CHECKSUM_HEX_LEN, shown
            ),
        ));
    }
    Ok(digest.to_ascii_lowercase())
}

async fn join_all<T: Send + 'static>(
    mut set: JoinSet<(DbName, Result<T, UpdateError>)>,
) -> Result<BTreeMap<DbName, T>, UpdateError> {
    let mut out = BTreeMap::new();
    let mut first_error = None;
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((db, Ok(value))) => {
                out.insert(db, value);
            }
            Ok((_, Err(e))) => {
                first_error.get_or_insert(e);
            }
            Err(e) => {
                first_error.get_or_insert(UpdateError::filesystem(
                    PathBuf::new(),
                    io::Error::new(io::ErrorKind::Other, format!("worker panicked: {}", e)),
                ));
            }
        }
    }
    match first_error {
        Some(e) => Err(e),
        None => Ok(out),
    }
}

/// Fetch the mirror's digest for every db, one request each, concurrently.
pub async fn fetch_remote(
    mirror: &Mirror,
    dbs: &[DbName],
) -> Result<BTreeMap<DbName, Checksum>, UpdateError> {
    let mut set = JoinSet::new();
    for &db in dbs {
        let url = mirror.checksum_url(db)?;
        set.spawn_blocking(move || {
            let res = mirror::fetch_text(&url).and_then(|body| parse_remote_checksum(&url, &body));
            (db, res)
        });
    }
    let sums = join_all(set).await?;
    tracing::debug!(count = sums.len(), "fetched remote checksums");
    Ok(sums)
}

/// Hash the local copy of every db under `dir`. A missing file is an integrity failure.
pub async fn compute_local(
    dbs: &[DbName],
    dir: &Path,
) -> Result<BTreeMap<DbName, Checksum>, UpdateError> {
    let mut set = JoinSet::new();
    for &db in dbs {
        let path = db.path_in(dir);
        set.spawn_blocking(move || {
            let res = sha384_path(&path).map_err(|e| {
                if e.kind() == io::ErrorKind::NotFound {
                    IntegrityError::Missing { db, path: path.clone() }.into()
                } else {
                    UpdateError::filesystem(&path, e)
                }
            });
            (db, res)
        });
    }
    join_all(set).await
}

/// Compare remote and local digests. Returns the canonical paths when every db is current.
///
/// A remote failure wins over a local one, so an unreachable mirror never
/// looks like a stale copy.
pub async fn verify(mirror: &Mirror, dbs: &[DbName], dir: &Path) -> Result<DbPaths, UpdateError> {
    let (remote, local) = tokio::join!(fetch_remote(mirror, dbs), compute_local(dbs, dir));
    let remote = remote?;
    let local = local?;

    for &db in dbs {
        let expected = remote.get(&db);
        let actual = local.get(&db);
        if expected != actual {
            return Err(IntegrityError::Mismatch {
                db,
                expected: expected.cloned().unwrap_or_default(),
                actual: actual.cloned().unwrap_or_default(),
            }
            .into());
        }
    }
    tracing::debug!(dir = %dir.display(), "local databases match the mirror");
    Ok(paths_in(dbs, dir))
}
