#![allow(dead_code)]

pub mod mirror_server;

use flate2::write::GzEncoder;
use flate2::Compression;
use georedist_core::config::UpdaterConfig;
use georedist_core::DbName;
use mirror_server::MirrorServer;
use sha2::{Digest, Sha384};
use std::path::Path;

/// Build a `.tar.gz` holding `entries` (path inside archive, body).
pub fn tar_gz(entries: &[(String, Vec<u8>)]) -> Vec<u8> {
    let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
    for (name, body) in entries {
        let mut header = tar::Header::new_gnu();
        header.set_size(body.len() as u64);
        header.set_mode(0o644);
        header.set_entry_type(tar::EntryType::Regular);
        header.set_cksum();
        builder.append_data(&mut header, name, body.as_slice()).unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap()
}

pub fn sha384_hex(body: &[u8]) -> String {
    hex::encode(Sha384::digest(body))
}

/// Archive laid out like the real mirror: a dated folder with the database and license files.
pub fn db_archive(db: DbName, body: &[u8]) -> Vec<u8> {
    let folder = format!("{}_20240102", db.as_str());
    tar_gz(&[
        (format!("{}/COPYRIGHT.txt", folder), b"Database and Contents Copyright".to_vec()),
        (format!("{}/{}", folder, db.file_name()), body.to_vec()),
        (format!("{}/LICENSE.txt", folder), b"license".to_vec()),
    ])
}

/// Serve `body` as the current version of `db`: archive plus matching digest.
pub fn publish(server: &MirrorServer, db: DbName, body: &[u8]) {
    server.put(&db.archive_resource(), db_archive(db, body));
    server.put(&db.checksum_resource(), format!("{}\n", sha384_hex(body)));
}

pub fn config(server: &MirrorServer, dir: &Path, dbs: &[DbName]) -> UpdaterConfig {
    UpdaterConfig::new(dbs.to_vec(), dir.join("dbs")).with_mirror_url(server.url())
}

pub fn write_local(dir: &Path, db: DbName, body: &[u8]) {
    let storage = dir.join("dbs");
    std::fs::create_dir_all(&storage).unwrap();
    std::fs::write(db.path_in(&storage), body).unwrap();
}
