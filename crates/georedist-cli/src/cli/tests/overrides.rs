//! Tests for the global --dir / --db / --mirror options.

use super::parse_full;
use crate::cli::{Cli, CliCommand};
use clap::Parser;
use georedist_core::config::UpdaterConfig;
use georedist_core::DbName;
use std::path::{Path, PathBuf};

fn base() -> UpdaterConfig {
    UpdaterConfig::new(DbName::ALL.to_vec(), "/var/lib/georedist")
}

#[test]
fn no_overrides_keeps_config() {
    let cli = parse_full(&["georedist", "fetch"]);
    assert!(cli.overrides.dir.is_none());
    assert!(cli.overrides.dbs.is_empty());
    assert!(cli.overrides.mirror.is_none());

    let cfg = cli.overrides.apply(base());
    assert_eq!(cfg.dbs, DbName::ALL.to_vec());
    assert_eq!(cfg.storage_dir, PathBuf::from("/var/lib/georedist"));
}

#[test]
fn repeated_db_flags_accept_aliases() {
    let cli = parse_full(&["georedist", "fetch", "--db", "asn", "--db", "GeoLite2-City"]);
    assert_eq!(cli.overrides.dbs, vec![DbName::Asn, DbName::City]);
    let cfg = cli.overrides.apply(base());
    assert_eq!(cfg.dbs, vec![DbName::Asn, DbName::City]);
}

#[test]
fn global_options_work_before_the_command() {
    let cli = parse_full(&[
        "georedist",
        "--dir",
        "/tmp/dbs",
        "--mirror",
        "http://127.0.0.1:8080/redist/",
        "verify",
    ]);
    assert!(matches!(cli.command, CliCommand::Verify));
    let cfg = cli.overrides.apply(base());
    assert_eq!(cfg.storage_dir, Path::new("/tmp/dbs"));
    assert_eq!(cfg.mirror_url, "http://127.0.0.1:8080/redist/");
}

#[test]
fn unknown_db_is_rejected() {
    assert!(Cli::try_parse_from(["georedist", "fetch", "--db", "isp"]).is_err());
}
