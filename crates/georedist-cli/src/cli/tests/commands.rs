//! Tests for fetch, verify, checksum and watch.

use super::parse;
use crate::cli::{Cli, CliCommand};
use clap::Parser;

#[test]
fn cli_parse_fetch() {
    match parse(&["georedist", "fetch"]) {
        CliCommand::Fetch => {}
        _ => panic!("expected Fetch"),
    }
}

#[test]
fn cli_parse_verify() {
    match parse(&["georedist", "verify"]) {
        CliCommand::Verify => {}
        _ => panic!("expected Verify"),
    }
}

#[test]
fn cli_parse_checksum() {
    match parse(&["georedist", "checksum", "/tmp/GeoLite2-ASN.mmdb"]) {
        CliCommand::Checksum { path } => assert_eq!(path, "/tmp/GeoLite2-ASN.mmdb"),
        _ => panic!("expected Checksum"),
    }
}

#[test]
fn cli_parse_checksum_requires_path() {
    assert!(Cli::try_parse_from(["georedist", "checksum"]).is_err());
}

#[test]
fn cli_parse_watch() {
    match parse(&["georedist", "watch"]) {
        CliCommand::Watch { period_hours } => assert!(period_hours.is_none()),
        _ => panic!("expected Watch"),
    }
}

#[test]
fn cli_parse_watch_period() {
    match parse(&["georedist", "watch", "--period-hours", "6"]) {
        CliCommand::Watch { period_hours } => assert_eq!(period_hours, Some(6)),
        _ => panic!("expected Watch with --period-hours"),
    }
}

#[test]
fn cli_rejects_unknown_command() {
    assert!(Cli::try_parse_from(["georedist", "serve"]).is_err());
}
