use super::parse;
use crate::cli::{Cli, CliCommand};
use clap::Parser;

#[test]
fn checksum_path() {
    match parse(&["httpretry", "checksum", "/tmp/file.iso"]) {
        CliCommand::Checksum { path } => assert_eq!(path, "/tmp/file.iso"),
        other => panic!("expected Checksum, got {:?}", other),
    }
}

#[test]
fn checksum_requires_path() {
    assert!(Cli::try_parse_from(["httpretry", "checksum"]).is_err());
}

#[test]
fn unknown_subcommand_fails() {
    assert!(Cli::try_parse_from(["httpretry", "fetch", "http://h/"]).is_err());
}
