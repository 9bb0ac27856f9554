//! CLI parse tests.

use super::{Cli, CliCommand};
use clap::Parser;

pub(super) fn parse(args: &[&str]) -> CliCommand {
    let cli = Cli::try_parse_from(args).unwrap();
    cli.command
}


#[test]
fn cli_parse_config() {
    match parse(&["pooldl", "config"]) {
        CliCommand::Config => {}
        _ => panic!("expected Config"),
    }
}

#[test]
fn cli_parse_verbosity_is_global() {
    let cli = Cli::try_parse_from(["pooldl", "fetch", "-vv", "https://example.com/a"]).unwrap();
    assert_eq!(cli.verbose, 2);
    let cli = Cli::try_parse_from(["pooldl", "config"]).unwrap();
    assert_eq!(cli.verbose, 0);
}

#[test]
fn cli_requires_subcommand() {
    assert!(Cli::try_parse_from(["pooldl"]).is_err());
}
