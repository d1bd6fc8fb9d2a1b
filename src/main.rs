//! # polyrepo CLI
//!
//! Binary entry point for the `polyrepo` command-line tool. It parses the
//! command line with `clap`, sets up logging and dispatches to a command.
//! The workspace logic itself lives in the `polyrepo` library crate.

mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;

fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    cli.execute()
}
