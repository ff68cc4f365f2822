//! Command line interface for peridot.
//!
//! Parses SPDX license expressions, loads the SPDX license list and interns
//! expressions into a JSON state file of shared node records. Command output
//! goes to stdout; logs go to stderr.

mod cli;
mod config;
mod logging;
mod output;
mod state;

use std::io::{self, Write};

use clap::Parser;
use eyre::{Context, Result};

use crate::cli::Cli;
use crate::config::Config;
use crate::logging::init_logging;

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env()
        .wrap_err("invalid configuration")?
        .apply_overrides(cli.log_level, cli.state, cli.license_list);
    init_logging(&config);
    tracing::debug!(?config, "starting peridot");

    let mut stdout = io::stdout().lock();
    cli::run(cli.command, &config, &mut stdout)?;
    stdout.flush().wrap_err("failed to flush output to stdout")
}
