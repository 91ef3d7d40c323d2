//! # CLI Layer
//!
//! The CLI layer is the **only** place in the codebase that:
//! - Knows about terminal I/O (stdout, stderr)
//! - Installs a `tracing` subscriber
//! - Handles argument parsing
//!
//! ## Responsibilities
//!
//! 1. **Argument Parsing**: clap turns shell arguments into [`Cli`]
//! 2. **Logging**: stderr subscriber driven by `-v` or `SQUIRREL_LOG`
//! 3. **Context Setup**: config discovery and backend selection via
//!    `squirrelapp::init`
//! 4. **Dispatch**: [`handlers::dispatch`] runs the command and renders it

use anyhow::{Context, Result};
use clap::Parser;
use squirrelapp::init::initialize;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use super::handlers;
use super::setup::Cli;

/// Full `tracing` filter, overriding `-v`.
pub const LOG_ENV: &str = "SQUIRREL_LOG";

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut ctx = initialize(cli.config.clone()).context("could not load configuration")?;
    debug!(
        config = %ctx.config_path.display(),
        backend = %ctx.client.backend().kind(),
        "context ready"
    );

    let out = handlers::dispatch(&mut ctx.client, cli.command, cli.output)?;
    print!("{}", out);
    Ok(())
}

fn level(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    }
}

fn init_logging(verbose: u8) {
    let level = level(verbose);
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| EnvFilter::new(format!("warn,squirrel={level},squirrelapp={level}")));

    // A second install (tests) is not an error worth reporting.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
