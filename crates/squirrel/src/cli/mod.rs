//! # CLI Behavior
//!
//! This is **one possible UI client** for squirrel, not the application
//! itself. It is the only place that knows about terminal I/O, exit codes
//! and output formatting.
//!
//! ## Configuration
//!
//! `--config PATH` names the config file. Without it the usual discovery
//! runs: `$SQUIRREL_CFG`, then `.squirrel.toml` / `squirrel.toml` in the
//! working directory, then the user config directory.
//!
//! ## Logging
//!
//! Diagnostics go to stderr. `-v` raises squirrel's own level to debug, `-vv`
//! to trace; `SQUIRREL_LOG` takes a full `tracing` filter and wins over `-v`.
//!
//! ## Output
//!
//! `--output term` (default) prints styled tables. `--output json` prints
//! the same data as JSON for scripts.
//!
//! ## Module Structure
//!
//! - `setup`: argument parsing via clap
//! - `commands`: entry point, logging and context setup
//! - `handlers`: per-command calls into the Client
//! - `render`: output formatting
//! - `styles`: terminal styling

mod commands;
mod handlers;
mod render;
pub mod setup;
mod styles;

pub use commands::run;
