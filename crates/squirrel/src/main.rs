//! # Squirrel CLI
//!
//! The binary is thin: the CLI lives in `src/cli/`, this file only invokes
//! `cli::run()` and turns an error into an exit code.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  CLI Layer (crates/squirrel/src/cli/)                       │
//! │  - clap argument parsing (setup.rs)                         │
//! │  - logging + context wiring (commands.rs)                   │
//! │  - one handler per subcommand (handlers.rs)                 │
//! │  - terminal and JSON rendering (render.rs, styles.rs)       │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  squirrelapp::api::Client                                   │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Everything behind the Client is UI agnostic. The CLI owns argument
//! parsing, stdout, stderr and the process exit code.

mod cli;

fn main() {
    if let Err(e) = cli::run() {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
