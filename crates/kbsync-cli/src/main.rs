//! # kbsync CLI
//!
//! Command-line explorer for knowledge-base sync.
//!
//! This binary drives `kbsync-core` sessions against the backend or the
//! offline repository from `kbsync-client`.
//! Run `kbsync --help` for usage information.

mod cli;
mod explore;
pub mod ui;

use std::process::ExitCode;

fn main() -> ExitCode {
    cli::run()
}
