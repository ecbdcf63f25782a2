//! CLI entrypoint for the `vstart` local cluster orchestrator.
//!
//! The binary delegates to [`vstart_cli::run`], which loads configuration,
//! parses the requested actions and drives the lifecycle engine.

use std::io;
use std::process::ExitCode;

fn main() -> ExitCode {
    vstart_cli::run(std::env::args_os(), &mut io::stdout(), &mut io::stderr())
}
