//! Foreground helper commands run during service preparation and probing.

use std::io;
use std::process::{Command, Stdio};

use thiserror::Error;
use tracing::debug;

const EXEC_TARGET: &str = "vstart_engine::exec";

/// Errors raised by [`CommandRunner::output`].
#[derive(Debug, Error)]
pub enum CommandError {
    /// No program was supplied.
    #[error("refusing to run an empty command")]
    Empty,
    /// The program could not be started.
    #[error("failed to run '{program}': {source}")]
    Spawn {
        /// Program name.
        program: String,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The program exited unsuccessfully.
    #[error("'{program}' exited with status {status:?}: {stderr}")]
    Failed {
        /// Program name.
        program: String,
        /// Exit code when the program was not killed by a signal.
        status: Option<i32>,
        /// Captured standard error.
        stderr: String,
    },
}

/// Runs short-lived commands to completion.
#[cfg_attr(test, mockall::automock)]
pub trait CommandRunner: Send + Sync {
    /// Runs `argv` and returns its standard output. A non-zero exit status is
    /// an error.
    fn output(&self, argv: &[String]) -> Result<String, CommandError>;

    /// Runs `argv` and reports whether it exited successfully. Output is
    /// discarded; a command that cannot be started counts as a failure.
    fn succeeds(&self, argv: &[String]) -> bool;
}

/// [`CommandRunner`] backed by [`std::process::Command`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemCommandRunner;

impl SystemCommandRunner {
    /// Builds a new runner.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl CommandRunner for SystemCommandRunner {
    fn output(&self, argv: &[String]) -> Result<String, CommandError> {
        let (program, args) = argv.split_first().ok_or(CommandError::Empty)?;
        debug!(target: EXEC_TARGET, program = %program, ?args, "running command");
        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .map_err(|source| CommandError::Spawn {
                program: program.clone(),
                source,
            })?;
        if !output.status.success() {
            return Err(CommandError::Failed {
                program: program.clone(),
                status: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn succeeds(&self, argv: &[String]) -> bool {
        let Some((program, args)) = argv.split_first() else {
            return false;
        };
        let status = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();
        match status {
            Ok(status) => status.success(),
            Err(error) => {
                debug!(target: EXEC_TARGET, program = %program, %error, "command failed to start");
                false
            }
        }
    }
}
