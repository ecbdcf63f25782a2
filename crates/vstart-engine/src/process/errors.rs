//! Defines the error surface for launching and tracking service processes.

use std::io;

use camino::Utf8PathBuf;
use nix::errno::Errno;
use thiserror::Error;

/// Errors surfaced while detaching a service process.
#[derive(Debug, Error)]
pub enum LaunchError {
    /// The service produced an empty argument vector.
    #[error("refusing to launch an empty command")]
    EmptyCommand,
    /// An argument contained an interior NUL byte.
    #[error("argument {argument:?} contains a NUL byte")]
    InvalidArgument {
        /// Offending argument.
        argument: String,
    },
    /// The launch log could not be opened for appending.
    #[error("failed to open launch log '{path}': {source}")]
    LogFile {
        /// Log file path.
        path: Utf8PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The null device could not be opened for the child's stdin.
    #[error("failed to open /dev/null: {source}")]
    NullDevice {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The handshake pipe could not be created.
    #[error("failed to create launch handshake pipe: {source}")]
    Pipe {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The first fork failed.
    #[error("failed to fork launcher process: {source}")]
    Fork {
        /// Underlying OS error.
        #[source]
        source: Errno,
    },
    /// Reaping the intermediate process failed.
    #[error("failed to reap intermediate launcher process: {source}")]
    Wait {
        /// Underlying OS error.
        #[source]
        source: Errno,
    },
    /// The intermediate process could not detach the daemon.
    #[error("intermediate launcher process failed to detach (status {status:?})")]
    Detach {
        /// Exit status reported by the intermediate process, if it exited.
        status: Option<i32>,
    },
    /// The handshake pipe closed before the daemon reported its pid.
    #[error("launch handshake for '{program}' failed: {source}")]
    Handshake {
        /// Program being launched.
        program: String,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The daemon could not execute the target program.
    #[error("failed to execute '{program}': {source}")]
    Exec {
        /// Program being launched.
        program: String,
        /// Error reported by `execvp(3)`.
        #[source]
        source: io::Error,
    },
    /// Recording the launched pid failed.
    #[error("failed to write pid file '{path}': {source}")]
    PidWrite {
        /// Pid file path.
        path: Utf8PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}
