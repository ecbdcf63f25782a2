//! Best-effort termination of running services.
//!
//! The default [`TokenReaper`] scans the whole process table and kills every
//! process whose command line mentions the service token. This is approximate:
//! an unrelated process that happens to carry the token is terminated too.
//! [`PidFileReaper`] instead kills only the pid recorded at launch time, except
//! for services that detach themselves after launch.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};

use camino::{Utf8Path, Utf8PathBuf};
use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;
use procfs::process::{Process, all_processes};
use tracing::{debug, info};

use super::REAPER_TARGET;
use super::errors::LaunchError;
use super::launcher::RunningProcess;
use crate::service::ServiceSpec;

/// A live process and its command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessEntry {
    /// Process identifier.
    pub pid: u32,
    /// Command line arguments joined by single spaces.
    pub cmdline: String,
}

/// Source of live processes and the means to kill them.
pub trait ProcessTable: Send + Sync {
    /// Snapshot of the currently visible processes.
    fn entries(&self) -> Vec<ProcessEntry>;

    /// Sends `SIGKILL` to `pid`, ignoring failures.
    fn terminate(&self, pid: u32);
}

/// [`ProcessTable`] backed by `procfs`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcfsTable;

impl ProcfsTable {
    /// Reads the system process table.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

fn entry_for(process: &Process) -> Option<ProcessEntry> {
    let pid = u32::try_from(process.pid()).ok()?;
    let cmdline = process.cmdline().ok()?;
    Some(ProcessEntry {
        pid,
        cmdline: cmdline.join(" "),
    })
}

impl ProcessTable for ProcfsTable {
    fn entries(&self) -> Vec<ProcessEntry> {
        match all_processes() {
            // Processes exit between listing and reading; skip them.
            Ok(processes) => processes
                .filter_map(Result::ok)
                .filter_map(|process| entry_for(&process))
                .collect(),
            Err(error) => {
                debug!(
                    target: REAPER_TARGET,
                    error = %error,
                    "process table unreadable"
                );
                Vec::new()
            }
        }
    }

    fn terminate(&self, pid: u32) {
        let Ok(raw) = i32::try_from(pid) else {
            return;
        };
        if let Err(errno) = kill(Pid::from_raw(raw), Signal::SIGKILL) {
            debug!(
                target: REAPER_TARGET,
                pid,
                error = %errno,
                "kill failed; ignoring"
            );
        }
    }
}

/// Pids in `table` whose command line contains `token`, excluding `own_pid`.
fn matching_pids(table: &impl ProcessTable, own_pid: u32, token: &str) -> Vec<u32> {
    table
        .entries()
        .into_iter()
        .filter(|entry| entry.pid != own_pid && entry.cmdline.contains(token))
        .map(|entry| entry.pid)
        .collect()
}

fn kill_matching(table: &impl ProcessTable, own_pid: u32, spec: &ServiceSpec) {
    for pid in matching_pids(table, own_pid, spec.token()) {
        info!(
            target: REAPER_TARGET,
            service = spec.name(),
            token = spec.token(),
            pid,
            "killing service process"
        );
        table.terminate(pid);
    }
}

/// Terminates the processes belonging to a service.
pub trait Reaper: Send + Sync {
    /// Records a freshly launched process. Strategies that do not need the
    /// pid ignore it.
    fn track(&self, spec: &ServiceSpec, process: RunningProcess) -> Result<(), LaunchError> {
        let _ = (spec, process);
        Ok(())
    }

    /// Kills the service's processes. Never fails.
    fn stop(&self, spec: &ServiceSpec);
}

impl<T: Reaper + ?Sized> Reaper for Box<T> {
    fn track(&self, spec: &ServiceSpec, process: RunningProcess) -> Result<(), LaunchError> {
        (**self).track(spec, process)
    }

    fn stop(&self, spec: &ServiceSpec) {
        (**self).stop(spec);
    }
}

/// Kills every process whose command line contains the service token.
#[derive(Debug, Clone)]
pub struct TokenReaper<T> {
    table: T,
    own_pid: u32,
}

impl<T: ProcessTable> TokenReaper<T> {
    /// Builds a reaper over `table` that never signals the current process.
    pub fn new(table: T) -> Self {
        Self {
            table,
            own_pid: std::process::id(),
        }
    }

    /// Pids of the processes matching `token`.
    pub fn matching(&self, token: &str) -> Vec<u32> {
        matching_pids(&self.table, self.own_pid, token)
    }
}

impl<T: ProcessTable> Reaper for TokenReaper<T> {
    fn stop(&self, spec: &ServiceSpec) {
        kill_matching(&self.table, self.own_pid, spec);
    }
}

/// Kills only the pid recorded when the service was launched.
///
/// A self-detaching service has left the recorded pid behind by the time it
/// is stopped, so its processes are matched by token instead.
#[derive(Debug, Clone)]
pub struct PidFileReaper<T> {
    dir: Utf8PathBuf,
    table: T,
    own_pid: u32,
}

impl<T: ProcessTable> PidFileReaper<T> {
    /// Builds a reaper that keeps `<dir>/<service>.pid` files.
    pub fn new(dir: impl Into<Utf8PathBuf>, table: T) -> Self {
        Self {
            dir: dir.into(),
            table,
            own_pid: std::process::id(),
        }
    }

    /// Location of the pid file for `spec`.
    #[must_use]
    pub fn pid_path(&self, spec: &ServiceSpec) -> Utf8PathBuf {
        self.dir.join(format!("{}.pid", spec.name()))
    }
}

impl<T: ProcessTable> Reaper for PidFileReaper<T> {
    fn track(&self, spec: &ServiceSpec, process: RunningProcess) -> Result<(), LaunchError> {
        let path = self.pid_path(spec);
        write_pid(&path, process.pid())?;
        info!(
            target: REAPER_TARGET,
            service = spec.name(),
            pid = process.pid(),
            file = %path,
            "pid file written"
        );
        Ok(())
    }

    fn stop(&self, spec: &ServiceSpec) {
        let path = self.pid_path(spec);
        if spec.self_detaching() {
            kill_matching(&self.table, self.own_pid, spec);
            remove_pid_file(&path);
            return;
        }
        let Some(pid) = read_pid(&path) else {
            debug!(
                target: REAPER_TARGET,
                service = spec.name(),
                file = %path,
                "no usable pid file; nothing to stop"
            );
            return;
        };
        if pid != self.own_pid {
            info!(
                target: REAPER_TARGET,
                service = spec.name(),
                pid,
                "killing recorded service process"
            );
            self.table.terminate(pid);
        }
        remove_pid_file(&path);
    }
}

fn remove_pid_file(path: &Utf8Path) {
    if let Err(error) = fs::remove_file(path)
        && error.kind() != io::ErrorKind::NotFound
    {
        debug!(
            target: REAPER_TARGET,
            file = %path,
            error = %error,
            "failed to remove pid file"
        );
    }
}

fn write_pid(path: &Utf8Path, pid: u32) -> Result<(), LaunchError> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let pid_error = |source| LaunchError::PidWrite {
        path: path.to_path_buf(),
        source,
    };
    let mut file = options.open(path).map_err(pid_error)?;
    writeln!(file, "{pid}").map_err(pid_error)?;
    file.sync_all().map_err(pid_error)
}

fn read_pid(path: &Utf8Path) -> Option<u32> {
    let content = fs::read_to_string(path).ok()?;
    content.trim().parse::<u32>().ok().filter(|pid| *pid != 0)
}
