//! Detached process launching and best-effort teardown.

mod errors;
mod launcher;
mod reaper;

pub use errors::LaunchError;
pub use launcher::{DetachedLauncher, Launcher, RunningProcess};
pub use reaper::{PidFileReaper, ProcessEntry, ProcessTable, ProcfsTable, Reaper, TokenReaper};

pub(crate) const LAUNCH_TARGET: &str = "vstart_engine::launcher";
pub(crate) const REAPER_TARGET: &str = "vstart_engine::reaper";
