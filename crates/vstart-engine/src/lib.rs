//! Lifecycle engine for a local multi-process blobstore deployment.
//!
//! The engine starts, health-checks and stops the background services that
//! make up a miniature cluster on one machine: consul, kafka, a three replica
//! clustermgr quorum, blobnodes, shardnodes, the proxy, the scheduler and the
//! access front door.
//!
//! Work is organised in layers:
//!
//! - [`DirectoryLayout`] derives every filesystem location from the install
//!   root, cluster version and availability-zone topology.
//! - [`DetachedLauncher`] double-forks service processes into their own
//!   session with output appended to a per-service launch log.
//! - Each service type implements [`ServiceKind`]; a [`ServiceGroup`] starts
//!   its members in order and stops them in reverse.
//! - [`Orchestrator`] flattens requested actions into an [`ExecutionPlan`] and
//!   walks it, blocking on each readiness check before moving on.
//!
//! Readiness waits are unbounded unless `readiness_timeout_secs` is
//! configured.

mod document;
mod exec;
mod layout;
mod orchestrator;
mod probe;
mod process;
mod reporter;
mod service;
pub mod telemetry;

pub use document::{ConfigDocument, ConfigDocumentError};
pub use exec::{CommandError, CommandRunner, SystemCommandRunner};
pub use layout::{DirectoryLayout, LayoutError};
pub use orchestrator::{
    Action, Catalog, CatalogSettings, Collaborators, Composite, ExecutionPlan, Orchestrator,
    OrchestratorError, Request, Step, Target, UnknownTarget, reaper_for,
};
pub use probe::{HttpStatusClient, PollTimeout, Poller, ProbeError, StatusClient};
pub use process::{
    DetachedLauncher, LaunchError, Launcher, PidFileReaper, ProcessEntry, ProcessTable,
    ProcfsTable, Reaper, RunningProcess, TokenReaper,
};
pub use reporter::{ConsoleReporter, LifecycleReporter, StructuredReporter};
pub use service::{
    GroupHook, GroupName, GroupNameParseError, QuorumHook, Runtime, Service, ServiceError,
    ServiceGroup, ServiceKind, ServiceSpec,
};
pub use telemetry::{TelemetryError, TelemetryHandle};

#[cfg(test)]
mod tests;
