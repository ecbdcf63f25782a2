//! Service descriptors and the groups that start and stop them.
//!
//! A [`Service`] pairs an immutable [`ServiceSpec`] with a [`ServiceKind`]
//! implementing the two per-type behaviours: `prepare` (filesystem setup and
//! the final command line) and `check_ready` (block until healthy).

mod group;
mod kinds;

use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;

use crate::document::ConfigDocumentError;
use crate::exec::{CommandError, CommandRunner};
use crate::probe::{PollTimeout, Poller, StatusClient};
use crate::process::{LaunchError, Launcher, Reaper};
use crate::reporter::LifecycleReporter;

pub use group::{GroupHook, GroupName, GroupNameParseError, QuorumHook, ServiceGroup};
pub use kinds::{Access, BlobNode, ClusterMgr, Consul, Kafka, Proxy, Scheduler, ShardNode};

/// Errors that abort a service start.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The service configuration document was unusable.
    #[error(transparent)]
    Document(#[from] ConfigDocumentError),
    /// A binary-backed service has no configuration document.
    #[error("service '{service}' has no configuration document")]
    MissingConfig {
        /// Service instance name.
        service: String,
    },
    /// A data directory could not be created.
    #[error("failed to create data directory '{path}': {source}")]
    CreateDirectory {
        /// Directory path.
        path: Utf8PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// A preparation command failed.
    #[error(transparent)]
    Command(#[from] CommandError),
    /// The service process could not be launched.
    #[error(transparent)]
    Launch(#[from] LaunchError),
    /// Readiness polling hit the configured deadline.
    #[error(transparent)]
    NotReady(#[from] PollTimeout),
}

/// Identity and file locations of one service instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceSpec {
    name: String,
    label: &'static str,
    token: String,
    config_path: Option<Utf8PathBuf>,
    log_path: Utf8PathBuf,
    self_detaching: bool,
}

impl ServiceSpec {
    /// Describes an instance. `label` names the service type in progress
    /// output; `token` must appear verbatim in the launched command line.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        label: &'static str,
        token: impl Into<String>,
        config_path: Option<Utf8PathBuf>,
        log_path: Utf8PathBuf,
    ) -> Self {
        Self {
            name: name.into(),
            label,
            token: token.into(),
            config_path,
            log_path,
            self_detaching: false,
        }
    }

    /// Marks the instance as forking away from the launched process, which
    /// then exits.
    #[must_use]
    pub const fn with_self_detaching(mut self, self_detaching: bool) -> Self {
        self.self_detaching = self_detaching;
        self
    }

    /// Instance name, e.g. `clustermgr2` or `blobnode-z0`.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Service type shown in progress lines.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        self.label
    }

    /// Substring identifying the instance's processes.
    #[must_use]
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Configuration document passed to the binary, if any.
    #[must_use]
    pub fn config_path(&self) -> Option<&Utf8Path> {
        self.config_path.as_deref()
    }

    /// Launch log receiving the process's stdout and stderr.
    #[must_use]
    pub fn log_path(&self) -> &Utf8Path {
        &self.log_path
    }

    /// Whether the launched pid is gone once the service is running.
    #[must_use]
    pub const fn self_detaching(&self) -> bool {
        self.self_detaching
    }

    /// Configuration document path, required by binary-backed services.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::MissingConfig`] when no document is attached.
    pub fn require_config(&self) -> Result<&Utf8Path, ServiceError> {
        self.config_path().ok_or_else(|| ServiceError::MissingConfig {
            service: self.name.clone(),
        })
    }
}

/// Collaborators a service needs while starting or stopping.
#[derive(Clone, Copy)]
pub struct Runtime<'a> {
    /// Detaches service processes.
    pub launcher: &'a dyn Launcher,
    /// Kills service processes.
    pub reaper: &'a dyn Reaper,
    /// Reaches status endpoints.
    pub client: &'a dyn StatusClient,
    /// Runs helper commands.
    pub commands: &'a dyn CommandRunner,
    /// Receives lifecycle events.
    pub reporter: &'a dyn LifecycleReporter,
    /// Paces readiness checks.
    pub poller: &'a Poller,
}

/// Per-type service behaviour.
pub trait ServiceKind: Send + Sync {
    /// Performs filesystem setup and returns the command line to launch.
    ///
    /// # Errors
    ///
    /// Any error is fatal for the service.
    fn prepare(&self, spec: &ServiceSpec, rt: &Runtime<'_>) -> Result<Vec<String>, ServiceError>;

    /// Blocks until the service is healthy.
    ///
    /// # Errors
    ///
    /// Fails only on document errors or when the poller's deadline expires.
    fn check_ready(&self, spec: &ServiceSpec, rt: &Runtime<'_>) -> Result<(), ServiceError>;

    /// Whether `check_ready` is a real health check worth announcing. Types
    /// whose readiness is confirmed by a group hook return `false`.
    fn announces_readiness(&self) -> bool {
        true
    }

    /// Whether the launched command forks the real service and exits.
    fn self_detaches(&self) -> bool {
        false
    }
}

/// A service instance: its descriptor and behaviour.
pub struct Service {
    spec: ServiceSpec,
    kind: Box<dyn ServiceKind>,
}

impl Service {
    /// Pairs a descriptor with its behaviour.
    #[must_use]
    pub fn new(spec: ServiceSpec, kind: impl ServiceKind + 'static) -> Self {
        Self {
            spec: spec.with_self_detaching(kind.self_detaches()),
            kind: Box::new(kind),
        }
    }

    /// Identity and file locations.
    #[must_use]
    pub const fn spec(&self) -> &ServiceSpec {
        &self.spec
    }

    /// Per-type behaviour.
    #[must_use]
    pub fn kind(&self) -> &dyn ServiceKind {
        self.kind.as_ref()
    }
}

impl std::fmt::Debug for Service {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Service").field("spec", &self.spec).finish_non_exhaustive()
    }
}

/// Standard command line for blobstore binaries: `<binary> -f <config>`.
pub(crate) fn daemon_command(
    binary: &Utf8Path,
    spec: &ServiceSpec,
) -> Result<Vec<String>, ServiceError> {
    let config = spec.require_config()?;
    Ok(vec![
        binary.to_string(),
        "-f".to_owned(),
        config.to_string(),
    ])
}
