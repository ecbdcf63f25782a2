//! Executes start, stop and restart requests against the declared groups.

mod catalog;
mod plan;

use thiserror::Error;
use tracing::info;
use vstart_config::{Config, ReapStrategy, Topology};

use crate::exec::CommandRunner;
use crate::layout::{DirectoryLayout, LayoutError};
use crate::probe::{Poller, StatusClient};
use crate::process::{Launcher, PidFileReaper, ProcfsTable, Reaper, TokenReaper};
use crate::reporter::LifecycleReporter;
use crate::service::{GroupName, Runtime, ServiceError};

pub use catalog::{Catalog, CatalogSettings};
pub use plan::{Action, Composite, ExecutionPlan, Request, Step, Target, UnknownTarget};

const ORCHESTRATOR_TARGET: &str = "vstart_engine::orchestrator";

/// Errors that abort an orchestration run.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// The requested topology cannot be deployed.
    #[error("{topology} availability zone setup is not supported")]
    UnsupportedTopology {
        /// Requested topology.
        topology: Topology,
    },
    /// A plan step named a group that was never declared.
    #[error("service group '{group}' is not declared")]
    UnknownGroup {
        /// Missing group.
        group: GroupName,
    },
    /// Directory setup or teardown failed.
    #[error(transparent)]
    Layout(#[from] LayoutError),
    /// A service failed to start.
    #[error("failed to start {group}: {source}")]
    Service {
        /// Group being started.
        group: GroupName,
        /// Underlying failure.
        #[source]
        source: ServiceError,
    },
}

/// External collaborators shared by every group operation.
#[derive(Clone, Copy)]
pub struct Collaborators<'a> {
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
}

/// Builds the reaper selected by `strategy`.
#[must_use]
pub fn reaper_for(strategy: ReapStrategy, layout: &DirectoryLayout) -> Box<dyn Reaper> {
    match strategy {
        ReapStrategy::Token => Box::new(TokenReaper::new(ProcfsTable::new())),
        ReapStrategy::Pid => Box::new(PidFileReaper::new(layout.pid_dir(), ProcfsTable::new())),
    }
}

/// Drives groups through their lifecycle in plan order.
pub struct Orchestrator<'a> {
    layout: DirectoryLayout,
    catalog: Catalog,
    poller: Poller,
    collaborators: Collaborators<'a>,
}

impl<'a> Orchestrator<'a> {
    /// Assembles an orchestrator from its parts.
    #[must_use]
    pub fn new(
        layout: DirectoryLayout,
        catalog: Catalog,
        poller: Poller,
        collaborators: Collaborators<'a>,
    ) -> Self {
        Self {
            layout,
            catalog,
            poller,
            collaborators,
        }
    }

    /// Declares the groups for `config` over an already resolved layout.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::UnsupportedTopology`] for three zones.
    pub fn from_config(
        config: &Config,
        layout: DirectoryLayout,
        collaborators: Collaborators<'a>,
    ) -> Result<Self, OrchestratorError> {
        let settings = CatalogSettings {
            topology: config.topology(),
            consul_binary: config.consul_binary().to_path_buf(),
            kafka_home: config.kafka_home().to_path_buf(),
        };
        let catalog = Catalog::build(&layout, &settings)?;
        let poller = Poller::new(
            config.poll_interval(),
            config.readiness_timeout(),
            config.settle_interval(),
        );
        Ok(Self::new(layout, catalog, poller, collaborators))
    }

    /// Paths the orchestrator works under.
    #[must_use]
    pub const fn layout(&self) -> &DirectoryLayout {
        &self.layout
    }

    fn runtime(&self) -> Runtime<'_> {
        Runtime {
            launcher: self.collaborators.launcher,
            reaper: self.collaborators.reaper,
            client: self.collaborators.client,
            commands: self.collaborators.commands,
            reporter: self.collaborators.reporter,
            poller: &self.poller,
        }
    }

    fn group(&self, name: GroupName) -> Result<&crate::service::ServiceGroup, OrchestratorError> {
        self.catalog
            .group(name)
            .ok_or(OrchestratorError::UnknownGroup { group: name })
    }

    /// Creates the scratch directories and runs every step in order.
    ///
    /// # Errors
    ///
    /// Stops at the first failing start; steps after it are not run.
    pub fn execute(&self, plan: &ExecutionPlan) -> Result<(), OrchestratorError> {
        self.collaborators.reporter.layout_resolved(&self.layout);
        self.layout.create_dirs()?;
        for step in plan.steps() {
            match *step {
                Step::Start(group) => self.start_group(group)?,
                Step::Stop(group) => self.stop_group(group)?,
            }
        }
        info!(target: ORCHESTRATOR_TARGET, steps = plan.steps().len(), "plan executed");
        Ok(())
    }

    /// Starts one group.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::Service`] when a member fails.
    pub fn start_group(&self, name: GroupName) -> Result<(), OrchestratorError> {
        self.group(name)?
            .start(&self.runtime())
            .map_err(|source| OrchestratorError::Service { group: name, source })
    }

    /// Stops one group. Teardown itself never fails.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::UnknownGroup`] for undeclared groups.
    pub fn stop_group(&self, name: GroupName) -> Result<(), OrchestratorError> {
        self.group(name)?.stop(&self.runtime());
        Ok(())
    }

    /// Removes the scratch, log and pid directories.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::Layout`] when a directory cannot be
    /// removed.
    pub fn teardown(&self) -> Result<(), OrchestratorError> {
        self.collaborators.reporter.teardown(&self.layout);
        self.layout.remove_dirs()?;
        Ok(())
    }
}
