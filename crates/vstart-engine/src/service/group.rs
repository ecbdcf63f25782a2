//! Ordered groups of services sharing a role.

use strum::{Display, EnumIter, EnumString};
use tracing::debug;

use super::{Runtime, Service, ServiceError};
use crate::probe::{CLUSTERMGR_STAT_URL, raft_member_ready};

const GROUP_TARGET: &str = "vstart_engine::group";

/// Primitive service groups that can be targeted on their own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumString, EnumIter)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum GroupName {
    /// Coordination service.
    Consul,
    /// Message broker.
    Kafka,
    /// Metadata quorum.
    ClusterMgr,
    /// Storage nodes.
    BlobNode,
    /// Shard nodes.
    ShardNode,
    /// Routing proxy.
    Proxy,
    /// Background task scheduler.
    Scheduler,
    /// Front-door access service.
    Access,
}

/// Error returned when parsing an unknown group name.
pub type GroupNameParseError = strum::ParseError;

/// Readiness check run once after every member of a group has launched.
pub trait GroupHook: Send + Sync {
    /// Blocks until the group as a whole is healthy.
    ///
    /// # Errors
    ///
    /// Fails only when the poller's deadline expires.
    fn wait(&self, group: GroupName, rt: &Runtime<'_>) -> Result<(), ServiceError>;
}

/// Waits until the first metadata replica reports a raft quorum role.
#[derive(Debug, Default, Clone, Copy)]
pub struct QuorumHook;

impl GroupHook for QuorumHook {
    fn wait(&self, group: GroupName, rt: &Runtime<'_>) -> Result<(), ServiceError> {
        rt.poller.wait_until(&group.to_string(), || {
            rt.client
                .get_json(CLUSTERMGR_STAT_URL)
                .is_some_and(|body| raft_member_ready(&body))
        })?;
        Ok(())
    }
}

/// Services of one role, started first to last and stopped last to first.
pub struct ServiceGroup {
    name: GroupName,
    members: Vec<Service>,
    hook: Option<Box<dyn GroupHook>>,
}

impl ServiceGroup {
    /// Builds a group without a group-level readiness check.
    #[must_use]
    pub fn new(name: GroupName, members: Vec<Service>) -> Self {
        Self {
            name,
            members,
            hook: None,
        }
    }

    /// Attaches a readiness check run after the last member launched.
    #[must_use]
    pub fn with_hook(mut self, hook: impl GroupHook + 'static) -> Self {
        self.hook = Some(Box::new(hook));
        self
    }

    /// Group identifier.
    #[must_use]
    pub const fn name(&self) -> GroupName {
        self.name
    }

    /// Members in start order.
    #[must_use]
    pub fn members(&self) -> &[Service] {
        &self.members
    }

    /// Member names in start order.
    pub fn start_order(&self) -> impl Iterator<Item = &str> {
        self.members.iter().map(|service| service.spec().name())
    }

    /// Member names in stop order, the exact reverse of [`Self::start_order`].
    pub fn stop_order(&self) -> impl Iterator<Item = &str> {
        self.members.iter().rev().map(|service| service.spec().name())
    }

    /// Prepares, launches and awaits each member in order, then runs the
    /// group hook once.
    ///
    /// # Errors
    ///
    /// The first failing member aborts the group; later members are not
    /// started.
    pub fn start(&self, rt: &Runtime<'_>) -> Result<(), ServiceError> {
        debug!(target: GROUP_TARGET, group = %self.name, members = self.members.len(), "starting group");
        for service in &self.members {
            let spec = service.spec();
            let kind = service.kind();
            rt.reporter.service_starting(spec);
            let argv = kind.prepare(spec, rt)?;
            let process = rt.launcher.launch(&argv, spec.log_path())?;
            rt.reporter.service_launched(spec, process);
            rt.reaper.track(spec, process)?;
            if kind.announces_readiness() {
                rt.reporter.service_checking(spec);
                kind.check_ready(spec, rt)?;
                rt.reporter.service_ready(spec);
            } else {
                kind.check_ready(spec, rt)?;
            }
        }
        if let Some(hook) = &self.hook {
            rt.reporter.group_checking(self.name);
            hook.wait(self.name, rt)?;
            rt.reporter.group_ready(self.name);
        }
        Ok(())
    }

    /// Kills each member in reverse order. Never fails.
    pub fn stop(&self, rt: &Runtime<'_>) {
        debug!(target: GROUP_TARGET, group = %self.name, "stopping group");
        for service in self.members.iter().rev() {
            rt.reporter.service_stopping(service.spec());
            rt.reaper.stop(service.spec());
        }
    }
}

impl std::fmt::Debug for ServiceGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceGroup")
            .field("name", &self.name)
            .field("members", &self.members)
            .field("hook", &self.hook.is_some())
            .finish()
    }
}
