//! Targets, actions and their flattening into an ordered execution plan.

use std::str::FromStr;

use strum::{Display, EnumString};
use thiserror::Error;

use crate::service::GroupName;

/// Named ordered collections of groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Composite {
    /// Third-party dependencies.
    Depends,
    /// The blobstore services proper.
    Blobstore,
    /// Dependencies followed by the blobstore services.
    All,
}

const DEPENDS: &[GroupName] = &[GroupName::Consul, GroupName::Kafka];
const BLOBSTORE: &[GroupName] = &[
    GroupName::ClusterMgr,
    GroupName::BlobNode,
    GroupName::Proxy,
    GroupName::Scheduler,
    GroupName::Access,
];
const ALL: &[GroupName] = &[
    GroupName::Consul,
    GroupName::Kafka,
    GroupName::ClusterMgr,
    GroupName::BlobNode,
    GroupName::Proxy,
    GroupName::Scheduler,
    GroupName::Access,
];

impl Composite {
    /// Member groups in start order.
    #[must_use]
    pub const fn groups(self) -> &'static [GroupName] {
        match self {
            Self::Depends => DEPENDS,
            Self::Blobstore => BLOBSTORE,
            Self::All => ALL,
        }
    }
}

/// Something `--start`, `--stop` or `--restart` can name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Target {
    /// A single primitive group.
    Group(GroupName),
    /// A composite of groups.
    Composite(Composite),
}

/// The target named neither a group nor a composite.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown service '{0}'")]
pub struct UnknownTarget(
    /// Rejected name.
    pub String,
);

impl FromStr for Target {
    type Err = UnknownTarget;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        if let Ok(composite) = text.parse::<Composite>() {
            return Ok(Self::Composite(composite));
        }
        text.parse::<GroupName>()
            .map(Self::Group)
            .map_err(|_| UnknownTarget(text.to_owned()))
    }
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Group(group) => group.fmt(f),
            Self::Composite(composite) => composite.fmt(f),
        }
    }
}

impl Target {
    /// Groups covered by the target, in start order.
    #[must_use]
    pub fn groups(self) -> Vec<GroupName> {
        match self {
            Self::Group(group) => vec![group],
            Self::Composite(composite) => composite.groups().to_vec(),
        }
    }
}

/// Lifecycle verb applied to a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum Action {
    /// Start the target's groups in order.
    Start,
    /// Stop the target's groups in reverse order.
    Stop,
    /// Stop, then start.
    Restart,
}

/// One requested action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Request {
    /// Verb.
    pub action: Action,
    /// Object.
    pub target: Target,
}

impl Request {
    /// Pairs a verb with its object.
    #[must_use]
    pub const fn new(action: Action, target: Target) -> Self {
        Self { action, target }
    }
}

/// A single group-level operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    /// Start a group.
    Start(GroupName),
    /// Stop a group.
    Stop(GroupName),
}

/// Flattened sequence of group operations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionPlan {
    steps: Vec<Step>,
}

impl ExecutionPlan {
    /// Flattens requests in the order given.
    #[must_use]
    pub fn from_requests(requests: &[Request]) -> Self {
        let mut steps = Vec::new();
        for request in requests {
            let groups = request.target.groups();
            let stops = groups.iter().rev().copied().map(Step::Stop);
            let starts = groups.iter().copied().map(Step::Start);
            match request.action {
                Action::Start => steps.extend(starts),
                Action::Stop => steps.extend(stops),
                Action::Restart => {
                    steps.extend(stops);
                    steps.extend(starts);
                }
            }
        }
        Self { steps }
    }

    /// Steps in execution order.
    #[must_use]
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Whether the plan does nothing.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}
