//! Declares the service groups of a deployment.

use std::collections::BTreeMap;

use camino::{Utf8Path, Utf8PathBuf};
use vstart_config::Topology;

use super::OrchestratorError;
use crate::layout::DirectoryLayout;
use crate::service::{
    Access, BlobNode, ClusterMgr, Consul, GroupName, Kafka, Proxy, QuorumHook, Scheduler, Service,
    ServiceGroup, ServiceKind, ServiceSpec, ShardNode,
};

/// Inputs that shape the catalogue beyond the layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogSettings {
    /// Availability-zone topology.
    pub topology: Topology,
    /// Consul agent binary; doubles as the consul teardown token.
    pub consul_binary: Utf8PathBuf,
    /// Kafka distribution root; doubles as the kafka teardown token.
    pub kafka_home: Utf8PathBuf,
}

/// Every declared group, keyed by name.
#[derive(Debug)]
pub struct Catalog {
    groups: BTreeMap<GroupName, ServiceGroup>,
}

impl Catalog {
    /// Builds the groups for `settings.topology`.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::UnsupportedTopology`] for three zones.
    pub fn build(layout: &DirectoryLayout, settings: &CatalogSettings) -> Result<Self, OrchestratorError> {
        let blobnodes: &[&str] = match settings.topology {
            Topology::One => &["blobnode"],
            Topology::Two => &["blobnode-z0", "blobnode-z1"],
            Topology::Three => {
                return Err(OrchestratorError::UnsupportedTopology {
                    topology: settings.topology,
                });
            }
        };
        let builder = Builder { layout };
        let groups = [
            ServiceGroup::new(
                GroupName::Consul,
                vec![builder.external(
                    "consul",
                    &settings.consul_binary,
                    Consul::new(settings.consul_binary.clone()),
                )],
            ),
            ServiceGroup::new(
                GroupName::Kafka,
                vec![builder.external(
                    "kafka",
                    &settings.kafka_home,
                    Kafka::new(settings.kafka_home.clone()),
                )],
            ),
            ServiceGroup::new(
                GroupName::ClusterMgr,
                ["clustermgr1", "clustermgr2", "clustermgr3"]
                    .into_iter()
                    .map(|name| builder.blobstore(name, "clustermgr", ClusterMgr::new(layout.binary("clustermgr"))))
                    .collect(),
            )
            .with_hook(QuorumHook),
            ServiceGroup::new(
                GroupName::BlobNode,
                blobnodes
                    .iter()
                    .map(|name| builder.blobstore(name, "blobnode", BlobNode::new(layout.binary("blobnode"))))
                    .collect(),
            ),
            ServiceGroup::new(
                GroupName::ShardNode,
                vec![builder.blobstore("shardnode", "shardnode", ShardNode::new(layout.binary("shardnode")))],
            ),
            ServiceGroup::new(
                GroupName::Proxy,
                vec![builder.blobstore(
                    "proxy",
                    "proxy",
                    Proxy::new(layout.binary("proxy"), settings.topology.code_mode()),
                )],
            ),
            ServiceGroup::new(
                GroupName::Scheduler,
                vec![builder.blobstore("scheduler", "scheduler", Scheduler::new(layout.binary("scheduler")))],
            ),
            ServiceGroup::new(
                GroupName::Access,
                vec![builder.blobstore("access", "access", Access::new(layout.binary("access")))],
            ),
        ];
        Ok(Self::from_groups(groups))
    }

    /// Wraps pre-built groups.
    #[must_use]
    pub fn from_groups(groups: impl IntoIterator<Item = ServiceGroup>) -> Self {
        Self {
            groups: groups.into_iter().map(|group| (group.name(), group)).collect(),
        }
    }

    /// Looks up a group.
    #[must_use]
    pub fn group(&self, name: GroupName) -> Option<&ServiceGroup> {
        self.groups.get(&name)
    }
}

struct Builder<'a> {
    layout: &'a DirectoryLayout,
}

impl Builder<'_> {
    /// Third-party dependency identified by its install path.
    fn external(&self, name: &'static str, token: &Utf8Path, kind: impl ServiceKind + 'static) -> Service {
        Service::new(
            ServiceSpec::new(name, name, token.as_str(), None, self.layout.log_file(name)),
            kind,
        )
    }

    /// Blobstore binary identified by its configuration document.
    fn blobstore(&self, name: &str, label: &'static str, kind: impl ServiceKind + 'static) -> Service {
        let document = format!("{name}.json");
        Service::new(
            ServiceSpec::new(
                name,
                label,
                document.as_str(),
                Some(self.layout.config_file(&document)),
                self.layout.log_file(name),
            ),
            kind,
        )
    }
}
