//! Selectors describing which local cluster deployment to drive.
//!
//! The version and availability-zone topology together pick the
//! configuration directory (`cfg-<version>/az-<topology>`) and decide how many
//! storage-node instances the deployment contains.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Blobstore release line whose configuration set should be used.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    Deserialize,
    Serialize,
    PartialEq,
    Eq,
    Hash,
    EnumString,
    Display,
)]
#[strum(ascii_case_insensitive)]
pub enum ClusterVersion {
    /// The 1.4.x configuration set.
    #[default]
    #[serde(rename = "1.4.x")]
    #[strum(serialize = "1.4.x")]
    V1_4,
    /// The 1.5.x configuration set.
    #[serde(rename = "1.5.x")]
    #[strum(serialize = "1.5.x")]
    V1_5,
}

/// Number of availability zones the local deployment simulates.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    Deserialize,
    Serialize,
    PartialEq,
    Eq,
    Hash,
    EnumString,
    Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum Topology {
    /// A single availability zone.
    #[default]
    One,
    /// Two availability zones, one storage node per zone.
    Two,
    /// Three availability zones. Accepted by the parser but not deployable.
    Three,
}

impl Topology {
    /// Erasure code mode the proxy is expected to serve volumes for.
    #[must_use]
    pub const fn code_mode(self) -> u8 {
        match self {
            Self::Two => 4,
            Self::One | Self::Three => 11,
        }
    }
}

/// How `stop` locates the processes it terminates.
#[derive(
    Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum ReapStrategy {
    /// Kill every live process whose command line contains the service token.
    #[default]
    Token,
    /// Kill only the pid recorded when the service was launched.
    Pid,
}
