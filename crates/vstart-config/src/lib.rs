//! Shared configuration for the `vstart` local cluster orchestrator.
//!
//! Configuration is layered by `ortho_config`: built-in defaults, an optional
//! TOML file (`--config-path` or `VSTART_CONFIG_PATH`), `VSTART_*`
//! environment variables, and finally command-line flags. The resulting
//! [`Config`] selects the cluster deployment (version and availability-zone
//! topology), the install root the directory layout is derived from, the
//! locations of the third-party dependency binaries, and the telemetry
//! settings.

use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};

mod cluster;
mod defaults;
mod logging;

pub use cluster::{ClusterVersion, ReapStrategy, Topology};
pub use defaults::{
    DEFAULT_CONSUL_BINARY, DEFAULT_KAFKA_HOME, DEFAULT_LOG_FILTER, DEFAULT_POLL_INTERVAL_MS,
    DEFAULT_SETTLE_INTERVAL_MS, default_consul_binary, default_install_root, default_kafka_home,
    default_log_filter, default_log_filter_string, default_log_format, default_poll_interval_ms,
    default_settle_interval_ms,
};
pub use logging::{LogFormat, LogFormatParseError};

/// Layered runtime configuration for `vstart`.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq, OrthoConfig)]
#[ortho_config(prefix = "VSTART")]
pub struct Config {
    /// Directory containing the `run/` scratch tree and `cfg-*` directories.
    #[serde(default = "default_install_root")]
    #[ortho_config(default = default_install_root())]
    pub install_root: Utf8PathBuf,
    /// Overrides the blobstore binary directory derived from the install root.
    #[serde(default)]
    pub bin_dir: Option<Utf8PathBuf>,
    /// Release line whose configuration set is used.
    #[serde(default)]
    #[ortho_config(default = ClusterVersion::default())]
    pub cluster_version: ClusterVersion,
    /// Availability-zone topology to deploy.
    #[serde(default)]
    #[ortho_config(default = Topology::default())]
    pub az_num: Topology,
    /// Path of the consul agent binary.
    #[serde(default = "default_consul_binary")]
    #[ortho_config(default = default_consul_binary())]
    pub consul_binary: Utf8PathBuf,
    /// Root of the kafka distribution.
    #[serde(default = "default_kafka_home")]
    #[ortho_config(default = default_kafka_home())]
    pub kafka_home: Utf8PathBuf,
    /// `tracing` filter expression for diagnostic logs.
    #[serde(default = "default_log_filter_string")]
    #[ortho_config(default = default_log_filter_string())]
    pub log_filter: String,
    /// Output format for diagnostic logs.
    #[serde(default = "default_log_format")]
    #[ortho_config(default = default_log_format())]
    pub log_format: LogFormat,
    /// Interval between readiness probes.
    #[serde(default = "default_poll_interval_ms")]
    #[ortho_config(default = default_poll_interval_ms())]
    pub poll_interval_ms: u64,
    /// Pause used in place of a readiness probe.
    #[serde(default = "default_settle_interval_ms")]
    #[ortho_config(default = default_settle_interval_ms())]
    pub settle_interval_ms: u64,
    /// Upper bound on any single readiness wait. Unset waits forever.
    #[serde(default)]
    pub readiness_timeout_secs: Option<u64>,
    /// How `stop` finds the processes to terminate.
    #[serde(default)]
    #[ortho_config(default = ReapStrategy::default())]
    pub reap_strategy: ReapStrategy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            install_root: default_install_root(),
            bin_dir: None,
            cluster_version: ClusterVersion::default(),
            az_num: Topology::default(),
            consul_binary: default_consul_binary(),
            kafka_home: default_kafka_home(),
            log_filter: default_log_filter_string(),
            log_format: default_log_format(),
            poll_interval_ms: default_poll_interval_ms(),
            settle_interval_ms: default_settle_interval_ms(),
            readiness_timeout_secs: None,
            reap_strategy: ReapStrategy::default(),
        }
    }
}

impl Config {
    /// Directory the layout is resolved against.
    #[must_use]
    pub fn install_root(&self) -> &Utf8Path {
        self.install_root.as_path()
    }

    /// Explicit binary directory, when configured.
    #[must_use]
    pub fn bin_dir(&self) -> Option<&Utf8Path> {
        self.bin_dir.as_deref()
    }

    /// Selected release line.
    #[must_use]
    pub const fn cluster_version(&self) -> ClusterVersion {
        self.cluster_version
    }

    /// Selected availability-zone topology.
    #[must_use]
    pub const fn topology(&self) -> Topology {
        self.az_num
    }

    /// Consul agent binary.
    #[must_use]
    pub fn consul_binary(&self) -> &Utf8Path {
        self.consul_binary.as_path()
    }

    /// Kafka distribution root.
    #[must_use]
    pub fn kafka_home(&self) -> &Utf8Path {
        self.kafka_home.as_path()
    }

    /// Log filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        self.log_filter.as_str()
    }

    /// Log output format.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Interval between readiness probes.
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Pause standing in for readiness on probe-less services.
    #[must_use]
    pub const fn settle_interval(&self) -> Duration {
        Duration::from_millis(self.settle_interval_ms)
    }

    /// Optional deadline applied to each readiness wait.
    #[must_use]
    pub fn readiness_timeout(&self) -> Option<Duration> {
        self.readiness_timeout_secs.map(Duration::from_secs)
    }

    /// Teardown strategy.
    #[must_use]
    pub const fn reap_strategy(&self) -> ReapStrategy {
        self.reap_strategy
    }
}
