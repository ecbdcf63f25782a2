//! Built-in configuration defaults.

use std::env;

use camino::Utf8PathBuf;

use crate::logging::LogFormat;

/// Default log filter expression. Kept quiet so the progress lines printed by
/// the orchestrator are not drowned out on the terminal.
pub const DEFAULT_LOG_FILTER: &str = "warn";

/// Location of the consul agent binary used for the coordination service.
pub const DEFAULT_CONSUL_BINARY: &str = "/usr/bin/consul";

/// Installation directory of the kafka distribution.
pub const DEFAULT_KAFKA_HOME: &str = "/usr/bin/kafka_2.13-3.1.0";

/// Interval between readiness probes, in milliseconds.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1_000;

/// Pause standing in for readiness on services without a probe, in milliseconds.
pub const DEFAULT_SETTLE_INTERVAL_MS: u64 = 1_000;

/// Default log filter expression used by the binaries.
#[must_use]
pub const fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Owned log filter value used where allocation is required (e.g. serde).
#[must_use]
pub fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Default logging format for the binaries.
#[must_use]
pub const fn default_log_format() -> LogFormat {
    LogFormat::Compact
}

/// Owned consul binary path.
#[must_use]
pub fn default_consul_binary() -> Utf8PathBuf {
    Utf8PathBuf::from(DEFAULT_CONSUL_BINARY)
}

/// Owned kafka installation path.
#[must_use]
pub fn default_kafka_home() -> Utf8PathBuf {
    Utf8PathBuf::from(DEFAULT_KAFKA_HOME)
}

/// Readiness probe interval.
#[must_use]
pub const fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

/// Settle pause for probe-less services.
#[must_use]
pub const fn default_settle_interval_ms() -> u64 {
    DEFAULT_SETTLE_INTERVAL_MS
}

/// Directory the `run/` and `cfg-*` trees are resolved against: the one
/// holding the running executable, wherever it is invoked from.
///
/// Falls back to `.` when the executable path is unknown or not UTF-8; layout
/// resolution rejects the relative path later with a clear error.
#[must_use]
pub fn default_install_root() -> Utf8PathBuf {
    env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(ToOwned::to_owned))
        .and_then(|dir| Utf8PathBuf::from_path_buf(dir).ok())
        .unwrap_or_else(|| Utf8PathBuf::from("."))
}
