//! Lifecycle event reporting for operators.

use std::io::Write;
use std::sync::{Arc, Mutex, PoisonError};

use crate::layout::DirectoryLayout;
use crate::process::RunningProcess;
use crate::service::{GroupName, ServiceSpec};

const LIFECYCLE_TARGET: &str = "vstart_engine::lifecycle";

/// Observer notified as services move through their lifecycle.
pub trait LifecycleReporter: Send + Sync {
    /// The deployment layout has been resolved.
    fn layout_resolved(&self, layout: &DirectoryLayout);

    /// A service is about to be prepared and launched.
    fn service_starting(&self, spec: &ServiceSpec);

    /// A service process has been detached.
    fn service_launched(&self, spec: &ServiceSpec, process: RunningProcess);

    /// Readiness polling for a service begins.
    fn service_checking(&self, spec: &ServiceSpec);

    /// A service reported healthy.
    fn service_ready(&self, spec: &ServiceSpec);

    /// A group-level readiness check begins.
    fn group_checking(&self, group: GroupName);

    /// A group-level readiness check passed.
    fn group_ready(&self, group: GroupName);

    /// A service is about to be killed.
    fn service_stopping(&self, spec: &ServiceSpec);

    /// The scratch directories are about to be removed.
    fn teardown(&self, layout: &DirectoryLayout);
}

impl<T> LifecycleReporter for Arc<T>
where
    T: LifecycleReporter + ?Sized,
{
    fn layout_resolved(&self, layout: &DirectoryLayout) {
        (**self).layout_resolved(layout);
    }

    fn service_starting(&self, spec: &ServiceSpec) {
        (**self).service_starting(spec);
    }

    fn service_launched(&self, spec: &ServiceSpec, process: RunningProcess) {
        (**self).service_launched(spec, process);
    }

    fn service_checking(&self, spec: &ServiceSpec) {
        (**self).service_checking(spec);
    }

    fn service_ready(&self, spec: &ServiceSpec) {
        (**self).service_ready(spec);
    }

    fn group_checking(&self, group: GroupName) {
        (**self).group_checking(group);
    }

    fn group_ready(&self, group: GroupName) {
        (**self).group_ready(group);
    }

    fn service_stopping(&self, spec: &ServiceSpec) {
        (**self).service_stopping(spec);
    }

    fn teardown(&self, layout: &DirectoryLayout) {
        (**self).teardown(layout);
    }
}

/// Reporter that records lifecycle events using `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuredReporter;

impl StructuredReporter {
    /// Builds a new reporter.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl LifecycleReporter for StructuredReporter {
    fn layout_resolved(&self, layout: &DirectoryLayout) {
        tracing::info!(
            target: LIFECYCLE_TARGET,
            event = "layout_resolved",
            bin_dir = %layout.bin_dir(),
            config_dir = %layout.config_dir(),
            log_dir = %layout.log_dir(),
            "deployment layout resolved"
        );
    }

    fn service_starting(&self, spec: &ServiceSpec) {
        tracing::info!(
            target: LIFECYCLE_TARGET,
            event = "service_starting",
            service = spec.name(),
            "starting service"
        );
    }

    fn service_launched(&self, spec: &ServiceSpec, process: RunningProcess) {
        tracing::info!(
            target: LIFECYCLE_TARGET,
            event = "service_launched",
            service = spec.name(),
            pid = process.pid(),
            log = %spec.log_path(),
            "service launched"
        );
    }

    fn service_checking(&self, spec: &ServiceSpec) {
        tracing::info!(
            target: LIFECYCLE_TARGET,
            event = "service_checking",
            service = spec.name(),
            "waiting for service readiness"
        );
    }

    fn service_ready(&self, spec: &ServiceSpec) {
        tracing::info!(
            target: LIFECYCLE_TARGET,
            event = "service_ready",
            service = spec.name(),
            "service ready"
        );
    }

    fn group_checking(&self, group: GroupName) {
        tracing::info!(
            target: LIFECYCLE_TARGET,
            event = "group_checking",
            group = %group,
            "waiting for group readiness"
        );
    }

    fn group_ready(&self, group: GroupName) {
        tracing::info!(
            target: LIFECYCLE_TARGET,
            event = "group_ready",
            group = %group,
            "group ready"
        );
    }

    fn service_stopping(&self, spec: &ServiceSpec) {
        tracing::info!(
            target: LIFECYCLE_TARGET,
            event = "service_stopping",
            service = spec.name(),
            token = spec.token(),
            "stopping service"
        );
    }

    fn teardown(&self, layout: &DirectoryLayout) {
        tracing::info!(
            target: LIFECYCLE_TARGET,
            event = "teardown",
            lib_dir = %layout.lib_dir(),
            log_dir = %layout.log_dir(),
            "removing scratch directories"
        );
    }
}

/// Prints progress lines to a writer and mirrors them through
/// [`StructuredReporter`].
#[derive(Debug)]
pub struct ConsoleReporter<W> {
    out: Mutex<W>,
    structured: StructuredReporter,
}

impl<W: Write + Send> ConsoleReporter<W> {
    /// Wraps `out`.
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
            structured: StructuredReporter::new(),
        }
    }

    /// Returns the wrapped writer.
    pub fn into_inner(self) -> W {
        self.out.into_inner().unwrap_or_else(PoisonError::into_inner)
    }

    fn line(&self, text: std::fmt::Arguments<'_>) {
        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(error) = writeln!(out, "{text}").and_then(|()| out.flush()) {
            tracing::debug!(target: LIFECYCLE_TARGET, %error, "failed to write progress line");
        }
    }
}

impl<W: Write + Send> LifecycleReporter for ConsoleReporter<W> {
    fn layout_resolved(&self, layout: &DirectoryLayout) {
        self.line(format_args!(
            "Using configuration directory: {}",
            layout.config_tag()
        ));
        self.structured.layout_resolved(layout);
    }

    fn service_starting(&self, spec: &ServiceSpec) {
        self.line(format_args!("starting {} ...", spec.label()));
        self.structured.service_starting(spec);
    }

    fn service_launched(&self, spec: &ServiceSpec, process: RunningProcess) {
        self.structured.service_launched(spec, process);
    }

    fn service_checking(&self, spec: &ServiceSpec) {
        self.line(format_args!("checking {} ...", spec.label()));
        self.structured.service_checking(spec);
    }

    fn service_ready(&self, spec: &ServiceSpec) {
        self.line(format_args!("{} started", spec.label()));
        self.structured.service_ready(spec);
    }

    fn group_checking(&self, group: GroupName) {
        self.line(format_args!("checking {group} ..."));
        self.structured.group_checking(group);
    }

    fn group_ready(&self, group: GroupName) {
        self.line(format_args!("{group} started"));
        self.structured.group_ready(group);
    }

    fn service_stopping(&self, spec: &ServiceSpec) {
        self.line(format_args!("stopping {} ...", spec.token()));
        self.structured.service_stopping(spec);
    }

    fn teardown(&self, layout: &DirectoryLayout) {
        self.line(format_args!("removing all directories ..."));
        self.structured.teardown(layout);
    }
}

#[cfg(test)]
mod tests {
    use camino::{Utf8Path, Utf8PathBuf};
    use rstest::rstest;
    use vstart_config::{ClusterVersion, Topology};

    use super::*;

    fn spec() -> ServiceSpec {
        ServiceSpec::new(
            "blobnode-z1",
            "blobnode",
            "blobnode-z1.json",
            Some(Utf8PathBuf::from("/srv/cfg/blobnode-z1.json")),
            Utf8PathBuf::from("/srv/run/log/blobnode-z1-start.log"),
        )
    }

    #[rstest]
    fn prints_progress_lines_by_service_type() {
        let layout =
            DirectoryLayout::resolve(Utf8Path::new("/srv/vs"), ClusterVersion::V1_4, Topology::Two)
                .expect("resolve layout");
        let reporter = ConsoleReporter::new(Vec::new());
        let spec = spec();

        reporter.layout_resolved(&layout);
        reporter.service_starting(&spec);
        reporter.service_launched(&spec, RunningProcess::new(77));
        reporter.service_checking(&spec);
        reporter.service_ready(&spec);
        reporter.group_checking(GroupName::ClusterMgr);
        reporter.group_ready(GroupName::ClusterMgr);
        reporter.service_stopping(&spec);
        reporter.teardown(&layout);

        let output = String::from_utf8(reporter.into_inner()).expect("utf-8 output");
        assert_eq!(
            output,
            "Using configuration directory: cfg-1.4.x/az-two\n\
             starting blobnode ...\n\
             checking blobnode ...\n\
             blobnode started\n\
             checking clustermgr ...\n\
             clustermgr started\n\
             stopping blobnode-z1.json ...\n\
             removing all directories ...\n"
        );
    }
}
