//! Recording doubles for the engine's collaborator traits.

use std::io;
use std::sync::{Arc, Mutex};

use camino::{Utf8Path, Utf8PathBuf};
use serde_json::Value;

use crate::exec::{CommandError, CommandRunner};
use crate::layout::DirectoryLayout;
use crate::probe::StatusClient;
use crate::process::{LaunchError, Launcher, Reaper, RunningProcess};
use crate::reporter::LifecycleReporter;
use crate::service::{GroupName, ServiceSpec};

/// One recorded launch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Launch {
    pub argv: Vec<String>,
    pub log: Utf8PathBuf,
}

impl Launch {
    /// Service instance name recovered from the `<name>-start.log` path.
    pub fn service(&self) -> String {
        self.log
            .file_name()
            .and_then(|file| file.strip_suffix("-start.log"))
            .unwrap_or_default()
            .to_owned()
    }
}

/// Records launches instead of forking.
#[derive(Debug, Default)]
pub struct RecordingLauncher {
    launches: Mutex<Vec<Launch>>,
    failing_token: Mutex<Option<String>>,
}

impl RecordingLauncher {
    pub fn launches(&self) -> Vec<Launch> {
        self.launches.lock().expect("launch log poisoned").clone()
    }

    pub fn launched_services(&self) -> Vec<String> {
        self.launches().iter().map(Launch::service).collect()
    }

    /// Whether any recorded command line mentions `token`.
    pub fn has_launched(&self, token: &str) -> bool {
        self.launches()
            .iter()
            .any(|launch| launch.argv.iter().any(|arg| arg.contains(token)))
    }

    /// Makes launches whose command line mentions `token` fail.
    pub fn fail_on(&self, token: &str) {
        *self.failing_token.lock().expect("launcher poisoned") = Some(token.to_owned());
    }
}

impl Launcher for RecordingLauncher {
    fn launch(&self, argv: &[String], log_path: &Utf8Path) -> Result<RunningProcess, LaunchError> {
        let program = argv.first().cloned().unwrap_or_default();
        if let Some(token) = self.failing_token.lock().expect("launcher poisoned").as_deref()
            && argv.iter().any(|arg| arg.contains(token))
        {
            return Err(LaunchError::Exec {
                program,
                source: io::Error::from(io::ErrorKind::NotFound),
            });
        }
        let mut launches = self.launches.lock().expect("launch log poisoned");
        launches.push(Launch {
            argv: argv.to_vec(),
            log: log_path.to_path_buf(),
        });
        let pid = 1000 + u32::try_from(launches.len()).expect("launch count fits u32");
        Ok(RunningProcess::new(pid))
    }
}

/// Records stop and track requests.
#[derive(Debug, Default)]
pub struct RecordingReaper {
    stopped: Mutex<Vec<String>>,
    tracked: Mutex<Vec<(String, u32)>>,
}

impl RecordingReaper {
    pub fn stopped(&self) -> Vec<String> {
        self.stopped.lock().expect("reaper poisoned").clone()
    }

    pub fn tracked(&self) -> Vec<(String, u32)> {
        self.tracked.lock().expect("reaper poisoned").clone()
    }
}

impl Reaper for RecordingReaper {
    fn track(&self, spec: &ServiceSpec, process: RunningProcess) -> Result<(), LaunchError> {
        self.tracked
            .lock()
            .expect("reaper poisoned")
            .push((spec.name().to_owned(), process.pid()));
        Ok(())
    }

    fn stop(&self, spec: &ServiceSpec) {
        self.stopped
            .lock()
            .expect("reaper poisoned")
            .push(spec.name().to_owned());
    }
}

/// Lifecycle events captured by [`RecordingReporter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    LayoutResolved,
    Starting(String),
    Launched(String),
    Checking(String),
    Ready(String),
    GroupChecking(GroupName),
    GroupReady(GroupName),
    Stopping(String),
    Teardown,
}

#[derive(Debug, Default)]
pub struct RecordingReporter {
    events: Mutex<Vec<LifecycleEvent>>,
}

impl RecordingReporter {
    pub fn events(&self) -> Vec<LifecycleEvent> {
        self.events.lock().expect("reporter poisoned").clone()
    }

    fn record(&self, event: LifecycleEvent) {
        self.events.lock().expect("reporter poisoned").push(event);
    }

    /// Index of the first event equal to `event`.
    pub fn position(&self, event: &LifecycleEvent) -> Option<usize> {
        self.events().iter().position(|recorded| recorded == event)
    }
}

impl LifecycleReporter for RecordingReporter {
    fn layout_resolved(&self, _layout: &DirectoryLayout) {
        self.record(LifecycleEvent::LayoutResolved);
    }

    fn service_starting(&self, spec: &ServiceSpec) {
        self.record(LifecycleEvent::Starting(spec.name().to_owned()));
    }

    fn service_launched(&self, spec: &ServiceSpec, _process: RunningProcess) {
        self.record(LifecycleEvent::Launched(spec.name().to_owned()));
    }

    fn service_checking(&self, spec: &ServiceSpec) {
        self.record(LifecycleEvent::Checking(spec.name().to_owned()));
    }

    fn service_ready(&self, spec: &ServiceSpec) {
        self.record(LifecycleEvent::Ready(spec.name().to_owned()));
    }

    fn group_checking(&self, group: GroupName) {
        self.record(LifecycleEvent::GroupChecking(group));
    }

    fn group_ready(&self, group: GroupName) {
        self.record(LifecycleEvent::GroupReady(group));
    }

    fn service_stopping(&self, spec: &ServiceSpec) {
        self.record(LifecycleEvent::Stopping(spec.name().to_owned()));
    }

    fn teardown(&self, _layout: &DirectoryLayout) {
        self.record(LifecycleEvent::Teardown);
    }
}

#[derive(Debug, Clone)]
struct Rule {
    url: String,
    body: Value,
    gate: Option<String>,
}

/// Status client answering from a fixed table of URL rules.
///
/// A gated rule only answers once a launched command line mentions its gate
/// token, which lets scenarios model services that become healthy late.
#[derive(Debug)]
pub struct ScriptedStatusClient {
    launcher: Arc<RecordingLauncher>,
    rules: Mutex<Vec<Rule>>,
    requests: Mutex<Vec<String>>,
}

impl ScriptedStatusClient {
    pub fn new(launcher: Arc<RecordingLauncher>) -> Self {
        Self {
            launcher,
            rules: Mutex::default(),
            requests: Mutex::default(),
        }
    }

    pub fn respond(&self, url: &str, body: Value) {
        self.push(url, body, None);
    }

    pub fn respond_after_launch(&self, url: &str, body: Value, token: &str) {
        self.push(url, body, Some(token.to_owned()));
    }

    fn push(&self, url: &str, body: Value, gate: Option<String>) {
        self.rules.lock().expect("client poisoned").push(Rule {
            url: url.to_owned(),
            body,
            gate,
        });
    }

    /// Number of requests made against `url`.
    pub fn requests_to(&self, url: &str) -> usize {
        self.requests
            .lock()
            .expect("client poisoned")
            .iter()
            .filter(|requested| *requested == url)
            .count()
    }
}

impl StatusClient for ScriptedStatusClient {
    fn get_json(&self, url: &str) -> Option<Value> {
        self.requests.lock().expect("client poisoned").push(url.to_owned());
        self.rules
            .lock()
            .expect("client poisoned")
            .iter()
            .find(|rule| {
                rule.url == url
                    && rule
                        .gate
                        .as_deref()
                        .is_none_or(|token| self.launcher.has_launched(token))
            })
            .map(|rule| rule.body.clone())
    }
}

/// Command runner whose helper commands always succeed.
#[derive(Debug, Default)]
pub struct StubCommands {
    runs: Mutex<Vec<Vec<String>>>,
}

impl StubCommands {
    pub fn runs(&self) -> Vec<Vec<String>> {
        self.runs.lock().expect("commands poisoned").clone()
    }
}

impl CommandRunner for StubCommands {
    fn output(&self, argv: &[String]) -> Result<String, CommandError> {
        self.runs.lock().expect("commands poisoned").push(argv.to_vec());
        Ok("stub-cluster-id\n".to_owned())
    }

    fn succeeds(&self, argv: &[String]) -> bool {
        self.runs.lock().expect("commands poisoned").push(argv.to_vec());
        true
    }
}
