//! Shared world for the orchestration behaviour scenarios.

use std::fs;
use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};
use serde_json::{Value, json};
use tempfile::TempDir;
use vstart_config::{Config, Topology};

use super::fakes::{
    LifecycleEvent, RecordingLauncher, RecordingReaper, RecordingReporter, ScriptedStatusClient,
    StubCommands,
};
use crate::layout::DirectoryLayout;
use crate::orchestrator::{
    Collaborators, ExecutionPlan, Orchestrator, OrchestratorError, Request,
};
use crate::probe::{CLUSTERMGR_STAT_URL, CONSUL_LEADER_URL};
use crate::service::GroupName;

/// Service documents written under the configuration directory, with the
/// status path each one answers on.
const DOCUMENTS: [(&str, &str, &str); 7] = [
    ("blobnode", ":8899", "/stat"),
    ("blobnode-z0", ":8899", "/stat"),
    ("blobnode-z1", ":8900", "/stat"),
    ("shardnode", ":9100", "/blob/delete/stats"),
    ("proxy", ":9600", ""),
    ("scheduler", ":9800", "/stats"),
    ("access", ":9500", ""),
];

/// Drives an [`Orchestrator`] against recording collaborators rooted in a
/// temporary install directory.
pub struct TestWorld {
    _dir: TempDir,
    root: Utf8PathBuf,
    topology: Topology,
    requests: Vec<Request>,
    pub launcher: Arc<RecordingLauncher>,
    pub reaper: RecordingReaper,
    pub client: ScriptedStatusClient,
    pub commands: StubCommands,
    pub reporter: RecordingReporter,
    result: Option<Result<(), OrchestratorError>>,
}

impl TestWorld {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("create install root");
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf-8 temp path");
        let launcher = Arc::new(RecordingLauncher::default());
        Self {
            _dir: dir,
            root,
            topology: Topology::One,
            requests: Vec::new(),
            client: ScriptedStatusClient::new(Arc::clone(&launcher)),
            launcher,
            reaper: RecordingReaper::default(),
            commands: StubCommands::default(),
            reporter: RecordingReporter::default(),
            result: None,
        }
    }

    pub fn set_topology(&mut self, topology: Topology) {
        self.topology = topology;
    }

    pub fn push_request(&mut self, request: Request) {
        self.requests.push(request);
    }

    pub fn config(&self) -> Config {
        Config {
            install_root: self.root.clone(),
            az_num: self.topology,
            consul_binary: self.root.join("consul/consul"),
            kafka_home: self.root.join("kafka"),
            poll_interval_ms: 0,
            settle_interval_ms: 0,
            readiness_timeout_secs: Some(2),
            ..Config::default()
        }
    }

    pub fn layout(&self) -> DirectoryLayout {
        let config = self.config();
        DirectoryLayout::resolve(config.install_root(), config.cluster_version(), self.topology)
            .expect("resolve layout")
    }

    /// Writes every service document and a healthy answer for each probe.
    ///
    /// The quorum answer only appears once `clustermgr3.json` has launched.
    pub fn provision_healthy_cluster(&self) {
        let layout = self.layout();
        fs::create_dir_all(layout.config_dir()).expect("create config dir");
        for (name, bind_addr, status_path) in DOCUMENTS {
            let document = if name.starts_with("blobnode") {
                json!({
                    "bind_addr": bind_addr,
                    "disks": [{ "path": self.root.join("disks").join(name) }],
                })
            } else {
                json!({ "bind_addr": bind_addr })
            };
            write_document(&layout.config_file(&format!("{name}.json")), &document);
            if !status_path.is_empty() {
                self.client
                    .respond(&format!("http://127.0.0.1{bind_addr}{status_path}"), healthy_body(name));
            }
        }
        for code_mode in [Topology::One.code_mode(), Topology::Two.code_mode()] {
            self.client.respond(
                &format!("http://127.0.0.1:9600/volume/list?code_mode={code_mode}"),
                json!({ "vids": [1, 2] }),
            );
        }
        self.client.respond(CONSUL_LEADER_URL, json!("127.0.0.1:8300"));
        self.client.respond_after_launch(
            CLUSTERMGR_STAT_URL,
            json!({ "raft_status": { "raftState": "StateLeader" } }),
            "clustermgr3.json",
        );
    }

    fn with_orchestrator<T>(
        &self,
        run: impl FnOnce(&Orchestrator<'_>) -> Result<T, OrchestratorError>,
    ) -> Result<T, OrchestratorError> {
        let collaborators = Collaborators {
            launcher: &*self.launcher,
            reaper: &self.reaper,
            client: &self.client,
            commands: &self.commands,
            reporter: &self.reporter,
        };
        let orchestrator = Orchestrator::from_config(&self.config(), self.layout(), collaborators)?;
        run(&orchestrator)
    }

    pub fn start_group(&mut self, group: GroupName) {
        self.result = Some(self.with_orchestrator(|orchestrator| orchestrator.start_group(group)));
    }

    pub fn stop_group(&mut self, group: GroupName) {
        self.result = Some(self.with_orchestrator(|orchestrator| orchestrator.stop_group(group)));
    }

    /// Executes the queued requests, optionally removing the directories.
    pub fn run(&mut self, teardown: bool) {
        let plan = ExecutionPlan::from_requests(&self.requests);
        self.result = Some(self.with_orchestrator(|orchestrator| {
            orchestrator.execute(&plan)?;
            if teardown {
                orchestrator.teardown()?;
            }
            Ok(())
        }));
    }

    pub fn result(&self) -> Option<&Result<(), OrchestratorError>> {
        self.result.as_ref()
    }

    pub fn launched(&self) -> Vec<String> {
        self.launcher.launched_services()
    }

    pub fn events(&self) -> Vec<LifecycleEvent> {
        self.reporter.events()
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }
}

fn healthy_body(name: &str) -> Value {
    if name.starts_with("blobnode") {
        json!(vec![json!({ "status": 1 }); 8])
    } else if name == "shardnode" {
        json!({ "success_per_min": "0", "failed_per_min": "0" })
    } else {
        json!({ "balance": {}, "disk_repair": {} })
    }
}

fn write_document(path: &Utf8Path, document: &Value) {
    fs::write(path, document.to_string()).expect("write service document");
}
