//! The service types of a local blobstore deployment.

use std::fs;

use camino::Utf8PathBuf;

use super::{Runtime, ServiceError, ServiceKind, ServiceSpec, daemon_command};
use crate::document::ConfigDocument;
use crate::probe::{
    CONSUL_LEADER_URL, blobnode_ready, consul_has_leader, proxy_ready, scheduler_ready,
    shardnode_ready,
};

/// Marker written by `kafka-storage.sh format`.
pub(crate) const KAFKA_FORMAT_MARKER: &str = "/tmp/kraft-combined-logs/meta.properties";
const KAFKA_BOOTSTRAP_SERVER: &str = "localhost:9092";

fn status_url(doc: &ConfigDocument, path: &str) -> Result<String, ServiceError> {
    Ok(format!("http://127.0.0.1{}{path}", doc.bind_addr()?))
}

fn create_dirs(dirs: &[Utf8PathBuf]) -> Result<(), ServiceError> {
    for dir in dirs {
        fs::create_dir_all(dir).map_err(|source| ServiceError::CreateDirectory {
            path: dir.clone(),
            source,
        })?;
    }
    Ok(())
}

/// Polls the JSON status endpoint at `path` until `ready` accepts the body.
fn wait_for_status(
    spec: &ServiceSpec,
    rt: &Runtime<'_>,
    path: &str,
    ready: fn(&serde_json::Value) -> bool,
) -> Result<(), ServiceError> {
    let doc = ConfigDocument::load(spec.require_config()?)?;
    let url = status_url(&doc, path)?;
    rt.poller.wait_until(spec.name(), || {
        rt.client.get_json(&url).is_some_and(|body| ready(&body))
    })?;
    Ok(())
}

/// Single-node consul agent in dev mode.
#[derive(Debug, Clone)]
pub struct Consul {
    binary: Utf8PathBuf,
}

impl Consul {
    /// Service run from `binary`.
    #[must_use]
    pub fn new(binary: impl Into<Utf8PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl ServiceKind for Consul {
    fn prepare(&self, _spec: &ServiceSpec, _rt: &Runtime<'_>) -> Result<Vec<String>, ServiceError> {
        Ok(vec![
            self.binary.to_string(),
            "agent".to_owned(),
            "-dev".to_owned(),
            "-client".to_owned(),
            "0.0.0.0".to_owned(),
        ])
    }

    fn check_ready(&self, spec: &ServiceSpec, rt: &Runtime<'_>) -> Result<(), ServiceError> {
        rt.poller.wait_until(spec.name(), || {
            rt.client
                .get_json(CONSUL_LEADER_URL)
                .is_some_and(|body| consul_has_leader(&body))
        })?;
        Ok(())
    }
}

/// Kafka broker in KRaft mode.
///
/// The log directory is formatted on first start, detected by the absence of
/// the `meta.properties` marker.
#[derive(Debug, Clone)]
pub struct Kafka {
    home: Utf8PathBuf,
    format_marker: Utf8PathBuf,
}

impl Kafka {
    /// Kafka distribution rooted at `home`.
    #[must_use]
    pub fn new(home: impl Into<Utf8PathBuf>) -> Self {
        Self {
            home: home.into(),
            format_marker: Utf8PathBuf::from(KAFKA_FORMAT_MARKER),
        }
    }

    /// Overrides the marker file whose presence skips formatting.
    #[must_use]
    pub fn with_format_marker(mut self, marker: impl Into<Utf8PathBuf>) -> Self {
        self.format_marker = marker.into();
        self
    }

    fn script(&self, name: &str) -> String {
        self.home.join("bin").join(name).to_string()
    }

    fn server_properties(&self) -> String {
        self.home.join("config/kraft/server.properties").to_string()
    }

    fn format_storage(&self, rt: &Runtime<'_>) -> Result<(), ServiceError> {
        let storage = self.script("kafka-storage.sh");
        let raw = rt
            .commands
            .output(&[storage.clone(), "random-uuid".to_owned()])?;
        let cluster_id = raw
            .strip_suffix('\n')
            .or_else(|| raw.strip_suffix('\r'))
            .unwrap_or(&raw);
        rt.commands.output(&[
            storage,
            "format".to_owned(),
            "-t".to_owned(),
            cluster_id.to_owned(),
            "-c".to_owned(),
            self.server_properties(),
        ])?;
        Ok(())
    }
}

impl ServiceKind for Kafka {
    fn prepare(&self, _spec: &ServiceSpec, rt: &Runtime<'_>) -> Result<Vec<String>, ServiceError> {
        if !self.format_marker.exists() {
            self.format_storage(rt)?;
        }
        Ok(vec![
            self.script("kafka-server-start.sh"),
            "-daemon".to_owned(),
            self.server_properties(),
        ])
    }

    fn self_detaches(&self) -> bool {
        true
    }

    fn check_ready(&self, spec: &ServiceSpec, rt: &Runtime<'_>) -> Result<(), ServiceError> {
        let probe = [
            self.script("kafka-broker-api-versions.sh"),
            "--bootstrap-server".to_owned(),
            KAFKA_BOOTSTRAP_SERVER.to_owned(),
        ];
        rt.poller
            .wait_until(spec.name(), || rt.commands.succeeds(&probe))?;
        Ok(())
    }
}

/// Metadata replica. Quorum readiness is checked once by
/// [`super::QuorumHook`] after every replica launched; each member only
/// settles briefly.
#[derive(Debug, Clone)]
pub struct ClusterMgr {
    binary: Utf8PathBuf,
}

impl ClusterMgr {
    /// Service run from `binary`.
    #[must_use]
    pub fn new(binary: impl Into<Utf8PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl ServiceKind for ClusterMgr {
    fn prepare(&self, spec: &ServiceSpec, _rt: &Runtime<'_>) -> Result<Vec<String>, ServiceError> {
        daemon_command(&self.binary, spec)
    }

    fn check_ready(&self, _spec: &ServiceSpec, rt: &Runtime<'_>) -> Result<(), ServiceError> {
        rt.poller.settle();
        Ok(())
    }

    fn announces_readiness(&self) -> bool {
        false
    }
}

/// Storage node. Ready once `/stat` lists every disk.
#[derive(Debug, Clone)]
pub struct BlobNode {
    binary: Utf8PathBuf,
}

impl BlobNode {
    /// Service run from `binary`.
    #[must_use]
    pub fn new(binary: impl Into<Utf8PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl ServiceKind for BlobNode {
    fn prepare(&self, spec: &ServiceSpec, _rt: &Runtime<'_>) -> Result<Vec<String>, ServiceError> {
        let doc = ConfigDocument::load(spec.require_config()?)?;
        create_dirs(&doc.blobnode_disks()?)?;
        daemon_command(&self.binary, spec)
    }

    fn check_ready(&self, spec: &ServiceSpec, rt: &Runtime<'_>) -> Result<(), ServiceError> {
        wait_for_status(spec, rt, "/stat", blobnode_ready)
    }
}

/// Shard node of 1.5.x deployments.
#[derive(Debug, Clone)]
pub struct ShardNode {
    binary: Utf8PathBuf,
}

impl ShardNode {
    /// Service run from `binary`.
    #[must_use]
    pub fn new(binary: impl Into<Utf8PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl ServiceKind for ShardNode {
    fn prepare(&self, spec: &ServiceSpec, _rt: &Runtime<'_>) -> Result<Vec<String>, ServiceError> {
        let doc = ConfigDocument::load(spec.require_config()?)?;
        create_dirs(&doc.shardnode_disks())?;
        daemon_command(&self.binary, spec)
    }

    fn check_ready(&self, spec: &ServiceSpec, rt: &Runtime<'_>) -> Result<(), ServiceError> {
        wait_for_status(spec, rt, "/blob/delete/stats", shardnode_ready)
    }
}

/// Routing proxy. Ready once it lists volumes for the deployment's code mode.
#[derive(Debug, Clone)]
pub struct Proxy {
    binary: Utf8PathBuf,
    code_mode: u8,
}

impl Proxy {
    /// Proxy binary probing volumes of `code_mode`.
    #[must_use]
    pub fn new(binary: impl Into<Utf8PathBuf>, code_mode: u8) -> Self {
        Self {
            binary: binary.into(),
            code_mode,
        }
    }
}

impl ServiceKind for Proxy {
    fn prepare(&self, spec: &ServiceSpec, _rt: &Runtime<'_>) -> Result<Vec<String>, ServiceError> {
        daemon_command(&self.binary, spec)
    }

    fn check_ready(&self, spec: &ServiceSpec, rt: &Runtime<'_>) -> Result<(), ServiceError> {
        let path = format!("/volume/list?code_mode={}", self.code_mode);
        wait_for_status(spec, rt, &path, proxy_ready)
    }
}

/// Background task scheduler. Ready once `/stats` reports its task kinds.
#[derive(Debug, Clone)]
pub struct Scheduler {
    binary: Utf8PathBuf,
}

impl Scheduler {
    /// Service run from `binary`.
    #[must_use]
    pub fn new(binary: impl Into<Utf8PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl ServiceKind for Scheduler {
    fn prepare(&self, spec: &ServiceSpec, _rt: &Runtime<'_>) -> Result<Vec<String>, ServiceError> {
        daemon_command(&self.binary, spec)
    }

    fn check_ready(&self, spec: &ServiceSpec, rt: &Runtime<'_>) -> Result<(), ServiceError> {
        wait_for_status(spec, rt, "/stats", scheduler_ready)
    }
}

/// Front-door access service. Has no probe; a settle pause stands in.
#[derive(Debug, Clone)]
pub struct Access {
    binary: Utf8PathBuf,
}

impl Access {
    /// Service run from `binary`.
    #[must_use]
    pub fn new(binary: impl Into<Utf8PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl ServiceKind for Access {
    fn prepare(&self, spec: &ServiceSpec, _rt: &Runtime<'_>) -> Result<Vec<String>, ServiceError> {
        daemon_command(&self.binary, spec)
    }

    fn check_ready(&self, _spec: &ServiceSpec, rt: &Runtime<'_>) -> Result<(), ServiceError> {
        rt.poller.settle();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use mockall::predicate::eq;
    use rstest::{fixture, rstest};
    use serde_json::json;
    use tempfile::TempDir;

    use super::*;
    use crate::exec::{CommandError, MockCommandRunner};
    use crate::probe::{MockStatusClient, Poller};
    use crate::service::Service;
    use crate::tests::support::{RecordingLauncher, RecordingReaper, RecordingReporter};

    struct Fixture {
        _dir: TempDir,
        root: Utf8PathBuf,
        launcher: RecordingLauncher,
        reaper: RecordingReaper,
        reporter: RecordingReporter,
        poller: Poller,
    }

    impl Fixture {
        fn runtime<'a>(
            &'a self,
            client: &'a MockStatusClient,
            commands: &'a MockCommandRunner,
        ) -> Runtime<'a> {
            Runtime {
                launcher: &self.launcher,
                reaper: &self.reaper,
                client,
                commands,
                reporter: &self.reporter,
                poller: &self.poller,
            }
        }

        fn spec(&self, name: &str, label: &'static str, config: &str) -> ServiceSpec {
            let path = self.root.join(format!("{name}.json"));
            fs::write(&path, config).expect("write config document");
            ServiceSpec::new(
                name,
                label,
                format!("{name}.json"),
                Some(path),
                self.root.join(format!("{name}-start.log")),
            )
        }
    }

    #[fixture]
    fn fixture() -> Fixture {
        let dir = TempDir::new().expect("create temp dir");
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf-8 temp path");
        Fixture {
            _dir: dir,
            root,
            launcher: RecordingLauncher::default(),
            reaper: RecordingReaper::default(),
            reporter: RecordingReporter::default(),
            poller: Poller::new(Duration::ZERO, None, Duration::ZERO),
        }
    }

    fn strings(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|part| (*part).to_owned()).collect()
    }

    #[rstest]
    fn consul_runs_a_dev_agent_and_waits_for_leader(fixture: Fixture) {
        let mut client = MockStatusClient::new();
        let mut responses = vec![None, Some(json!("")), Some(json!("127.0.0.1:8300"))].into_iter();
        client
            .expect_get_json()
            .with(eq(CONSUL_LEADER_URL))
            .times(3)
            .returning(move |_| responses.next().flatten());
        let commands = MockCommandRunner::new();
        let rt = fixture.runtime(&client, &commands);
        let spec = ServiceSpec::new("consul", "consul", "/usr/bin/consul", None, fixture.root.join("consul-start.log"));
        let consul = Consul::new("/usr/bin/consul");

        assert_eq!(
            consul.prepare(&spec, &rt).expect("prepare"),
            strings(&["/usr/bin/consul", "agent", "-dev", "-client", "0.0.0.0"])
        );
        consul.check_ready(&spec, &rt).expect("consul ready");
    }

    #[rstest]
    fn kafka_formats_storage_when_marker_missing(fixture: Fixture) {
        let client = MockStatusClient::new();
        let mut commands = MockCommandRunner::new();
        commands
            .expect_output()
            .with(eq(strings(&["/opt/kafka/bin/kafka-storage.sh", "random-uuid"])))
            .times(1)
            .returning(|_| Ok("q1Sh-9_ISia_zwGINzRvyQ\n".to_owned()));
        commands
            .expect_output()
            .with(eq(strings(&[
                "/opt/kafka/bin/kafka-storage.sh",
                "format",
                "-t",
                "q1Sh-9_ISia_zwGINzRvyQ",
                "-c",
                "/opt/kafka/config/kraft/server.properties",
            ])))
            .times(1)
            .returning(|_| Ok(String::new()));
        let rt = fixture.runtime(&client, &commands);
        let kafka = Kafka::new("/opt/kafka").with_format_marker(fixture.root.join("meta.properties"));
        let spec = ServiceSpec::new("kafka", "kafka", "/opt/kafka", None, fixture.root.join("kafka-start.log"));

        assert_eq!(
            kafka.prepare(&spec, &rt).expect("prepare"),
            strings(&[
                "/opt/kafka/bin/kafka-server-start.sh",
                "-daemon",
                "/opt/kafka/config/kraft/server.properties",
            ])
        );
    }

    #[rstest]
    fn only_kafka_is_stopped_by_token_under_the_pid_strategy(fixture: Fixture) {
        let spec = |name: &str| {
            ServiceSpec::new(name, "svc", name, None, fixture.root.join(format!("{name}-start.log")))
        };
        let kafka = Service::new(spec("kafka"), Kafka::new("/opt/kafka"));
        let proxy = Service::new(spec("proxy"), Proxy::new("/bin/proxy", 11));

        assert!(kafka.spec().self_detaching());
        assert!(!proxy.spec().self_detaching());
    }

    #[rstest]
    fn kafka_skips_format_when_marker_present(fixture: Fixture) {
        let marker = fixture.root.join("meta.properties");
        fs::write(&marker, "cluster.id=x\n").expect("write marker");
        let client = MockStatusClient::new();
        let mut commands = MockCommandRunner::new();
        commands.expect_output().never();
        let mut attempts = 0;
        commands.expect_succeeds().times(2).returning(move |_| {
            attempts += 1;
            attempts == 2
        });
        let rt = fixture.runtime(&client, &commands);
        let kafka = Kafka::new("/opt/kafka").with_format_marker(marker);
        let spec = ServiceSpec::new("kafka", "kafka", "/opt/kafka", None, fixture.root.join("kafka-start.log"));

        kafka.prepare(&spec, &rt).expect("prepare");
        kafka.check_ready(&spec, &rt).expect("kafka ready");
    }

    #[rstest]
    fn kafka_format_failure_is_fatal(fixture: Fixture) {
        let client = MockStatusClient::new();
        let mut commands = MockCommandRunner::new();
        commands.expect_output().times(1).returning(|_| {
            Err(CommandError::Failed {
                program: "kafka-storage.sh".to_owned(),
                status: Some(1),
                stderr: "boom".to_owned(),
            })
        });
        let rt = fixture.runtime(&client, &commands);
        let kafka = Kafka::new("/opt/kafka").with_format_marker(fixture.root.join("absent"));
        let spec = ServiceSpec::new("kafka", "kafka", "/opt/kafka", None, fixture.root.join("kafka-start.log"));

        assert!(matches!(kafka.prepare(&spec, &rt), Err(ServiceError::Command(_))));
    }

    #[rstest]
    fn blobnode_creates_disks_and_probes_stat(fixture: Fixture) {
        let disk_a = fixture.root.join("disks/d1");
        let disk_b = fixture.root.join("disks/d2");
        let spec = fixture.spec(
            "blobnode",
            "blobnode",
            &json!({"bind_addr": ":8899", "disks": [{"path": disk_a}, {"path": disk_b}]}).to_string(),
        );
        let mut client = MockStatusClient::new();
        let mut sizes = vec![7_usize, 8].into_iter();
        client
            .expect_get_json()
            .with(eq("http://127.0.0.1:8899/stat"))
            .times(2)
            .returning(move |_| sizes.next().map(|n| json!(vec![json!({}); n])));
        let commands = MockCommandRunner::new();
        let rt = fixture.runtime(&client, &commands);
        let node = BlobNode::new("/bin/blobnode");

        let argv = node.prepare(&spec, &rt).expect("prepare");
        assert_eq!(argv, vec!["/bin/blobnode".to_owned(), "-f".to_owned(), spec.config_path().expect("config").to_string()]);
        assert!(disk_a.is_dir() && disk_b.is_dir());
        node.check_ready(&spec, &rt).expect("blobnode ready");
    }

    #[rstest]
    fn blobnode_without_disks_is_fatal(fixture: Fixture) {
        let spec = fixture.spec("blobnode", "blobnode", r#"{"bind_addr": ":8899"}"#);
        let client = MockStatusClient::new();
        let commands = MockCommandRunner::new();
        let rt = fixture.runtime(&client, &commands);
        assert!(matches!(
            BlobNode::new("/bin/blobnode").prepare(&spec, &rt),
            Err(ServiceError::Document(_))
        ));
    }

    #[rstest]
    fn shardnode_creates_configured_disks(fixture: Fixture) {
        let disk = fixture.root.join("shard/1");
        let spec = fixture.spec(
            "shardnode",
            "shardnode",
            &json!({"bind_addr": ":9100", "disks_config": {"disks": [disk]}}).to_string(),
        );
        let mut client = MockStatusClient::new();
        client
            .expect_get_json()
            .with(eq("http://127.0.0.1:9100/blob/delete/stats"))
            .times(1)
            .returning(|_| Some(json!({"success_per_min": "0", "failed_per_min": "0"})));
        let commands = MockCommandRunner::new();
        let rt = fixture.runtime(&client, &commands);
        let node = ShardNode::new("/bin/shardnode");

        node.prepare(&spec, &rt).expect("prepare");
        assert!(disk.is_dir());
        node.check_ready(&spec, &rt).expect("shardnode ready");
    }

    #[rstest]
    #[case(4)]
    #[case(11)]
    fn proxy_probes_its_code_mode(fixture: Fixture, #[case] code_mode: u8) {
        let spec = fixture.spec("proxy", "proxy", r#"{"bind_addr": ":9600"}"#);
        let mut client = MockStatusClient::new();
        client
            .expect_get_json()
            .with(eq(format!("http://127.0.0.1:9600/volume/list?code_mode={code_mode}")))
            .times(2)
            .returning({
                let mut calls = 0;
                move |_| {
                    calls += 1;
                    Some(if calls == 1 { json!({"vids": []}) } else { json!({"vids": [1]}) })
                }
            });
        let commands = MockCommandRunner::new();
        let rt = fixture.runtime(&client, &commands);
        Proxy::new("/bin/proxy", code_mode)
            .check_ready(&spec, &rt)
            .expect("proxy ready");
    }

    #[rstest]
    fn scheduler_needs_two_stat_fields(fixture: Fixture) {
        let spec = fixture.spec("scheduler", "scheduler", r#"{"bind_addr": ":9800"}"#);
        let mut client = MockStatusClient::new();
        client
            .expect_get_json()
            .with(eq("http://127.0.0.1:9800/stats"))
            .times(1)
            .returning(|_| Some(json!({"balance": {}, "repair": {}})));
        let commands = MockCommandRunner::new();
        let rt = fixture.runtime(&client, &commands);
        Scheduler::new("/bin/scheduler")
            .check_ready(&spec, &rt)
            .expect("scheduler ready");
    }

    #[rstest]
    fn probe_less_services_settle_without_requests(fixture: Fixture) {
        let spec = fixture.spec("access", "access", "{}");
        let mut client = MockStatusClient::new();
        client.expect_get_json().never();
        let commands = MockCommandRunner::new();
        let rt = fixture.runtime(&client, &commands);

        Access::new("/bin/access").check_ready(&spec, &rt).expect("access settles");
        ClusterMgr::new("/bin/clustermgr")
            .check_ready(&spec, &rt)
            .expect("clustermgr settles");
        assert!(!ClusterMgr::new("/bin/clustermgr").announces_readiness());
        assert!(Access::new("/bin/access").announces_readiness());
    }

    #[rstest]
    fn binary_services_need_a_config_document(fixture: Fixture) {
        let client = MockStatusClient::new();
        let commands = MockCommandRunner::new();
        let rt = fixture.runtime(&client, &commands);
        let spec = ServiceSpec::new("proxy", "proxy", "proxy.json", None, fixture.root.join("proxy-start.log"));
        assert!(matches!(
            Proxy::new("/bin/proxy", 11).prepare(&spec, &rt),
            Err(ServiceError::MissingConfig { .. })
        ));
    }

    #[rstest]
    fn deadline_surfaces_as_not_ready(fixture: Fixture) {
        let spec = fixture.spec("scheduler", "scheduler", r#"{"bind_addr": ":9800"}"#);
        let mut client = MockStatusClient::new();
        client.expect_get_json().returning(|_| None);
        let commands = MockCommandRunner::new();
        let poller = Poller::new(Duration::from_millis(1), Some(Duration::from_millis(10)), Duration::ZERO);
        let rt = Runtime {
            poller: &poller,
            ..fixture.runtime(&client, &commands)
        };
        assert!(matches!(
            Scheduler::new("/bin/scheduler").check_ready(&spec, &rt),
            Err(ServiceError::NotReady(_))
        ));
    }
}
