//! Malformed configuration files fail loading with a readable error.

use std::ffi::OsString;
use std::fs;

use ortho_config::OrthoConfig;
use tempfile::TempDir;
use vstart_config::Config;

fn load_with_file(contents: &str) -> Result<Config, String> {
    let temp_dir = TempDir::new().expect("create temp dir");
    let path = temp_dir.path().join("vstart.toml");
    fs::write(&path, contents).expect("write config");
    let args = vec![
        OsString::from("vstart"),
        OsString::from("--config-path"),
        path.into_os_string(),
    ];
    Config::load_from_iter(args).map_err(|error| error.to_string())
}

#[test]
fn malformed_toml_is_rejected() {
    let result = load_with_file("az_num = \"two\"\ncluster_version = ");
    assert!(result.is_err(), "malformed file must fail: {result:?}");
}

#[test]
fn unknown_topology_is_rejected() {
    let result = load_with_file("az_num = \"four\"\n");
    assert!(result.is_err(), "unknown topology must fail: {result:?}");
}

#[test]
fn readiness_timeout_is_read_from_file() {
    let config = load_with_file("readiness_timeout_secs = 45\nreap_strategy = \"pid\"\n")
        .expect("config should load");
    assert_eq!(config.readiness_timeout_secs, Some(45));
    assert_eq!(config.reap_strategy(), vstart_config::ReapStrategy::Pid);
}
