//! Startup configuration specs
//!
//! A bad configuration stops wardend before it takes the lock, and the
//! reason lands both on stderr and in the daemon log.

use crate::prelude::*;

#[test]
fn missing_config_file_fails_startup() {
    let project = Project::empty();
    project
        .wardend()
        .exits(1)
        .stderr_has("error: failed to read config")
        .stderr_has("warden.toml");

    let log = project.log();
    assert!(log.contains("--- wardend: starting (pid: "), "log: {log}");
    assert!(
        log.contains("ERROR failed to start wardend: failed to read config"),
        "log: {log}"
    );
    assert!(!project.path().join("wardend.pid").exists());
}

#[test]
fn config_without_host_is_rejected() {
    let project = Project::empty();
    project.file("warden.toml", "[agent]\nport = 9001\n");
    project
        .wardend()
        .exits(1)
        .stderr_has("agent.host is required");
}

#[test]
fn config_flag_overrides_default_location() {
    let project = Project::empty();
    project.file("warden.toml", "[agent]\nhost = \"10.0.0.5\"\n");
    let other = project.file("other/warden.toml", "[agent]\nhots = \"typo\"\n");
    project
        .wardend()
        .args(&["--config", &other.to_string_lossy()])
        .exits(1)
        .stderr_has("invalid config")
        .stderr_has("other/warden.toml");
}

#[test]
fn config_env_var_selects_file() {
    let project = Project::empty();
    let path = project.file(
        "custom.toml",
        "[agent]\nhost = \"h\"\n[recovery]\nrestart_after = 1\n",
    );
    project
        .wardend()
        .env("WARDEN_CONFIG", &path)
        .exits(1)
        .stderr_has("invalid recovery policy");
}

#[test]
fn missing_bootstrap_fails_and_releases_pid_file() {
    let project = Project::empty();
    project.file(
        "warden.toml",
        "[agent]\nhost = \"127.0.0.1\"\ntransport = \"local\"\nseed_path = \"absent.py\"\n",
    );
    project.wardend().exits(1);

    let log = project.log();
    assert!(
        log.contains("ERROR failed to start wardend: bootstrap error"),
        "log: {log}"
    );
    assert!(!project.path().join("wardend.pid").exists());
}
