// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serial_test::serial;
use yare::parameterized;

fn settings(raw: &str) -> Result<Settings, ConfigError> {
    FileConfig::parse(raw, Path::new("/etc/warden/warden.toml"))?.validate(Path::new("/etc/warden"))
}

#[test]
fn host_alone_yields_defaults() {
    let s = settings("[agent]\nhost = \"10.0.0.5\"\n").unwrap();

    assert_eq!(s.policy, RecoveryPolicy::default());
    assert_eq!(
        s.executor,
        ExecutorSettings::Ssh(SshConfig {
            host: "10.0.0.5".to_string(),
            user: "root".to_string(),
            port: 22,
            key_path: None,
        })
    );
    assert_eq!(s.probe.url, "http://10.0.0.5:9001/health");
    assert_eq!(s.probe.request_timeout, Duration::from_millis(5000));
    assert_eq!(s.probe.timeout_ceiling, Duration::from_millis(8000));
    assert_eq!(s.process.entry.as_str(), "/opt/agent/brain/seed.py");
    assert_eq!(s.process.interpreter, "python3");
    assert_eq!(s.process.ready_attempts, 15);
    assert_eq!(s.process.ready_delay, Duration::from_secs(2));
    assert_eq!(s.vcs.backup_dir.as_str(), "/opt/agent/backups");
    assert_eq!(s.seed_path, PathBuf::from("/etc/warden/seed/seed.py"));
    assert_eq!(
        s.seed_params,
        SeedParams {
            kernel_url: "http://localhost:8080".to_string(),
            brain_path: "/opt/agent/brain".to_string(),
            seed_port: 9001,
            app_port: 9000,
        }
    );
    assert_eq!(s.maintenance_interval, Duration::from_secs(300));
}

#[test]
fn full_file_overrides_every_section() {
    let raw = r#"
[supervisor]
health_check_interval_secs = 20
max_restart_attempts = 5
boot_grace_secs = 45
maintenance_interval_secs = 60
executor_ready_attempts = 4

[agent]
host = "brain.internal"
ssh_user = "agent"
ssh_key_path = "keys/id_ed25519"
ssh_port = 2222
port = 7000
health_path = "status"
code_dir = "/srv/brain"
entry_point = "main.py"
interpreter = "python3.12"
seed_path = "/opt/seed/seed.py"
app_port = 7001

[recovery]
restart_after = 4
rollback_after = 8
rebirth_after = 12
dead_after = 20
timeout_ceiling_ms = 15000
"#;
    let s = settings(raw).unwrap();

    assert_eq!(s.policy.health_check_interval, Duration::from_secs(20));
    assert_eq!(s.policy.max_restart_attempts, 5);
    assert_eq!(s.process.max_restart_attempts, 5);
    assert_eq!(s.policy.boot_grace, Duration::from_secs(45));
    assert_eq!(s.policy.rebirth_after, 12);
    assert_eq!(s.process.ready_attempts, 4);
    assert_eq!(s.maintenance_interval, Duration::from_secs(60));
    assert_eq!(s.probe.url, "http://brain.internal:7000/status");
    assert_eq!(s.process.entry.as_str(), "/srv/brain/main.py");
    assert_eq!(s.seed_path, PathBuf::from("/opt/seed/seed.py"));
    assert_eq!(s.seed_params.app_port, 7001);
    let ExecutorSettings::Ssh(ssh) = s.executor else {
        panic!("expected ssh transport");
    };
    assert_eq!(ssh.user, "agent");
    assert_eq!(ssh.port, 2222);
    assert_eq!(ssh.key_path, Some(PathBuf::from("/etc/warden/keys/id_ed25519")));
}

#[test]
fn local_transport_needs_no_ssh_settings() {
    let s = settings("[agent]\nhost = \"127.0.0.1\"\ntransport = \"local\"\n").unwrap();
    assert_eq!(s.executor, ExecutorSettings::Local);
}

#[test]
fn missing_host_is_rejected() {
    assert!(matches!(settings(""), Err(ConfigError::MissingHost)));
    assert!(matches!(
        settings("[agent]\nhost = \"  \"\n"),
        Err(ConfigError::MissingHost)
    ));
}

#[test]
fn unknown_keys_are_rejected() {
    let err = settings("[agent]\nhost = \"h\"\nhots = \"typo\"\n").unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }), "{err}");
}

#[parameterized(
    not_increasing = { "restart_after = 6" },
    zero_warn = { "warn_after = 0" },
    dead_before_rebirth = { "dead_after = 9" },
    ceiling_too_long = { "timeout_ceiling_ms = 10000" },
    request_above_ceiling = { "request_timeout_ms = 9000" },
)]
fn invalid_recovery_policy(line: &str) {
    let raw = format!("[agent]\nhost = \"h\"\n[recovery]\n{line}\n");
    assert!(matches!(settings(&raw), Err(ConfigError::Policy(_))));
}

#[parameterized(
    traversal = { "code_dir", "/opt/../etc" },
    relative = { "backup_dir", "backups" },
    shell = { "log_file", "/var/log/$(id).log" },
    quote = { "code_dir", "/opt/it's" },
)]
fn unsafe_directories_are_rejected(key: &str, value: &str) {
    let raw = format!("[agent]\nhost = \"h\"\n{key} = \"{value}\"\n");
    match settings(&raw) {
        Err(ConfigError::Path { key: got, .. }) => assert_eq!(got, key),
        other => panic!("expected path error, got {other:?}"),
    }
}

#[test]
fn entry_point_must_be_a_plain_file_name() {
    let err = settings("[agent]\nhost = \"h\"\nentry_point = \"../seed.py\"\n").unwrap_err();
    assert!(matches!(err, ConfigError::Path { key: "entry_point", .. }));
}

#[test]
fn lifecycle_marker_defaults_and_must_be_a_plain_file_name() {
    let s = settings("[agent]\nhost = \"h\"\n").unwrap();
    assert_eq!(s.process.lifecycle_marker.as_str(), "/opt/agent/brain/LIFECYCLE");

    let s = settings("[agent]\nhost = \"h\"\nlifecycle_marker = \"ALIVE\"\n").unwrap();
    assert_eq!(s.process.lifecycle_marker.as_str(), "/opt/agent/brain/ALIVE");

    let err = settings("[agent]\nhost = \"h\"\nlifecycle_marker = \"../x\"\n").unwrap_err();
    assert!(matches!(err, ConfigError::Path { key: "lifecycle_marker", .. }));
}

#[test]
fn interpreter_must_be_a_bare_name() {
    let err = settings("[agent]\nhost = \"h\"\ninterpreter = \"python3 -c x\"\n").unwrap_err();
    assert!(matches!(err, ConfigError::Interpreter(_)));
}

#[test]
fn oversized_boot_grace_is_rejected() {
    let raw = "[supervisor]\nboot_grace_secs = 9223372036854775807\n[agent]\nhost = \"h\"\n";
    assert!(matches!(
        settings(raw),
        Err(ConfigError::Policy(PolicyError::GraceTooLong { .. }))
    ));
}

#[test]
fn zero_maintenance_interval_is_rejected() {
    let raw = "[supervisor]\nmaintenance_interval_secs = 0\n[agent]\nhost = \"h\"\n";
    assert!(matches!(
        settings(raw),
        Err(ConfigError::Zero("maintenance_interval_secs"))
    ));
}

#[test]
#[serial]
fn variables_expand_from_environment() {
    std::env::set_var("WARDEN_TEST_HOST", "10.1.2.3");
    let s = settings("[agent]\nhost = \"${WARDEN_TEST_HOST}\"\n").unwrap();
    std::env::remove_var("WARDEN_TEST_HOST");
    assert_eq!(s.probe.url, "http://10.1.2.3:9001/health");
}

#[test]
#[serial]
fn unresolved_host_variable_is_rejected() {
    std::env::remove_var("WARDEN_TEST_UNSET");
    let err = settings("[agent]\nhost = \"${WARDEN_TEST_UNSET}\"\n").unwrap_err();
    assert!(matches!(err, ConfigError::UnresolvedHost(h) if h == "${WARDEN_TEST_UNSET}"));
}

#[test]
#[serial]
fn expand_env_replaces_only_set_variables() {
    std::env::set_var("WARDEN_TEST_USER", "agent");
    std::env::remove_var("WARDEN_TEST_UNSET");
    assert_eq!(
        expand_env("${WARDEN_TEST_USER}@${WARDEN_TEST_UNSET} $HOME ${}"),
        "agent@${WARDEN_TEST_UNSET} $HOME ${}"
    );
    std::env::remove_var("WARDEN_TEST_USER");
}

#[test]
fn load_reads_file_and_resolves_relative_seed() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("warden.toml");
    std::fs::write(&path, "[agent]\nhost = \"h\"\nseed_path = \"bootstrap.py\"\n").unwrap();

    let s = Settings::load(&path).unwrap();
    assert_eq!(s.seed_path, dir.path().join("bootstrap.py"));
}

#[test]
fn load_reports_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let err = Settings::load(&dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, ConfigError::Read { .. }));
    assert!(err.to_string().contains("absent.toml"));
}

#[test]
#[serial]
fn config_path_resolution_order() {
    std::env::remove_var("WARDEN_CONFIG");
    let state = Path::new("/state");
    assert_eq!(resolve_path(None, state), PathBuf::from("/state/warden.toml"));

    std::env::set_var("WARDEN_CONFIG", "/etc/warden.toml");
    assert_eq!(resolve_path(None, state), PathBuf::from("/etc/warden.toml"));
    assert_eq!(
        resolve_path(Some(PathBuf::from("/cli.toml")), state),
        PathBuf::from("/cli.toml")
    );
    std::env::remove_var("WARDEN_CONFIG");
}
