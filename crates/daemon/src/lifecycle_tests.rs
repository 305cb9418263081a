// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::config::FileConfig;
use tempfile::tempdir;
use wd_adapters::{FakeExecutor, FakeProbe};
use wd_core::{AgentState, MilestoneKind};

fn test_settings(dir: &Path) -> Settings {
    let seed = dir.join("seed.py");
    std::fs::write(&seed, "BRAIN = '__BRAIN_PATH__'\n").unwrap();
    let raw = format!(
        "[agent]\nhost = \"127.0.0.1\"\ntransport = \"local\"\nseed_path = \"{}\"\n",
        seed.display()
    );
    FileConfig::parse(&raw, &dir.join("warden.toml"))
        .unwrap()
        .validate(dir)
        .unwrap()
}

#[tokio::test]
async fn startup_writes_pid_and_supervisor_milestone() {
    let dir = tempdir().unwrap();
    let settings = test_settings(dir.path());
    let paths = Paths::new(dir.path().join("state"));

    let daemon = startup_with(&settings, &paths, FakeExecutor::new(), FakeProbe::new()).unwrap();

    let pid = std::fs::read_to_string(&paths.lock_path).unwrap();
    assert_eq!(pid.trim(), std::process::id().to_string());
    let milestones = daemon.coordinator.recent_milestones(10);
    assert_eq!(milestones.len(), 1);
    assert_eq!(milestones[0].kind, MilestoneKind::Boot);
    assert!(paths.growth_path.exists());

    daemon.shutdown();
    assert!(!paths.lock_path.exists());
}

#[tokio::test]
async fn second_startup_fails_without_touching_pid_file() {
    let dir = tempdir().unwrap();
    let settings = test_settings(dir.path());
    let paths = Paths::new(dir.path());

    let first = startup_with(&settings, &paths, FakeExecutor::new(), FakeProbe::new()).unwrap();
    let before = std::fs::read_to_string(&paths.lock_path).unwrap();

    let second = startup_with(&settings, &paths, FakeExecutor::new(), FakeProbe::new());
    assert!(matches!(second, Err(LifecycleError::LockFailed(_))));
    assert_eq!(std::fs::read_to_string(&paths.lock_path).unwrap(), before);

    first.shutdown();
}

#[tokio::test]
async fn missing_bootstrap_fails_and_cleans_up() {
    let dir = tempdir().unwrap();
    let mut settings = test_settings(dir.path());
    settings.seed_path = dir.path().join("absent.py");
    let paths = Paths::new(dir.path().join("state"));

    let result = startup_with(&settings, &paths, FakeExecutor::new(), FakeProbe::new());
    assert!(matches!(result, Err(LifecycleError::Seed(_))));
    assert!(!paths.lock_path.exists());
}

#[tokio::test]
async fn milestones_accumulate_across_restarts() {
    let dir = tempdir().unwrap();
    let settings = test_settings(dir.path());
    let paths = Paths::new(dir.path());

    startup_with(&settings, &paths, FakeExecutor::new(), FakeProbe::new())
        .unwrap()
        .shutdown();
    let daemon = startup_with(&settings, &paths, FakeExecutor::new(), FakeProbe::new()).unwrap();

    let seqs: Vec<u64> = daemon
        .coordinator
        .recent_milestones(10)
        .iter()
        .map(|m| m.seq)
        .collect();
    assert_eq!(seqs, vec![2, 1]);
    daemon.shutdown();
}

#[tokio::test(start_paused = true)]
async fn supervision_boots_then_checks_health() {
    let dir = tempdir().unwrap();
    let settings = test_settings(dir.path());
    let paths = Paths::new(dir.path());
    let exec = FakeExecutor::new();
    exec.on("echo ok", "ok\n");
    exec.on("pgrep", "77\n");
    exec.on("test -f", "yes\n");
    let probe = FakeProbe::new();

    let daemon = startup_with(&settings, &paths, exec.clone(), probe.clone()).unwrap();
    let handle = daemon.spawn_supervision();
    tokio::time::sleep(Duration::from_secs(25)).await;

    let status = daemon.coordinator.status().status;
    assert_eq!(status.pid, Some(77));
    assert_eq!(status.state, AgentState::Running);
    assert_eq!(probe.checks(), 2);
    assert_eq!(exec.count_matching("nohup"), 0);

    handle.abort();
    daemon.shutdown();
}
