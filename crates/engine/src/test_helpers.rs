// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test helpers for the engine crate.

use crate::coordinator::{Coordinator, CoordinatorConfig, CoordinatorDeps};
use crate::process::{ProcessConfig, ProcessController};
use crate::seed::{Seed, SeedParams};
use crate::vcs::{Vcs, VcsConfig};
use std::time::Duration;
use tempfile::TempDir;
use wd_adapters::{FakeExecutor, FakeProbe};
use wd_core::test_support::{policy_without_grace, safe_path};
use wd_core::{FakeClock, GrowthMilestone, RecoveryPolicy, SequentialIdGen};
use wd_storage::{GrowthLog, HealthLog};

pub(crate) const CODE_DIR: &str = "/opt/agent/brain";

pub(crate) fn test_seed() -> Seed {
    Seed::render(
        "print('seed at __BRAIN_PATH__')",
        &[],
        &SeedParams {
            kernel_url: "http://kernel:8080".to_string(),
            brain_path: CODE_DIR.to_string(),
            seed_port: 9001,
            app_port: 9000,
        },
    )
}

pub(crate) fn fake_vcs(exec: &FakeExecutor) -> Vcs<FakeExecutor> {
    Vcs::new(
        exec.clone(),
        VcsConfig {
            code_dir: safe_path(CODE_DIR),
            backup_dir: safe_path("/opt/agent/backups"),
            command_timeout: Duration::from_secs(10),
        },
    )
}

pub(crate) fn fake_process(exec: &FakeExecutor) -> ProcessController<FakeExecutor> {
    let config = ProcessConfig::new(
        safe_path(CODE_DIR),
        "seed.py",
        "python3",
        safe_path("/var/log/agent.log"),
    )
    .unwrap();
    ProcessController::new(exec.clone(), config, test_seed())
}

/// A healthy remote: repository present, entry point present, launches
/// answer with a PID and the HEAD hash is fixed.
pub(crate) fn script_healthy_remote(exec: &FakeExecutor) {
    exec.on("test -d", "yes\n");
    exec.on("test -f", "yes\n");
    exec.on("nohup", "4242\n");
    exec.on("rev-parse", "abc1234\n");
    exec.on("echo ok", "ok\n");
}

pub(crate) type TestCoordinator = Coordinator<FakeExecutor, FakeProbe, FakeClock, SequentialIdGen>;

/// Coordinator wired to fakes, with logs in a temp directory.
pub(crate) struct TestContext {
    pub coordinator: TestCoordinator,
    pub exec: FakeExecutor,
    pub probe: FakeProbe,
    pub clock: FakeClock,
    pub dir: TempDir,
}

impl TestContext {
    pub fn new() -> Self {
        Self::with_policy(policy_without_grace())
    }

    pub fn with_policy(policy: RecoveryPolicy) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let exec = FakeExecutor::new();
        let probe = FakeProbe::new();
        let clock = FakeClock::new();
        let health = HealthLog::open(&dir.path().join("health.jsonl")).unwrap();
        let growth = GrowthLog::open(&dir.path().join("growth.jsonl")).unwrap();
        let coordinator = Coordinator::new(
            CoordinatorDeps {
                vcs: fake_vcs(&exec),
                process: fake_process(&exec),
                probe: probe.clone(),
                health,
                growth,
            },
            clock.clone(),
            SequentialIdGen::new("op"),
            CoordinatorConfig { policy },
        )
        .unwrap();
        Self {
            coordinator,
            exec,
            probe,
            clock,
            dir,
        }
    }

    /// Every milestone, oldest first.
    pub fn milestones(&self) -> Vec<GrowthMilestone> {
        let mut all = self.coordinator.recent_milestones(usize::MAX);
        all.reverse();
        all
    }

    /// Run `n` health ticks, advancing the clock by the check interval before each.
    pub async fn ticks(&self, n: usize) {
        for _ in 0..n {
            self.clock.advance(Duration::from_secs(10));
            self.coordinator.health_tick().await;
        }
    }
}
