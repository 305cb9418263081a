// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::coordinator::TickOutcome;
use crate::test_helpers::{script_healthy_remote, TestContext};
use std::time::Duration;
use wd_adapters::ExecError;
use wd_core::test_support::kinds;
use wd_core::{ProbeOutcome, RecoveryPolicy};

#[tokio::test(start_paused = true)]
async fn adopts_agent_already_running() {
    let ctx = TestContext::new();
    script_healthy_remote(&ctx.exec);
    ctx.exec.on("pgrep", "311\n");

    assert_eq!(ctx.coordinator.boot().await, BootOutcome::Adopted { pid: 311 });

    let status = ctx.coordinator.status().status;
    assert_eq!(status.state, AgentState::Starting);
    assert_eq!(status.pid, Some(311));
    assert_eq!(status.current_git_hash.as_deref(), Some("abc1234"));
    assert_eq!(ctx.exec.count_matching("nohup"), 0);
    assert_eq!(ctx.exec.count_matching("pkill"), 0);
    assert!(ctx.milestones().is_empty());
}

#[tokio::test(start_paused = true)]
async fn running_process_without_entry_point_is_replaced() {
    let ctx = TestContext::new();
    script_healthy_remote(&ctx.exec);
    ctx.exec.on("pgrep", "311\n");
    ctx.exec.on("test -f", "no\n");
    ctx.exec.on("LIFECYCLE", "yes\n");

    let outcome = ctx.coordinator.boot().await;
    assert_eq!(
        outcome,
        BootOutcome::Started {
            pid: 4242,
            deployed: true
        }
    );
    assert_eq!(ctx.exec.count_matching("pkill -f '[/]opt/agent/brain'"), 1);
    assert_eq!(ctx.exec.count_matching("base64 -d"), 1);
}

#[tokio::test(start_paused = true)]
async fn fresh_host_gets_repository_and_bootstrap() {
    let ctx = TestContext::new();
    script_healthy_remote(&ctx.exec);
    ctx.exec.on("test -d", "no\n");
    ctx.exec.on("test -f", "no\n");

    let outcome = ctx.coordinator.boot().await;
    assert_eq!(
        outcome,
        BootOutcome::Started {
            pid: 4242,
            deployed: true
        }
    );

    let commands = ctx.exec.commands();
    let init = commands.iter().position(|c| c.contains("init -q")).unwrap();
    let deploy = commands.iter().position(|c| c.contains("base64 -d")).unwrap();
    let launch = commands.iter().position(|c| c.contains("nohup")).unwrap();
    assert!(init < deploy && deploy < launch, "{commands:#?}");

    let milestone = ctx.milestones().pop().unwrap();
    assert_eq!(milestone.kind, MilestoneKind::Boot);
    let meta = milestone.metadata.unwrap();
    assert_eq!(meta["pid"], 4242);
    assert_eq!(meta["deployed"], true);
}

#[tokio::test(start_paused = true)]
async fn previous_life_without_marker_is_backed_up_and_wiped() {
    let ctx = TestContext::new();
    script_healthy_remote(&ctx.exec);
    ctx.exec.on("test -f", "no\n");
    ctx.exec.on("du -sm", "3\n");

    let outcome = ctx.coordinator.boot().await;
    assert_eq!(
        outcome,
        BootOutcome::Started {
            pid: 4242,
            deployed: true
        }
    );

    let commands = ctx.exec.commands();
    let position = |needle: &str| {
        commands
            .iter()
            .position(|c| c.contains(needle))
            .unwrap_or_else(|| panic!("no {needle:?} in {commands:#?}"))
    };
    let stop = position("pkill -f '[/]opt/agent/brain'");
    let backup = position("tar czf");
    let wipe = position("-name .git -exec rm -rf {} +");
    let deploy = position("base64 -d");
    assert!(stop < backup && backup < wipe && wipe < deploy, "{commands:#?}");
    assert_eq!(ctx.exec.count_matching("pkill"), 1);

    let milestones = ctx.milestones();
    assert_eq!(kinds(&milestones), vec![MilestoneKind::Rebirth, MilestoneKind::Boot]);
    let meta = milestones[0].metadata.as_ref().unwrap();
    assert_eq!(meta["trigger"], "boot");
    assert_eq!(meta["outcome"], "succeeded");
    assert_eq!(meta["had_repository"], true);
    assert_eq!(meta["had_entry"], false);
    assert!(meta["backup"].as_str().unwrap().ends_with(".tar.gz"));
}

#[tokio::test(start_paused = true)]
async fn marked_code_directory_is_kept() {
    let ctx = TestContext::new();
    script_healthy_remote(&ctx.exec);

    ctx.coordinator.boot().await;

    assert_eq!(ctx.exec.count_matching("tar czf"), 0);
    assert_eq!(ctx.exec.count_matching("-exec rm -rf"), 0);
    assert_eq!(kinds(&ctx.milestones()), vec![MilestoneKind::Boot]);
}

#[tokio::test(start_paused = true)]
async fn existing_entry_point_is_resumed() {
    let ctx = TestContext::new();
    script_healthy_remote(&ctx.exec);

    let outcome = ctx.coordinator.boot().await;
    assert_eq!(
        outcome,
        BootOutcome::Started {
            pid: 4242,
            deployed: false
        }
    );
    assert_eq!(ctx.exec.count_matching("base64 -d"), 0);
    assert_eq!(ctx.coordinator.status().status.pid, Some(4242));
}

#[tokio::test(start_paused = true)]
async fn unreachable_executor_defers_to_health_loop() {
    let ctx = TestContext::with_policy(RecoveryPolicy::default());
    ctx.exec.fail_on("echo ok", ExecError::Unreachable("connection refused".into()));
    ctx.probe.set_fallback(ProbeOutcome::fail(2, "connection refused"));

    assert_eq!(ctx.coordinator.boot().await, BootOutcome::ExecutorUnreachable);
    assert_eq!(ctx.exec.count_matching("echo ok"), 15);
    assert_eq!(ctx.exec.count_matching("nohup"), 0);

    // Grace is doubled: a failure 50s later is still not escalated.
    ctx.clock.advance(Duration::from_secs(50));
    assert_eq!(ctx.coordinator.health_tick().await, TickOutcome::Grace);
}

#[tokio::test(start_paused = true)]
async fn start_failure_marks_agent_dead() {
    let ctx = TestContext::new();
    script_healthy_remote(&ctx.exec);
    ctx.exec.fail_on("nohup", ExecError::Failed {
        code: Some(127),
        output: "nohup: python3: not found".into(),
    });

    assert_eq!(ctx.coordinator.boot().await, BootOutcome::Failed);
    assert_eq!(ctx.coordinator.status().status.state, AgentState::Dead);

    let milestones = ctx.milestones();
    assert_eq!(kinds(&milestones), vec![MilestoneKind::Crash]);
    let error = milestones[0].metadata.as_ref().unwrap()["error"].as_str().unwrap();
    assert!(error.contains("not found"), "{error}");
}

#[test]
fn supervisor_start_is_recorded() {
    let ctx = TestContext::new();
    ctx.coordinator.record_supervisor_start("0.1.0");

    let milestone = ctx.milestones().pop().unwrap();
    assert_eq!(milestone.kind, MilestoneKind::Boot);
    assert_eq!(milestone.note, "supervisor started (v0.1.0)");
    assert_eq!(milestone.metadata.unwrap()["supervisor"], true);
}
