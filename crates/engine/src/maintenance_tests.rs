// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::test_helpers::{script_healthy_remote, TestContext};
use std::time::Duration;
use wd_core::test_support::kinds;
use wd_core::ProbeOutcome;

const HEAD_COMMITTED: &str = "2026-01-15T12:00:00+00:00\n";

/// Healthy agent, HEAD committed at the fake clock's start.
async fn running_context() -> TestContext {
    let ctx = TestContext::new();
    script_healthy_remote(&ctx.exec);
    ctx.exec.on("--format=%aI", HEAD_COMMITTED);
    ctx.exec.on("--sort=-version:refname", "stable-v2\nexperiment\nstable-v1\n");
    ctx.ticks(1).await;
    assert_eq!(ctx.coordinator.status().status.state, AgentState::Running);
    ctx
}

#[tokio::test]
async fn promotes_head_after_minimum_stable_duration() {
    let ctx = running_context().await;
    ctx.clock.advance(Duration::from_secs(600));

    let tag = ctx.coordinator.promote_stable().await;
    assert_eq!(tag, Some(GitRef::stable(3)));
    assert_eq!(
        ctx.exec.count_matching("git -C '/opt/agent/brain' tag 'stable-v3'"),
        1
    );

    let milestone = ctx.milestones().pop().unwrap();
    assert_eq!(milestone.kind, MilestoneKind::StableTag);
    assert_eq!(milestone.git_hash.as_deref(), Some("abc1234"));
    let meta = milestone.metadata.unwrap();
    assert_eq!(meta["tag"], "stable-v3");
    assert_eq!(meta["head_age_secs"], 610);
}

#[tokio::test]
async fn young_head_is_not_promoted() {
    let ctx = running_context().await;
    ctx.clock.advance(Duration::from_secs(60));

    assert_eq!(ctx.coordinator.promote_stable().await, None);
    assert_eq!(ctx.exec.count_matching("tag 'stable"), 0);
    assert!(ctx.milestones().is_empty());
}

#[tokio::test]
async fn already_stable_head_is_not_retagged() {
    let ctx = running_context().await;
    ctx.exec.on("--points-at", "stable-v2\n");
    ctx.clock.advance(Duration::from_secs(600));

    assert_eq!(ctx.coordinator.promote_stable().await, None);
    assert_eq!(ctx.exec.count_matching("tag 'stable"), 0);
}

#[tokio::test]
async fn other_tags_on_head_do_not_block_promotion() {
    let ctx = running_context().await;
    ctx.exec.on("--points-at", "experiment\n");
    ctx.clock.advance(Duration::from_secs(600));

    assert_eq!(ctx.coordinator.promote_stable().await, Some(GitRef::stable(3)));
}

#[tokio::test]
async fn agent_not_yet_running_is_not_promoted() {
    let ctx = TestContext::new();
    script_healthy_remote(&ctx.exec);
    ctx.exec.on("--format=%aI", HEAD_COMMITTED);
    ctx.clock.advance(Duration::from_secs(600));

    assert_eq!(ctx.coordinator.promote_stable().await, None);
    assert!(ctx.exec.calls().is_empty());
}

#[tokio::test]
async fn empty_repository_is_not_promoted() {
    let ctx = TestContext::new();
    script_healthy_remote(&ctx.exec);
    ctx.ticks(1).await;
    ctx.clock.advance(Duration::from_secs(600));

    assert_eq!(ctx.coordinator.promote_stable().await, None);
}

#[tokio::test]
async fn maintenance_prunes_expired_health_records() {
    let ctx = TestContext::new();
    ctx.probe.push(ProbeOutcome::fail(3, "HTTP 500"));
    ctx.probe.push(ProbeOutcome::fail(3, "HTTP 500"));
    ctx.ticks(2).await;
    assert_eq!(ctx.coordinator.recent_health(10).len(), 2);

    ctx.clock.advance(HEALTH_RETENTION + Duration::from_secs(60));
    let report = ctx.coordinator.maintenance().await;
    assert_eq!(
        report,
        MaintenanceReport {
            pruned: 2,
            tagged: None
        }
    );
    assert!(ctx.coordinator.recent_health(10).is_empty());
    assert_eq!(kinds(&ctx.milestones()), vec![MilestoneKind::Warn, MilestoneKind::Warn]);
}

#[tokio::test]
async fn pruning_nothing_reports_zero() {
    let ctx = TestContext::new();
    assert_eq!(ctx.coordinator.prune_health(), 0);
}
