// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lifecycle coordinator
//!
//! Owns the authoritative [`AgentStatus`] and the lifecycle lock. Health
//! ticks, manual triggers, boot and maintenance all run their state-changing
//! work while holding the lock, so at most one lifecycle operation touches
//! the agent or its code directory at a time.

use crate::error::CoordinatorError;
use crate::escalator::{ActionOutcome, ActionReport, Escalator};
use crate::monitor::HealthMonitor;
use crate::process::ProcessController;
use crate::vcs::Vcs;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::time::Duration;
use tracing::Instrument;
use wd_adapters::{HealthProbe, RemoteExecutor};
use wd_core::{
    AgentState, AgentStatus, Clock, CommitEntry, CommitInfo, CommitMessage, Decision,
    EscalationLadder, EscalationTracker, GitRef, GrowthMilestone, HealthCheckRecord, IdGen,
    MilestoneKind, OperationId, PolicyError, ProbeOutcome, RecoveryAction, RecoveryPolicy,
};
use wd_storage::{GrowthLog, HealthLog};

/// Coordinator settings
#[derive(Debug, Clone, Default)]
pub struct CoordinatorConfig {
    pub policy: RecoveryPolicy,
}

/// Adapters and stores the coordinator drives
pub struct CoordinatorDeps<E, P> {
    pub vcs: Vcs<E>,
    pub process: ProcessController<E>,
    pub probe: P,
    pub health: HealthLog,
    pub growth: GrowthLog,
}

/// Read-only view of the agent handed to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusSnapshot {
    #[serde(flatten)]
    pub status: AgentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uptime_secs: Option<u64>,
}

/// What one health tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Another lifecycle operation held the lock
    Skipped,
    Healthy,
    /// Failed inside the post-start grace period; not escalated
    Grace,
    Failed(Decision),
}

/// Result of a manual restart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestartResult {
    pub previous_pid: Option<u32>,
    pub pid: u32,
}

/// Result of a manual rollback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RollbackResult {
    pub from: Option<String>,
    pub to: GitRef,
    pub pid: u32,
}

/// Escalation bookkeeping, only touched by lifecycle operations.
#[derive(Debug, Default)]
pub(crate) struct Supervision {
    pub(crate) tracker: EscalationTracker,
    pub(crate) grace_until_ms: u64,
}

/// Serializes every lifecycle operation on the agent.
pub struct Coordinator<E, P, C: Clock, I: IdGen> {
    pub(crate) vcs: Vcs<E>,
    pub(crate) process: ProcessController<E>,
    pub(crate) escalator: Escalator<E>,
    pub(crate) monitor: HealthMonitor<P>,
    pub(crate) policy: RecoveryPolicy,
    pub(crate) ladder: EscalationLadder,
    pub(crate) clock: C,
    pub(crate) ids: I,
    status: RwLock<AgentStatus>,
    pub(crate) lifecycle: tokio::sync::Mutex<()>,
    pub(crate) supervision: Mutex<Supervision>,
    pub(crate) health: Mutex<HealthLog>,
    growth: Mutex<GrowthLog>,
}

impl<E, P, C, I> Coordinator<E, P, C, I>
where
    E: RemoteExecutor,
    P: HealthProbe,
    C: Clock,
    I: IdGen,
{
    pub fn new(
        deps: CoordinatorDeps<E, P>,
        clock: C,
        ids: I,
        config: CoordinatorConfig,
    ) -> Result<Self, PolicyError> {
        config.policy.validate()?;
        let ladder = EscalationLadder::from_policy(&config.policy)?;
        let escalator = Escalator::new(
            deps.vcs.clone(),
            deps.process.clone(),
            config.policy.backup_max_mb,
        );
        Ok(Self {
            vcs: deps.vcs,
            process: deps.process,
            escalator,
            monitor: HealthMonitor::new(deps.probe, config.policy.health_summary_interval),
            policy: config.policy,
            ladder,
            clock,
            ids,
            status: RwLock::new(AgentStatus::default()),
            lifecycle: tokio::sync::Mutex::new(()),
            supervision: Mutex::new(Supervision::default()),
            health: Mutex::new(deps.health),
            growth: Mutex::new(deps.growth),
        })
    }

    pub fn policy(&self) -> &RecoveryPolicy {
        &self.policy
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Immutable copy of the agent status, with derived uptime.
    pub fn status(&self) -> StatusSnapshot {
        let mut status = self.current();
        let today = self.clock.local_date();
        status.restarts_today = status.restarts_on(today);
        let uptime_secs = status.uptime_secs(self.clock.epoch_ms());
        StatusSnapshot {
            status,
            uptime_secs,
        }
    }

    pub(crate) fn current(&self) -> AgentStatus {
        self.status.read().clone()
    }

    /// Replace the whole snapshot at once. Heartbeat fields are owned by
    /// [`Self::record_heartbeat`] and carried over from the stored snapshot.
    pub(crate) fn publish(&self, mut next: AgentStatus) {
        let mut status = self.status.write();
        next.cycle = status.cycle;
        next.phase = status.phase.take();
        *status = next;
    }

    pub(crate) fn next_op(&self) -> OperationId {
        OperationId::generate(&self.ids)
    }

    /// Store the agent's self-reported progress.
    pub fn record_heartbeat(&self, cycle: u64, phase: Option<String>) {
        let mut status = self.status.write();
        status.cycle = cycle;
        status.phase = phase;
    }

    pub async fn git_log(&self, limit: usize) -> Result<Vec<CommitEntry>, CoordinatorError> {
        Ok(self.vcs.log(limit).await?)
    }

    pub fn recent_milestones(&self, limit: usize) -> Vec<GrowthMilestone> {
        self.growth.lock().recent(limit)
    }

    pub fn recent_health(&self, limit: usize) -> Vec<HealthCheckRecord> {
        self.health.lock().recent(limit)
    }

    pub(crate) fn write_milestone(&self, milestone: GrowthMilestone) {
        tracing::info!(kind = %milestone.kind, note = %milestone.note, "milestone");
        if let Err(e) = self.growth.lock().append(milestone) {
            tracing::error!(error = %e, "failed to write growth milestone");
        }
    }

    fn record_health(&self, outcome: &ProbeOutcome, recovered_after: u32, now_ms: u64) {
        let Some(record) = self.monitor.record_for(outcome, recovered_after, now_ms) else {
            return;
        };
        if let Err(e) = self.health.lock().append(record) {
            tracing::warn!(error = %e, "failed to write health record");
        }
    }

    /// Suppress escalation for `grace` from now.
    pub(crate) fn begin_grace(&self, grace: Duration) {
        let grace_ms = u64::try_from(grace.as_millis()).unwrap_or(u64::MAX);
        let until = self.clock.epoch_ms().saturating_add(grace_ms);
        self.supervision.lock().grace_until_ms = until;
    }

    /// Refresh the denormalized HEAD hash and tag. Read failures keep the old values.
    pub(crate) async fn refresh_git(&self, status: &mut AgentStatus) {
        match self.vcs.current_hash().await {
            Ok(hash) => status.current_git_hash = hash,
            Err(e) => tracing::warn!(error = %e, "could not read HEAD"),
        }
        match self.vcs.current_tag().await {
            Ok(tag) => status.current_git_tag = tag,
            Err(e) => tracing::warn!(error = %e, "could not read HEAD tag"),
        }
    }

    /// One health check, skipped when a lifecycle operation is in flight.
    pub async fn health_tick(&self) -> TickOutcome {
        let Ok(_guard) = self.lifecycle.try_lock() else {
            tracing::debug!("lifecycle busy, skipping health check");
            return TickOutcome::Skipped;
        };
        let outcome = self.monitor.check().await;
        let now_ms = self.clock.epoch_ms();
        if outcome.status.is_ok() {
            self.on_ok(outcome, now_ms).await
        } else {
            self.on_failure(outcome, now_ms).await
        }
    }

    async fn on_ok(&self, outcome: ProbeOutcome, now_ms: u64) -> TickOutcome {
        let streak = self.supervision.lock().tracker.on_ok();
        self.record_health(&outcome, streak, now_ms);

        let mut next = self.current();
        if next.pid.is_none() {
            match self.process.discover_pid().await {
                Ok(Some(pid)) => {
                    tracing::info!(pid, "discovered agent pid");
                    next.pid = Some(pid);
                }
                Ok(None) => {}
                Err(e) => tracing::debug!(error = %e, "pid discovery failed"),
            }
        }
        next.record_check(true, now_ms);
        next.consecutive_failures = 0;
        if next.state != AgentState::Running {
            tracing::info!(from = %next.state, "agent healthy");
            transition(&mut next, AgentState::Running);
        }
        self.publish(next);

        if streak > 0 {
            self.write_milestone(
                GrowthMilestone::new(
                    MilestoneKind::Recovery,
                    format!("recovered after {streak} failed health checks"),
                    now_ms,
                )
                .with_meta("recovered_after", streak),
            );
        }
        TickOutcome::Healthy
    }

    async fn on_failure(&self, outcome: ProbeOutcome, now_ms: u64) -> TickOutcome {
        self.record_health(&outcome, 0, now_ms);
        let detail = failure_reason(&outcome);

        let escalation = {
            let mut supervision = self.supervision.lock();
            if now_ms < supervision.grace_until_ms {
                None
            } else {
                let decision = supervision.tracker.on_failure(&self.ladder);
                Some((
                    decision,
                    supervision.tracker.consecutive_failures(),
                    supervision.tracker.unresolved_failures(),
                ))
            }
        };

        let mut next = self.current();
        next.record_check(false, now_ms);
        let Some((decision, consecutive, unresolved)) = escalation else {
            tracing::debug!(reason = %detail, "health check failed within grace period");
            self.publish(next);
            return TickOutcome::Grace;
        };

        next.consecutive_failures = consecutive;
        if matches!(next.state, AgentState::Running | AgentState::Starting) {
            transition(&mut next, AgentState::Unhealthy);
        }
        let crashed = unresolved == self.policy.dead_after;
        if crashed && next.state != AgentState::Dead {
            transition(&mut next, AgentState::Dead);
        }
        self.publish(next);

        tracing::warn!(
            failures = decision.episode,
            status = %outcome.status,
            reason = %detail,
            "health check failed"
        );
        if crashed {
            self.write_milestone(
                GrowthMilestone::new(
                    MilestoneKind::Crash,
                    format!("agent dead after {unresolved} failed health checks"),
                    now_ms,
                )
                .with_meta("failures", unresolved),
            );
        }

        match decision.action {
            RecoveryAction::None => {}
            RecoveryAction::Warn => {
                if decision.record {
                    self.write_milestone(
                        GrowthMilestone::new(
                            MilestoneKind::Warn,
                            format!("health check failed ({} consecutive)", decision.episode),
                            now_ms,
                        )
                        .with_meta("failures", decision.episode)
                        .with_meta("status", outcome.status.as_str()),
                    );
                }
            }
            action => self.run_action(action, decision.episode).await,
        }
        TickOutcome::Failed(decision)
    }

    /// Execute a remote rung and settle status, tracker and audit trail.
    async fn run_action(&self, action: RecoveryAction, failures: u32) {
        let op = self.next_op();
        let span = tracing::info_span!("lifecycle", op = %op.short(8), action = %action.as_str());
        async {
            tracing::warn!(failures, "executing recovery action");
            if action == RecoveryAction::NuclearRebirth {
                let mut rebirthing = self.current();
                transition(&mut rebirthing, AgentState::Rebirthing);
                self.publish(rebirthing);
            }

            let pid = self.status.read().pid;
            let report = self.escalator.execute(action, pid, self.clock.utc()).await;
            let succeeded = report.outcome == ActionOutcome::Succeeded;
            self.supervision
                .lock()
                .tracker
                .action_completed(action, succeeded, &self.ladder);

            let now_ms = self.clock.epoch_ms();
            let mut next = self.current();
            next.consecutive_failures = 0;
            self.refresh_git(&mut next).await;
            if action == RecoveryAction::Restart
                || (action == RecoveryAction::Rollback && report.started.is_some())
            {
                next.record_restart(self.clock.local_date());
            }
            if let Some(started) = report.started {
                next.mark_started(Some(started.pid), now_ms);
                self.begin_grace(self.policy.boot_grace);
            }
            match &report.outcome {
                ActionOutcome::Failed(_) => transition(&mut next, AgentState::Dead),
                ActionOutcome::Skipped(_) if next.state == AgentState::Rebirthing => {
                    transition(&mut next, AgentState::Dead)
                }
                _ => {}
            }
            let hash = next.current_git_hash.clone();
            self.publish(next);

            self.write_milestone(action_milestone(&report, &op, failures, hash, now_ms));
        }
        .instrument(span)
        .await
    }

    /// Manual restart. Returns the previous pid.
    pub async fn restart(&self) -> Result<RestartResult, CoordinatorError> {
        let _guard = self
            .lifecycle
            .try_lock()
            .map_err(|_| CoordinatorError::Busy)?;
        let op = self.next_op();
        let span = tracing::info_span!("lifecycle", op = %op.short(8), action = "manual_restart");
        async {
            let previous_pid = self.status.read().pid;
            let started = match self.process.restart(previous_pid).await {
                Ok(started) => started,
                Err(e) => {
                    self.write_failed_manual(MilestoneKind::Restart, "manual restart failed", &op, &e);
                    return Err(e.into());
                }
            };
            self.settle_manual(RecoveryAction::Restart);

            let now_ms = self.clock.epoch_ms();
            let mut next = self.current();
            next.mark_started(Some(started.pid), now_ms);
            next.record_restart(self.clock.local_date());
            next.consecutive_failures = 0;
            self.refresh_git(&mut next).await;
            let hash = next.current_git_hash.clone();
            self.publish(next);
            self.begin_grace(self.policy.boot_grace);

            let mut milestone = GrowthMilestone::new(
                MilestoneKind::Restart,
                format!("manual restart (pid {})", started.pid),
                now_ms,
            )
            .with_git_hash(hash)
            .with_meta("op", op.as_str())
            .with_meta("trigger", "manual")
            .with_meta("outcome", "succeeded");
            if let Some(pid) = previous_pid {
                milestone = milestone.with_meta("previous_pid", pid);
            }
            self.write_milestone(milestone);
            Ok(RestartResult {
                previous_pid,
                pid: started.pid,
            })
        }
        .instrument(span)
        .await
    }

    /// Manual rollback to an explicit tag or commit, then restart.
    pub async fn rollback(&self, target: &str) -> Result<RollbackResult, CoordinatorError> {
        let target = GitRef::parse(target).map_err(CoordinatorError::InvalidTarget)?;
        let _guard = self
            .lifecycle
            .try_lock()
            .map_err(|_| CoordinatorError::Busy)?;
        let op = self.next_op();
        let span = tracing::info_span!("lifecycle", op = %op.short(8), action = "manual_rollback");
        async {
            let report = match self.vcs.rollback(target.as_str()).await {
                Ok(report) => report,
                Err(e) if e.is_policy_invalid() => return Err(e.into()),
                Err(e) => {
                    self.write_failed_manual(MilestoneKind::Rollback, "manual rollback failed", &op, &e);
                    return Err(e.into());
                }
            };
            let previous_pid = self.status.read().pid;
            let started = match self.process.restart(previous_pid).await {
                Ok(started) => started,
                Err(e) => {
                    self.write_failed_manual(
                        MilestoneKind::Rollback,
                        &format!("rolled back to {target}, restart failed"),
                        &op,
                        &e,
                    );
                    return Err(e.into());
                }
            };
            self.settle_manual(RecoveryAction::Rollback);

            let now_ms = self.clock.epoch_ms();
            let mut next = self.current();
            next.mark_started(Some(started.pid), now_ms);
            next.record_restart(self.clock.local_date());
            next.consecutive_failures = 0;
            self.refresh_git(&mut next).await;
            let hash = next.current_git_hash.clone();
            self.publish(next);
            self.begin_grace(self.policy.boot_grace);

            let mut milestone = GrowthMilestone::new(
                MilestoneKind::Rollback,
                format!("manual rollback to {target}"),
                now_ms,
            )
            .with_git_hash(hash)
            .with_meta("op", op.as_str())
            .with_meta("trigger", "manual")
            .with_meta("outcome", "succeeded")
            .with_meta("target", target.as_str());
            if let Some(from) = &report.from {
                milestone = milestone.with_meta("from", from.as_str());
            }
            self.write_milestone(milestone);
            Ok(RollbackResult {
                from: report.from,
                to: report.to,
                pid: started.pid,
            })
        }
        .instrument(span)
        .await
    }

    /// Manual commit. `None` when nothing changed.
    pub async fn commit(&self, message: &str) -> Result<Option<CommitInfo>, CoordinatorError> {
        let message = CommitMessage::parse(message).map_err(CoordinatorError::InvalidMessage)?;
        let _guard = self
            .lifecycle
            .try_lock()
            .map_err(|_| CoordinatorError::Busy)?;
        let op = self.next_op();
        let span = tracing::info_span!("lifecycle", op = %op.short(8), action = "manual_commit");
        async {
            let info = match self.vcs.commit_with_timestamp(&message).await {
                Ok(info) => info,
                Err(e) if e.is_policy_invalid() => return Err(e.into()),
                Err(e) => {
                    self.write_failed_manual(MilestoneKind::Commit, "manual commit failed", &op, &e);
                    return Err(e.into());
                }
            };

            let now_ms = self.clock.epoch_ms();
            let mut next = self.current();
            self.refresh_git(&mut next).await;
            let hash = next.current_git_hash.clone();
            self.publish(next);

            let milestone = GrowthMilestone::new(MilestoneKind::Commit, message.as_str(), now_ms)
                .with_git_hash(hash)
                .with_meta("op", op.as_str())
                .with_meta("trigger", "manual");
            let milestone = match &info {
                Some(_) => milestone.with_meta("outcome", "succeeded"),
                None => milestone
                    .with_meta("outcome", "skipped")
                    .with_meta("nothing_to_commit", true),
            };
            self.write_milestone(milestone);
            Ok(info)
        }
        .instrument(span)
        .await
    }

    /// A successful manual action counts as an executed rung.
    fn settle_manual(&self, action: RecoveryAction) {
        self.supervision
            .lock()
            .tracker
            .action_completed(action, true, &self.ladder);
    }

    fn write_failed_manual(
        &self,
        kind: MilestoneKind,
        note: &str,
        op: &OperationId,
        error: &dyn std::fmt::Display,
    ) {
        tracing::error!(error = %error, "{note}");
        self.write_milestone(
            GrowthMilestone::new(kind, note, self.clock.epoch_ms())
                .with_git_hash(self.status.read().current_git_hash.clone())
                .with_meta("op", op.as_str())
                .with_meta("trigger", "manual")
                .with_meta("outcome", "failed")
                .with_meta("error", error.to_string()),
        );
    }
}

/// Move `status` to `next` when the state machine allows it.
pub(crate) fn transition(status: &mut AgentStatus, next: AgentState) {
    if status.state.can_transition_to(next) {
        status.state = next;
    } else {
        tracing::debug!(from = %status.state, to = %next, "ignoring disallowed state transition");
    }
}

fn failure_reason(outcome: &ProbeOutcome) -> String {
    outcome
        .detail
        .as_ref()
        .and_then(|d| d.get("error"))
        .and_then(|e| e.as_str())
        .unwrap_or(outcome.status.as_str())
        .to_string()
}

fn action_milestone(
    report: &ActionReport,
    op: &OperationId,
    failures: u32,
    hash: Option<String>,
    now_ms: u64,
) -> GrowthMilestone {
    let kind = report
        .action
        .milestone_kind()
        .unwrap_or(MilestoneKind::Warn);
    let mut milestone = GrowthMilestone::new(
        kind,
        format!("{} after {failures} failed health checks", report.note),
        now_ms,
    )
    .with_git_hash(hash)
    .with_meta("op", op.as_str())
    .with_meta("trigger", "escalation")
    .with_meta("failures", failures)
    .with_meta("outcome", report.outcome.as_str());
    match &report.outcome {
        ActionOutcome::Failed(error) => milestone = milestone.with_meta("error", error.as_str()),
        ActionOutcome::Skipped(reason) => milestone = milestone.with_meta("reason", reason.as_str()),
        ActionOutcome::Succeeded => {}
    }
    if let Some(started) = report.started {
        milestone = milestone.with_meta("pid", started.pid);
    }
    for (key, value) in &report.meta {
        milestone = milestone.with_meta(key, value.clone());
    }
    milestone
}

#[cfg(test)]
#[path = "coordinator_tests.rs"]
mod tests;
