// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Boot sequence: adopt a running agent or start one
//!
//! Code found without the lifecycle marker belongs to a previous life and is
//! archived and wiped before the bootstrap is deployed.

use crate::coordinator::{transition, Coordinator};
use tracing::Instrument;
use wd_adapters::{HealthProbe, RemoteExecutor};
use wd_core::{AgentState, Clock, GrowthMilestone, IdGen, MilestoneKind, OperationId};

/// What boot found and did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootOutcome {
    /// The executor never answered; the health loop takes over
    ExecutorUnreachable,
    /// An agent was already running from the code directory
    Adopted { pid: u32 },
    Started { pid: u32, deployed: bool },
    Failed,
}

impl<E, P, C, I> Coordinator<E, P, C, I>
where
    E: RemoteExecutor,
    P: HealthProbe,
    C: Clock,
    I: IdGen,
{
    /// Bring the agent up when the supervisor starts.
    ///
    /// Waits for the lifecycle lock rather than failing fast: nothing else
    /// should be running this early.
    pub async fn boot(&self) -> BootOutcome {
        let _guard = self.lifecycle.lock().await;
        let op = self.next_op();
        let span = tracing::info_span!("lifecycle", op = %op.short(8), action = "boot");
        async {
            if !self.process.wait_ready().await {
                tracing::warn!("agent host never answered, deferring to health checks");
                self.begin_grace(self.policy.boot_grace.saturating_mul(2));
                return BootOutcome::ExecutorUnreachable;
            }

            let running = match self.process.discover_pid().await {
                Ok(pid) => pid,
                Err(e) => {
                    tracing::warn!(error = %e, "pid discovery failed");
                    None
                }
            };
            let entry_exists = match self.process.entry_exists().await {
                Ok(exists) => exists,
                Err(e) => {
                    tracing::warn!(error = %e, "entry point check failed");
                    false
                }
            };
            let now_ms = self.clock.epoch_ms();

            if let (Some(pid), true) = (running, entry_exists) {
                tracing::info!(pid, "adopting running agent");
                let mut next = self.current();
                next.mark_started(Some(pid), now_ms);
                self.refresh_git(&mut next).await;
                self.publish(next);
                self.begin_grace(self.policy.boot_grace);
                return BootOutcome::Adopted { pid };
            }

            let repo_exists = match self.vcs.repo_exists().await {
                Ok(exists) => exists,
                Err(e) => {
                    tracing::warn!(error = %e, "repository check failed");
                    false
                }
            };
            // An unreadable marker is treated as present: never wipe on doubt.
            let marker_exists = match self.process.lifecycle_marker_exists().await {
                Ok(exists) => exists,
                Err(e) => {
                    tracing::warn!(error = %e, "lifecycle marker check failed");
                    true
                }
            };

            if (repo_exists || entry_exists) && !marker_exists {
                self.clear_previous_life(&op, repo_exists, entry_exists, now_ms)
                    .await;
            } else if let Err(e) = self.process.stop_all(None).await {
                tracing::warn!(error = %e, "failed to stop stray processes");
            }
            if let Err(e) = self.vcs.init().await {
                tracing::warn!(error = %e, "repository init failed");
            }

            match self.process.start().await {
                Ok(started) => {
                    let mut next = self.current();
                    next.mark_started(Some(started.pid), now_ms);
                    self.refresh_git(&mut next).await;
                    let hash = next.current_git_hash.clone();
                    self.publish(next);
                    self.begin_grace(self.policy.boot_grace);

                    let note = if started.deployed {
                        format!("agent booted from bootstrap (pid {})", started.pid)
                    } else {
                        format!("agent booted (pid {})", started.pid)
                    };
                    self.write_milestone(
                        GrowthMilestone::new(MilestoneKind::Boot, note, now_ms)
                            .with_git_hash(hash)
                            .with_meta("op", op.as_str())
                            .with_meta("pid", started.pid)
                            .with_meta("deployed", started.deployed),
                    );
                    BootOutcome::Started {
                        pid: started.pid,
                        deployed: started.deployed,
                    }
                }
                Err(e) => {
                    tracing::error!(error = %e, "failed to start agent");
                    let mut next = self.current();
                    transition(&mut next, AgentState::Dead);
                    self.publish(next);
                    self.write_milestone(
                        GrowthMilestone::new(MilestoneKind::Crash, "agent failed to start at boot", now_ms)
                            .with_meta("op", op.as_str())
                            .with_meta("error", e.to_string()),
                    );
                    BootOutcome::Failed
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Code left behind without a lifecycle marker is archived and wiped so
    /// the bootstrap starts from an empty directory.
    async fn clear_previous_life(
        &self,
        op: &OperationId,
        had_repository: bool,
        had_entry: bool,
        now_ms: u64,
    ) {
        tracing::warn!(
            had_repository,
            had_entry,
            "previous life without lifecycle marker, wiping code directory"
        );
        let (backup, wipe) = self.escalator.backup_and_wipe(None, self.clock.utc()).await;
        let milestone = GrowthMilestone::new(
            MilestoneKind::Rebirth,
            "boot rebirth: previous life without lifecycle marker, backed up and wiped",
            now_ms,
        )
        .with_meta("op", op.as_str())
        .with_meta("trigger", "boot")
        .with_meta("had_repository", had_repository)
        .with_meta("had_entry", had_entry)
        .with_meta(backup.0, backup.1);
        let milestone = match wipe {
            Ok(report) => milestone
                .with_git_hash(report.hash)
                .with_meta("outcome", "succeeded"),
            Err(e) => {
                tracing::error!(error = %e, "boot wipe failed");
                milestone
                    .with_meta("outcome", "failed")
                    .with_meta("error", e.to_string())
            }
        };
        self.write_milestone(milestone);
    }

    /// Audit entry for the supervisor's own start.
    pub fn record_supervisor_start(&self, version: &str) {
        self.write_milestone(
            GrowthMilestone::new(
                MilestoneKind::Boot,
                format!("supervisor started (v{version})"),
                self.clock.epoch_ms(),
            )
            .with_meta("supervisor", true),
        );
    }
}

#[cfg(test)]
#[path = "boot_tests.rs"]
mod tests;
