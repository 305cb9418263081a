// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Recovery escalator: carries out the remote rungs of the ladder
//!
//! Choosing the rung is pure ([`wd_core::EscalationTracker`]); choosing the
//! rollback target is pure ([`rollback_target`]). This module only performs
//! the chosen action and reports what happened.

use crate::error::VcsError;
use crate::process::{ProcessController, StartOutcome};
use crate::vcs::{highest_stable_tag, Vcs, WipeReport};
use chrono::{DateTime, Utc};
use serde_json::Value;
use wd_adapters::RemoteExecutor;
use wd_core::{GitRef, RecoveryAction};

/// How an executed action ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    Succeeded,
    /// Nothing to do (e.g. no stable tag to roll back to)
    Skipped(String),
    Failed(String),
}

impl ActionOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionOutcome::Succeeded => "succeeded",
            ActionOutcome::Skipped(_) => "skipped",
            ActionOutcome::Failed(_) => "failed",
        }
    }
}

/// What the escalator did for one action.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionReport {
    pub action: RecoveryAction,
    pub outcome: ActionOutcome,
    pub note: String,
    /// Set when the agent was (re)started
    pub started: Option<StartOutcome>,
    pub meta: Vec<(&'static str, Value)>,
}

impl ActionReport {
    fn new(action: RecoveryAction, outcome: ActionOutcome, note: impl Into<String>) -> Self {
        Self {
            action,
            outcome,
            note: note.into(),
            started: None,
            meta: Vec::new(),
        }
    }

    fn with_meta(mut self, key: &'static str, value: impl Into<Value>) -> Self {
        self.meta.push((key, value.into()));
        self
    }
}

/// The rollback target chosen from the repository's tags: the highest
/// `stable-vN`. Arbitrary commits are never chosen.
pub fn rollback_target(tags: &[String]) -> Option<GitRef> {
    highest_stable_tag(tags)
}

/// Executes restart, rollback and nuclear rebirth.
#[derive(Clone)]
pub struct Escalator<E> {
    vcs: Vcs<E>,
    process: ProcessController<E>,
    backup_max_mb: u64,
}

impl<E: RemoteExecutor> Escalator<E> {
    pub fn new(vcs: Vcs<E>, process: ProcessController<E>, backup_max_mb: u64) -> Self {
        Self {
            vcs,
            process,
            backup_max_mb,
        }
    }

    /// Perform `action` against the agent last known as `pid`.
    pub async fn execute(
        &self,
        action: RecoveryAction,
        pid: Option<u32>,
        now: DateTime<Utc>,
    ) -> ActionReport {
        match action {
            RecoveryAction::Restart => self.restart(pid).await,
            RecoveryAction::Rollback => self.rollback(pid).await,
            RecoveryAction::NuclearRebirth => self.rebirth(pid, now).await,
            RecoveryAction::None | RecoveryAction::Warn => {
                ActionReport::new(action, ActionOutcome::Skipped("no remote action".into()), "")
            }
        }
    }

    async fn restart(&self, pid: Option<u32>) -> ActionReport {
        let action = RecoveryAction::Restart;
        match self.process.restart(pid).await {
            Ok(started) => {
                let mut report = ActionReport::new(
                    action,
                    ActionOutcome::Succeeded,
                    format!("restarted agent (pid {})", started.pid),
                );
                report.started = Some(started);
                report
            }
            Err(e) => {
                tracing::error!(error = %e, "restart failed");
                ActionReport::new(action, ActionOutcome::Failed(e.to_string()), "restart failed")
            }
        }
    }

    async fn rollback(&self, pid: Option<u32>) -> ActionReport {
        let action = RecoveryAction::Rollback;
        let tags = match self.vcs.list_tags().await {
            Ok(tags) => tags,
            Err(e) => {
                return ActionReport::new(
                    action,
                    ActionOutcome::Failed(e.to_string()),
                    "rollback failed: could not list tags",
                )
            }
        };
        let Some(target) = rollback_target(&tags) else {
            tracing::warn!("no stable tag found, skipping rollback");
            return ActionReport::new(
                action,
                ActionOutcome::Skipped("no stable tag".into()),
                "rollback skipped: no stable tag",
            );
        };

        match self.vcs.rollback(target.as_str()).await {
            Ok(report) => {
                let mut out = match self.process.restart(pid).await {
                    Ok(started) => {
                        let mut out = ActionReport::new(
                            action,
                            ActionOutcome::Succeeded,
                            format!("rolled back to {target}"),
                        );
                        out.started = Some(started);
                        out
                    }
                    Err(e) => {
                        tracing::error!(error = %e, target = %target, "restart after rollback failed");
                        ActionReport::new(
                            action,
                            ActionOutcome::Failed(e.to_string()),
                            format!("rolled back to {target}, restart failed"),
                        )
                    }
                };
                out = out.with_meta("target", target.as_str());
                if let Some(from) = report.from {
                    out = out.with_meta("from", from);
                }
                out
            }
            Err(e) => {
                tracing::error!(error = %e, target = %target, "rollback failed");
                ActionReport::new(
                    action,
                    ActionOutcome::Failed(e.to_string()),
                    format!("rollback to {target} failed"),
                )
                .with_meta("target", target.as_str())
            }
        }
    }

    /// Stop everything from the code directory, archive it and wipe it.
    ///
    /// Returns the backup note as a `(metadata key, value)` pair alongside the
    /// wipe result; a failed backup never prevents the wipe.
    pub(crate) async fn backup_and_wipe(
        &self,
        pid: Option<u32>,
        now: DateTime<Utc>,
    ) -> ((&'static str, Value), Result<WipeReport, VcsError>) {
        if let Err(e) = self.process.stop_all(pid).await {
            tracing::warn!(error = %e, "stop before wipe failed");
        }

        let backup = match self.vcs.backup(self.backup_max_mb, now).await {
            Ok(archive) => {
                tracing::info!(archive = %archive, "backed up code directory");
                ("backup", Value::from(archive.as_str()))
            }
            Err(e @ VcsError::TooLarge { .. }) => {
                tracing::warn!(error = %e, "skipping backup");
                ("backup_skipped", Value::from(e.to_string()))
            }
            Err(e) => {
                tracing::warn!(error = %e, "backup failed, wiping anyway");
                ("backup_error", Value::from(e.to_string()))
            }
        };
        (backup, self.vcs.wipe().await)
    }

    async fn rebirth(&self, pid: Option<u32>, now: DateTime<Utc>) -> ActionReport {
        let action = RecoveryAction::NuclearRebirth;
        let (backup, wipe) = self.backup_and_wipe(pid, now).await;
        let wipe = match wipe {
            Ok(wipe) => wipe,
            Err(e) => {
                tracing::error!(error = %e, "wipe failed");
                return ActionReport::new(
                    action,
                    ActionOutcome::Failed(e.to_string()),
                    "nuclear rebirth failed: wipe",
                )
                .with_meta(backup.0, backup.1);
            }
        };
        if !wipe.had_repository {
            if let Err(e) = self.vcs.init().await {
                tracing::warn!(error = %e, "init after wipe failed");
            }
        }

        let report = match self.process.deploy_and_start().await {
            Ok(started) => {
                let mut report = ActionReport::new(
                    action,
                    ActionOutcome::Succeeded,
                    format!("nuclear rebirth: bootstrap redeployed (pid {})", started.pid),
                );
                report.started = Some(started);
                report
            }
            Err(e) => {
                tracing::error!(error = %e, "bootstrap start failed");
                ActionReport::new(
                    action,
                    ActionOutcome::Failed(e.to_string()),
                    "nuclear rebirth failed: bootstrap start",
                )
            }
        };
        report
            .with_meta(backup.0, backup.1)
            .with_meta("had_repository", wipe.had_repository)
    }
}

#[cfg(test)]
#[path = "escalator_tests.rs"]
mod tests;
