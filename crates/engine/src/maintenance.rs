// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Periodic maintenance: health history pruning and stable-tag promotion

use crate::coordinator::Coordinator;
use tracing::Instrument;
use wd_adapters::{HealthProbe, RemoteExecutor};
use wd_core::{
    format_elapsed, is_stable_tag, AgentState, Clock, GitRef, GrowthMilestone, IdGen,
    MilestoneKind, HEALTH_RETENTION,
};

/// What one maintenance pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MaintenanceReport {
    pub pruned: usize,
    pub tagged: Option<GitRef>,
}

impl<E, P, C, I> Coordinator<E, P, C, I>
where
    E: RemoteExecutor,
    P: HealthProbe,
    C: Clock,
    I: IdGen,
{
    pub async fn maintenance(&self) -> MaintenanceReport {
        let pruned = self.prune_health();
        let tagged = self.promote_stable().await;
        MaintenanceReport { pruned, tagged }
    }

    /// Drop health records older than the retention window.
    pub fn prune_health(&self) -> usize {
        let now_ms = self.clock.epoch_ms();
        match self.health.lock().prune_older_than(now_ms, HEALTH_RETENTION) {
            Ok(pruned) => {
                if pruned > 0 {
                    tracing::info!(pruned, "pruned health records");
                }
                pruned
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to prune health records");
                0
            }
        }
    }

    /// Tag HEAD `stable-v(N+1)` once the agent is healthy and HEAD has been
    /// unmodified for the minimum stable duration.
    pub async fn promote_stable(&self) -> Option<GitRef> {
        let Ok(_guard) = self.lifecycle.try_lock() else {
            tracing::debug!("lifecycle busy, skipping stable-tag check");
            return None;
        };
        let status = self.current();
        if status.state != AgentState::Running || !status.last_health_check_ok {
            return None;
        }

        let age = match self.vcs.last_modified_ago(self.clock.utc()).await {
            Ok(Some(age)) => age,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(error = %e, "could not read HEAD age");
                return None;
            }
        };
        if age < self.policy.min_stable {
            return None;
        }
        match self.vcs.current_tag().await {
            Ok(Some(tag)) if is_stable_tag(&tag) => return None,
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(error = %e, "could not read HEAD tag");
                return None;
            }
        }

        let op = self.next_op();
        let span = tracing::info_span!("lifecycle", op = %op.short(8), action = "stable_tag");
        async {
            let tag = match self.vcs.next_stable_tag().await {
                Ok(tag) => tag,
                Err(e) => {
                    tracing::warn!(error = %e, "could not list tags");
                    return None;
                }
            };
            if let Err(e) = self.vcs.tag(&tag).await {
                tracing::warn!(error = %e, tag = %tag, "stable tag failed");
                return None;
            }

            tracing::info!(tag = %tag, head_age = %format_elapsed(age.as_secs()), "promoted stable tag");
            let mut next = self.current();
            self.refresh_git(&mut next).await;
            let hash = next.current_git_hash.clone();
            self.publish(next);
            self.write_milestone(
                GrowthMilestone::new(
                    MilestoneKind::StableTag,
                    format!("tagged {tag} after {}s unmodified", age.as_secs()),
                    self.clock.epoch_ms(),
                )
                .with_git_hash(hash)
                .with_meta("op", op.as_str())
                .with_meta("tag", tag.as_str())
                .with_meta("head_age_secs", age.as_secs()),
            );
            Some(tag)
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
#[path = "maintenance_tests.rs"]
mod tests;
