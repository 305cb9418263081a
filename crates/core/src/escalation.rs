// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Escalation ladder: failure counts mapped to recovery actions.
//!
//! The ladder itself is a pure table lookup. [`EscalationTracker`] carries the
//! per-episode bookkeeping that decides whether a rung actually executes.

use crate::milestone::MilestoneKind;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Longest accepted boot grace period.
pub const MAX_BOOT_GRACE: Duration = Duration::from_secs(24 * 60 * 60);

/// Recovery step, ordered by aggressiveness.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryAction {
    #[default]
    None,
    /// Log only
    Warn,
    Restart,
    /// Roll back to the last stable tag
    Rollback,
    /// Wipe the code directory and redeploy the bootstrap
    NuclearRebirth,
}

impl RecoveryAction {
    /// Whether the action issues remote commands.
    pub fn is_remote(&self) -> bool {
        *self > RecoveryAction::Warn
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RecoveryAction::None => "none",
            RecoveryAction::Warn => "warn",
            RecoveryAction::Restart => "restart",
            RecoveryAction::Rollback => "rollback",
            RecoveryAction::NuclearRebirth => "nuclear_rebirth",
        }
    }

    pub fn milestone_kind(&self) -> Option<MilestoneKind> {
        match self {
            RecoveryAction::None => None,
            RecoveryAction::Warn => Some(MilestoneKind::Warn),
            RecoveryAction::Restart => Some(MilestoneKind::Restart),
            RecoveryAction::Rollback => Some(MilestoneKind::Rollback),
            RecoveryAction::NuclearRebirth => Some(MilestoneKind::Rebirth),
        }
    }
}

impl fmt::Display for RecoveryAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PolicyError {
    #[error("escalation thresholds must start at 1 or more")]
    ZeroThreshold,
    #[error("escalation threshold for {action} ({value}) must exceed the previous one ({previous})")]
    NotIncreasing {
        action: RecoveryAction,
        value: u32,
        previous: u32,
    },
    #[error("dead_after ({dead_after}) must exceed rebirth_after ({rebirth_after})")]
    DeadBeforeRebirth { dead_after: u32, rebirth_after: u32 },
    #[error("health check interval must be positive")]
    ZeroInterval,
    #[error("timeout ceiling ({ceiling_ms}ms) must be shorter than the check interval ({interval_ms}ms)")]
    CeilingTooLong { ceiling_ms: u64, interval_ms: u64 },
    #[error("request timeout ({request_ms}ms) must not exceed the timeout ceiling ({ceiling_ms}ms)")]
    RequestAboveCeiling { request_ms: u64, ceiling_ms: u64 },
    #[error("max_restart_attempts must be at least 1")]
    ZeroRestartAttempts,
    #[error("boot grace ({grace_secs}s) must not exceed {max_secs}s")]
    GraceTooLong { grace_secs: u64, max_secs: u64 },
}

/// Recovery configuration, immutable for a supervisor run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryPolicy {
    pub health_check_interval: Duration,
    pub warn_after: u32,
    pub restart_after: u32,
    pub rollback_after: u32,
    pub rebirth_after: u32,
    /// Failures since the last passing check before the agent is `dead`
    pub dead_after: u32,
    pub max_restart_attempts: u32,
    /// Minimum HEAD age before it is promoted to a stable tag
    pub min_stable: Duration,
    pub backup_max_mb: u64,
    pub request_timeout: Duration,
    pub timeout_ceiling: Duration,
    /// Failures this soon after a start are recorded but do not escalate
    pub boot_grace: Duration,
    /// Spacing of `ok` summary records in the health history
    pub health_summary_interval: Duration,
}

impl Default for RecoveryPolicy {
    fn default() -> Self {
        Self {
            health_check_interval: Duration::from_secs(10),
            warn_after: 1,
            restart_after: 3,
            rollback_after: 6,
            rebirth_after: 9,
            dead_after: 12,
            max_restart_attempts: 3,
            min_stable: Duration::from_secs(300),
            backup_max_mb: 250,
            request_timeout: Duration::from_millis(5000),
            timeout_ceiling: Duration::from_millis(8000),
            boot_grace: Duration::from_secs(30),
            health_summary_interval: Duration::from_secs(600),
        }
    }
}

impl RecoveryPolicy {
    pub fn validate(&self) -> Result<(), PolicyError> {
        EscalationLadder::from_policy(self)?;
        if self.dead_after <= self.rebirth_after {
            return Err(PolicyError::DeadBeforeRebirth {
                dead_after: self.dead_after,
                rebirth_after: self.rebirth_after,
            });
        }
        if self.health_check_interval.is_zero() {
            return Err(PolicyError::ZeroInterval);
        }
        let interval_ms = self.health_check_interval.as_millis() as u64;
        let ceiling_ms = self.timeout_ceiling.as_millis() as u64;
        let request_ms = self.request_timeout.as_millis() as u64;
        if ceiling_ms >= interval_ms {
            return Err(PolicyError::CeilingTooLong { ceiling_ms, interval_ms });
        }
        if request_ms > ceiling_ms {
            return Err(PolicyError::RequestAboveCeiling { request_ms, ceiling_ms });
        }
        if self.max_restart_attempts == 0 {
            return Err(PolicyError::ZeroRestartAttempts);
        }
        if self.boot_grace > MAX_BOOT_GRACE {
            return Err(PolicyError::GraceTooLong {
                grace_secs: self.boot_grace.as_secs(),
                max_secs: MAX_BOOT_GRACE.as_secs(),
            });
        }
        Ok(())
    }
}

/// Ordered `(threshold, action)` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EscalationLadder {
    rungs: Vec<(u32, RecoveryAction)>,
}

impl EscalationLadder {
    /// Build a ladder from rungs in ascending order of both threshold and action.
    pub fn new(rungs: Vec<(u32, RecoveryAction)>) -> Result<Self, PolicyError> {
        let mut previous: Option<(u32, RecoveryAction)> = None;
        for &(threshold, action) in &rungs {
            if threshold == 0 {
                return Err(PolicyError::ZeroThreshold);
            }
            if let Some((prev_threshold, prev_action)) = previous {
                if threshold <= prev_threshold || action <= prev_action {
                    return Err(PolicyError::NotIncreasing {
                        action,
                        value: threshold,
                        previous: prev_threshold,
                    });
                }
            }
            previous = Some((threshold, action));
        }
        Ok(Self { rungs })
    }

    pub fn from_policy(policy: &RecoveryPolicy) -> Result<Self, PolicyError> {
        Self::new(vec![
            (policy.warn_after, RecoveryAction::Warn),
            (policy.restart_after, RecoveryAction::Restart),
            (policy.rollback_after, RecoveryAction::Rollback),
            (policy.rebirth_after, RecoveryAction::NuclearRebirth),
        ])
    }

    /// Action of the highest rung whose threshold is `<= failures`.
    pub fn action_for(&self, failures: u32) -> RecoveryAction {
        self.rungs
            .iter()
            .rev()
            .find(|(threshold, _)| *threshold <= failures)
            .map(|(_, action)| *action)
            .unwrap_or(RecoveryAction::None)
    }

    /// The most aggressive action on the ladder.
    pub fn top(&self) -> RecoveryAction {
        self.rungs.last().map(|(_, action)| *action).unwrap_or_default()
    }

    pub fn threshold_for(&self, action: RecoveryAction) -> Option<u32> {
        self.rungs
            .iter()
            .find(|(_, a)| *a == action)
            .map(|(threshold, _)| *threshold)
    }
}

/// Outcome of feeding one failure to the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub action: RecoveryAction,
    /// Failures in the current episode, including this one
    pub episode: u32,
    /// Whether a milestone should be written for this decision
    pub record: bool,
}

/// Per-episode escalation bookkeeping.
///
/// An episode starts at the first failure after an `ok` (or after the top rung
/// ran). A remote rung executes only when it is more aggressive than the last
/// rung executed in the episode; other failures are warnings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EscalationTracker {
    episode: u32,
    consecutive: u32,
    streak: u32,
    unresolved: u32,
    last_executed: RecoveryAction,
}

impl EscalationTracker {
    /// Failures since the last `ok` or the last executed remote action.
    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive
    }

    pub fn episode(&self) -> u32 {
        self.episode
    }

    /// Failures since the last `ok`, across executed actions.
    pub fn streak(&self) -> u32 {
        self.streak
    }

    /// Failures since the last `ok` or the last successful remote action.
    pub fn unresolved_failures(&self) -> u32 {
        self.unresolved
    }

    pub fn on_failure(&mut self, ladder: &EscalationLadder) -> Decision {
        self.episode = self.episode.saturating_add(1);
        self.consecutive = self.consecutive.saturating_add(1);
        self.streak = self.streak.saturating_add(1);
        self.unresolved = self.unresolved.saturating_add(1);

        let planned = ladder.action_for(self.episode);
        if planned.is_remote() && planned > self.last_executed {
            return Decision {
                action: planned,
                episode: self.episode,
                record: true,
            };
        }
        if planned == RecoveryAction::None {
            return Decision {
                action: RecoveryAction::None,
                episode: self.episode,
                record: false,
            };
        }
        Decision {
            action: RecoveryAction::Warn,
            episode: self.episode,
            record: self.last_executed == RecoveryAction::None,
        }
    }

    /// Record that a remote action ran. Only a successful action clears the
    /// unresolved count.
    pub fn action_completed(
        &mut self,
        action: RecoveryAction,
        succeeded: bool,
        ladder: &EscalationLadder,
    ) {
        self.consecutive = 0;
        if succeeded {
            self.unresolved = 0;
        }
        if action >= ladder.top() {
            self.episode = 0;
            self.last_executed = RecoveryAction::None;
        } else {
            self.last_executed = self.last_executed.max(action);
        }
    }

    /// Reset on a passing check. Returns the failure streak that just ended.
    pub fn on_ok(&mut self) -> u32 {
        let streak = self.streak;
        *self = Self::default();
        streak
    }
}

#[cfg(test)]
#[path = "escalation_tests.rs"]
mod tests;
