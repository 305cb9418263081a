// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Supervised agent state machine and status snapshot.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of the supervised agent.
///
/// `dead` and `rebirthing` are not terminal: the supervisor keeps attempting
/// recovery for as long as it runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentState {
    /// Started (or adopted), waiting for the first passing health check
    Starting,
    Running,
    /// Failing health checks, recovery in progress
    Unhealthy,
    /// Recovery actions failed or were exhausted
    Dead,
    /// Code directory is being wiped and the bootstrap redeployed
    Rebirthing,
}

impl AgentState {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentState::Starting => "starting",
            AgentState::Running => "running",
            AgentState::Unhealthy => "unhealthy",
            AgentState::Dead => "dead",
            AgentState::Rebirthing => "rebirthing",
        }
    }

    /// Whether the supervisor may move from `self` to `next`.
    ///
    /// Any state may re-enter `starting` (a restart or rollback relaunches the
    /// process); `rebirthing` may only be left through `starting` or `dead`.
    pub fn can_transition_to(&self, next: AgentState) -> bool {
        use AgentState::*;
        if *self == next {
            return true;
        }
        match (self, next) {
            (_, Starting) => true,
            (Starting, Running) | (Starting, Unhealthy) => true,
            (Running, Unhealthy) => true,
            (Unhealthy, Running) | (Unhealthy, Dead) | (Unhealthy, Rebirthing) => true,
            (Dead, Running) | (Dead, Unhealthy) | (Dead, Rebirthing) => true,
            (Rebirthing, Dead) => true,
            (Starting, Dead) | (Starting, Rebirthing) | (Running, Rebirthing) => true,
            _ => false,
        }
    }
}

impl fmt::Display for AgentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Authoritative snapshot of the supervised agent.
///
/// Owned by the lifecycle coordinator; readers receive clones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentStatus {
    pub state: AgentState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    /// Epoch ms of the last successful start
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_health_check_at_ms: Option<u64>,
    #[serde(default)]
    pub last_health_check_ok: bool,
    #[serde(default)]
    pub consecutive_failures: u32,
    #[serde(default)]
    pub restarts_today: u32,
    /// Local date `restarts_today` counts for
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restarts_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_git_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_git_tag: Option<String>,
    /// Cycle count self-reported by the agent's heartbeat
    #[serde(default)]
    pub cycle: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,
}

impl Default for AgentStatus {
    fn default() -> Self {
        Self {
            state: AgentState::Starting,
            pid: None,
            started_at_ms: None,
            last_health_check_at_ms: None,
            last_health_check_ok: false,
            consecutive_failures: 0,
            restarts_today: 0,
            restarts_date: None,
            current_git_hash: None,
            current_git_tag: None,
            cycle: 0,
            phase: None,
        }
    }
}

impl AgentStatus {
    /// Seconds since the last successful start, if the agent has been started.
    pub fn uptime_secs(&self, now_ms: u64) -> Option<u64> {
        self.started_at_ms.map(|started| now_ms.saturating_sub(started) / 1000)
    }

    /// Record a fresh start: new pid, new start time, state `starting`.
    pub fn mark_started(&mut self, pid: Option<u32>, now_ms: u64) {
        self.state = AgentState::Starting;
        self.pid = pid;
        self.started_at_ms = Some(now_ms);
    }

    /// Count a restart, resetting the daily counter when the local date changed.
    pub fn record_restart(&mut self, today: NaiveDate) {
        if self.restarts_date != Some(today) {
            self.restarts_date = Some(today);
            self.restarts_today = 0;
        }
        self.restarts_today += 1;
    }

    /// Restarts counted for `today` (zero when the stored count is from an earlier date).
    pub fn restarts_on(&self, today: NaiveDate) -> u32 {
        if self.restarts_date == Some(today) {
            self.restarts_today
        } else {
            0
        }
    }

    pub fn record_check(&mut self, ok: bool, at_ms: u64) {
        self.last_health_check_at_ms = Some(at_ms);
        self.last_health_check_ok = ok;
    }
}

#[cfg(test)]
#[path = "agent_tests.rs"]
mod tests;
