// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! wd-core: domain types for the Warden agent supervisor

pub mod agent;
pub mod clock;
pub mod command;
pub mod escalation;
pub mod git;
pub mod health;
pub mod id;
pub mod milestone;
pub mod time_fmt;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use agent::{AgentState, AgentStatus};
pub use clock::{Clock, FakeClock, SystemClock};
pub use command::{shell_quote, CommandBuilder, CommandError, Program, RemoteCommand, SafePath, Step};
pub use escalation::{
    Decision, EscalationLadder, EscalationTracker, PolicyError, RecoveryAction, RecoveryPolicy,
};
pub use git::{
    is_stable_tag, stable_tag_number, CommitEntry, CommitInfo, CommitMessage, GitRef, RefError,
    STABLE_TAG_PREFIX,
};
pub use health::{HealthCheckRecord, HealthStatus, ProbeOutcome, HEALTH_RETENTION};
pub use id::{IdGen, OperationId, SequentialIdGen, ShortId, UuidIdGen};
pub use milestone::{GrowthMilestone, MilestoneKind};
pub use time_fmt::{format_elapsed, format_latency_ms};
