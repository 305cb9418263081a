// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Warden supervision engine

mod boot;
mod coordinator;
mod error;
mod escalator;
mod maintenance;
mod monitor;
mod process;
mod seed;
mod vcs;

#[cfg(test)]
mod test_helpers;

pub use boot::BootOutcome;
pub use coordinator::{
    Coordinator, CoordinatorConfig, CoordinatorDeps, RestartResult, RollbackResult,
    StatusSnapshot, TickOutcome,
};
pub use error::{CoordinatorError, ProcessError, SeedError, VcsError};
pub use escalator::{rollback_target, ActionOutcome, ActionReport, Escalator};
pub use maintenance::MaintenanceReport;
pub use monitor::HealthMonitor;
pub use process::{ProcessConfig, ProcessController, StartOutcome, DEFAULT_LIFECYCLE_MARKER};
pub use seed::{Seed, SeedParams};
pub use vcs::{RollbackReport, Vcs, VcsConfig, WipeReport};
