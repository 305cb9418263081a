// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test helpers for use across crates.
//!
//! Gated behind `#[cfg(any(test, feature = "test-support"))]`.

use crate::{GrowthMilestone, MilestoneKind, RecoveryPolicy, SafePath};
use std::time::Duration;

/// Default policy without the post-start grace period, so every failure escalates.
pub fn policy_without_grace() -> RecoveryPolicy {
    RecoveryPolicy {
        boot_grace: Duration::ZERO,
        ..RecoveryPolicy::default()
    }
}

/// Kinds of `milestones`, in order.
pub fn kinds(milestones: &[GrowthMilestone]) -> Vec<MilestoneKind> {
    milestones.iter().map(|m| m.kind).collect()
}

/// A known-valid [`SafePath`].
pub fn safe_path(raw: &str) -> SafePath {
    match SafePath::parse(raw) {
        Ok(p) => p,
        Err(e) => unreachable!("test path {raw:?} must be safe: {e}"),
    }
}
