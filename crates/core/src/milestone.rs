// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Growth milestones: the write-once audit trail of supervisor actions.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of supervisory event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MilestoneKind {
    /// Supervisor or agent boot
    Boot,
    /// A recovery action or destructive operation failed
    Crash,
    /// Health checks passing again after a failure streak
    Recovery,
    /// Failure observed, no remote action taken
    Warn,
    Restart,
    Rollback,
    /// Nuclear rebirth: code directory wiped and bootstrap redeployed
    Rebirth,
    StableTag,
    Commit,
    Backup,
}

impl MilestoneKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MilestoneKind::Boot => "boot",
            MilestoneKind::Crash => "crash",
            MilestoneKind::Recovery => "recovery",
            MilestoneKind::Warn => "warn",
            MilestoneKind::Restart => "restart",
            MilestoneKind::Rollback => "rollback",
            MilestoneKind::Rebirth => "rebirth",
            MilestoneKind::StableTag => "stable_tag",
            MilestoneKind::Commit => "commit",
            MilestoneKind::Backup => "backup",
        }
    }
}

impl fmt::Display for MilestoneKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Append-only audit event. `seq` is assigned by the growth log on append.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrowthMilestone {
    #[serde(default)]
    pub seq: u64,
    pub kind: MilestoneKind,
    pub note: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    pub created_at_ms: u64,
}

impl GrowthMilestone {
    pub fn new(kind: MilestoneKind, note: impl Into<String>, created_at_ms: u64) -> Self {
        Self {
            seq: 0,
            kind,
            note: note.into(),
            git_hash: None,
            metadata: None,
            created_at_ms,
        }
    }

    pub fn with_git_hash(mut self, hash: Option<String>) -> Self {
        self.git_hash = hash;
        self
    }

    /// Insert one metadata field, creating the metadata object if needed.
    pub fn with_meta(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        let mut map = match self.metadata.take() {
            Some(serde_json::Value::Object(map)) => map,
            _ => serde_json::Map::new(),
        };
        map.insert(key.to_string(), value.into());
        self.metadata = Some(serde_json::Value::Object(map));
        self
    }
}

#[cfg(test)]
#[path = "milestone_tests.rs"]
mod tests;
