// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Growth log: write-once milestones, never pruned.

use crate::jsonl::{JsonlFile, LogError};
use std::path::Path;
use wd_core::GrowthMilestone;

pub struct GrowthLog {
    file: JsonlFile<GrowthMilestone>,
    milestones: Vec<GrowthMilestone>,
    next_seq: u64,
}

impl GrowthLog {
    pub fn open(path: &Path) -> Result<Self, LogError> {
        let (file, milestones) = JsonlFile::<GrowthMilestone>::open(path)?;
        let next_seq = milestones.iter().map(|m| m.seq).max().unwrap_or(0) + 1;
        Ok(Self {
            file,
            milestones,
            next_seq,
        })
    }

    /// Assign the next sequence number and persist. Returns the stored milestone.
    pub fn append(&mut self, mut milestone: GrowthMilestone) -> Result<GrowthMilestone, LogError> {
        milestone.seq = self.next_seq;
        self.file.append(&milestone)?;
        self.next_seq += 1;
        self.milestones.push(milestone.clone());
        Ok(milestone)
    }

    /// Up to `limit` milestones, newest first.
    pub fn recent(&self, limit: usize) -> Vec<GrowthMilestone> {
        self.milestones.iter().rev().take(limit).cloned().collect()
    }

    /// Every milestone in append order.
    pub fn all(&self) -> &[GrowthMilestone] {
        &self.milestones
    }

    pub fn len(&self) -> usize {
        self.milestones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.milestones.is_empty()
    }
}

#[cfg(test)]
#[path = "growth_log_tests.rs"]
mod tests;
