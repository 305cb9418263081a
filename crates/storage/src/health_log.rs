// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Health-check history with a rolling retention window.

use crate::jsonl::{JsonlFile, LogError};
use std::path::Path;
use std::time::Duration;
use wd_core::HealthCheckRecord;

pub struct HealthLog {
    file: JsonlFile<HealthCheckRecord>,
    records: Vec<HealthCheckRecord>,
}

impl HealthLog {
    pub fn open(path: &Path) -> Result<Self, LogError> {
        let (file, records) = JsonlFile::open(path)?;
        Ok(Self { file, records })
    }

    pub fn append(&mut self, record: HealthCheckRecord) -> Result<(), LogError> {
        self.file.append(&record)?;
        self.records.push(record);
        Ok(())
    }

    /// Drop records older than `retention` relative to `now_ms`.
    ///
    /// Returns the number of records removed; the file is only rewritten when
    /// something was removed.
    pub fn prune_older_than(&mut self, now_ms: u64, retention: Duration) -> Result<usize, LogError> {
        let before = self.records.len();
        let kept: Vec<HealthCheckRecord> = self
            .records
            .iter()
            .filter(|r| !r.is_expired(now_ms, retention))
            .cloned()
            .collect();
        let removed = before - kept.len();
        if removed > 0 {
            self.file.rewrite(&kept)?;
            self.records = kept;
        }
        Ok(removed)
    }

    /// Up to `limit` records, newest first.
    pub fn recent(&self, limit: usize) -> Vec<HealthCheckRecord> {
        self.records.iter().rev().take(limit).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
#[path = "health_log_tests.rs"]
mod tests;
