// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Health monitor: runs the probe and decides which observations are history

use parking_lot::Mutex;
use std::time::Duration;
use wd_adapters::HealthProbe;
use wd_core::{HealthCheckRecord, ProbeOutcome};

/// Wraps a [`HealthProbe`] with the record policy.
///
/// Every non-`ok` check is recorded. Of the `ok` checks, only the first one
/// after a failure streak and one summary per `summary_interval` are kept.
pub struct HealthMonitor<P> {
    probe: P,
    summary_interval_ms: u64,
    last_ok_record_ms: Mutex<Option<u64>>,
}

impl<P: HealthProbe> HealthMonitor<P> {
    pub fn new(probe: P, summary_interval: Duration) -> Self {
        Self {
            probe,
            summary_interval_ms: summary_interval.as_millis() as u64,
            last_ok_record_ms: Mutex::new(None),
        }
    }

    pub async fn check(&self) -> ProbeOutcome {
        self.probe.check().await
    }

    /// The record to persist for `outcome`, if any.
    ///
    /// `recovered_after` is the failure streak an `ok` outcome just ended.
    pub fn record_for(
        &self,
        outcome: &ProbeOutcome,
        recovered_after: u32,
        now_ms: u64,
    ) -> Option<HealthCheckRecord> {
        let record = HealthCheckRecord::from_outcome(outcome.clone(), now_ms);
        if !outcome.status.is_ok() {
            return Some(record);
        }

        let mut last = self.last_ok_record_ms.lock();
        if recovered_after > 0 {
            *last = Some(now_ms);
            return Some(record.with_detail("recovered_after", recovered_after));
        }
        let due = match *last {
            None => true,
            Some(at) => now_ms.saturating_sub(at) >= self.summary_interval_ms,
        };
        if due {
            *last = Some(now_ms);
            Some(record.with_detail("summary", true))
        } else {
            None
        }
    }
}

#[cfg(test)]
#[path = "monitor_tests.rs"]
mod tests;
