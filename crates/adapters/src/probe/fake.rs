// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake health probe for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::HealthProbe;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use wd_core::ProbeOutcome;

struct FakeProbeState {
    queued: VecDeque<ProbeOutcome>,
    fallback: ProbeOutcome,
    checks: usize,
}

/// Probe returning queued outcomes, then a fallback outcome.
#[derive(Clone)]
pub struct FakeProbe {
    inner: Arc<Mutex<FakeProbeState>>,
}

impl Default for FakeProbe {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(FakeProbeState {
                queued: VecDeque::new(),
                fallback: ProbeOutcome::ok(1),
                checks: 0,
            })),
        }
    }
}

impl FakeProbe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, outcome: ProbeOutcome) {
        self.inner.lock().queued.push_back(outcome);
    }

    /// Outcome returned once the queue is empty.
    pub fn set_fallback(&self, outcome: ProbeOutcome) {
        self.inner.lock().fallback = outcome;
    }

    pub fn checks(&self) -> usize {
        self.inner.lock().checks
    }
}

#[async_trait]
impl HealthProbe for FakeProbe {
    async fn check(&self) -> ProbeOutcome {
        let mut state = self.inner.lock();
        state.checks += 1;
        match state.queued.pop_front() {
            Some(outcome) => outcome,
            None => state.fallback.clone(),
        }
    }
}
