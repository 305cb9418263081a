// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent health probes

mod http;

pub use http::{classify_response, HttpHealthProbe, ProbeConfig};

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeProbe;

use async_trait::async_trait;
use wd_core::ProbeOutcome;

/// Polls the agent's health endpoint once.
///
/// Probes never fail: every error is classified into the returned outcome.
#[async_trait]
pub trait HealthProbe: Clone + Send + Sync + 'static {
    async fn check(&self) -> ProbeOutcome;
}
