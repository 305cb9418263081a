// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Traced adapter wrappers for consistent observability

use crate::executor::{ExecError, RemoteExecutor};
use crate::probe::HealthProbe;
use async_trait::async_trait;
use std::time::{Duration, Instant};
use tracing::Instrument;
use wd_core::{format_latency_ms, ProbeOutcome, RemoteCommand};

/// Longest command prefix written to logs.
const LOGGED_COMMAND_CHARS: usize = 160;

fn command_summary(command: &RemoteCommand) -> &str {
    let s = command.as_str();
    match s.char_indices().nth(LOGGED_COMMAND_CHARS) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Wrapper that adds tracing to any RemoteExecutor
#[derive(Clone)]
pub struct TracedExecutor<E> {
    inner: E,
}

impl<E> TracedExecutor<E> {
    pub fn new(inner: E) -> Self {
        Self { inner }
    }
}

fn log_result(result: &Result<String, ExecError>, elapsed_ms: u64) {
    match result {
        Ok(out) => tracing::debug!(elapsed_ms, output_len = out.len(), "completed"),
        Err(e @ ExecError::Failed { .. }) => {
            tracing::warn!(elapsed_ms, error = %e, "command failed")
        }
        Err(e) => tracing::error!(elapsed_ms, error = %e, "remote command error"),
    }
}

#[async_trait]
impl<E: RemoteExecutor> RemoteExecutor for TracedExecutor<E> {
    async fn execute(
        &self,
        command: &RemoteCommand,
        timeout: Duration,
    ) -> Result<String, ExecError> {
        async {
            tracing::debug!("executing");
            let start = Instant::now();
            let result = self.inner.execute(command, timeout).await;
            log_result(&result, start.elapsed().as_millis() as u64);
            result
        }
        .instrument(tracing::info_span!("remote.exec", cmd = command_summary(command)))
        .await
    }

    async fn execute_with_stdin(
        &self,
        command: &RemoteCommand,
        stdin: &[u8],
        timeout: Duration,
    ) -> Result<String, ExecError> {
        async {
            tracing::debug!(stdin_len = stdin.len(), "executing");
            let start = Instant::now();
            let result = self.inner.execute_with_stdin(command, stdin, timeout).await;
            log_result(&result, start.elapsed().as_millis() as u64);
            result
        }
        .instrument(tracing::info_span!("remote.exec", cmd = command_summary(command)))
        .await
    }
}

/// Wrapper that adds tracing to any HealthProbe
#[derive(Clone)]
pub struct TracedProbe<P> {
    inner: P,
}

impl<P> TracedProbe<P> {
    pub fn new(inner: P) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<P: HealthProbe> HealthProbe for TracedProbe<P> {
    async fn check(&self) -> ProbeOutcome {
        let outcome = self.inner.check().await;
        let latency = format_latency_ms(outcome.response_time_ms);
        if outcome.status.is_ok() {
            tracing::trace!(latency = %latency, "health ok");
        } else {
            tracing::info!(
                status = %outcome.status,
                latency = %latency,
                detail = ?outcome.detail,
                "health check failed"
            );
        }
        outcome
    }
}

#[cfg(test)]
#[path = "traced_tests.rs"]
mod tests;
