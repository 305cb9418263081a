// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Remote command execution adapters

mod local;
mod ssh;

pub use local::LocalExecutor;
pub use ssh::{SshConfig, SshExecutor};

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{ExecCall, FakeExecutor};

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use wd_core::RemoteCommand;

use crate::subprocess::SubprocessError;

/// Errors from remote command execution.
///
/// All variants are transient-remote failures: the caller decides whether to
/// retry, escalate or only log.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExecError {
    #[error("remote command timed out after {}s", .0.as_secs())]
    Timeout(Duration),
    #[error("remote host unreachable: {0}")]
    Unreachable(String),
    #[error("remote command exited with {}: {output}", exit_label(.code))]
    Failed { code: Option<i32>, output: String },
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(c) => format!("status {}", c),
        None => "no exit status".to_string(),
    }
}

/// Executes a composed shell command on the agent's host.
#[async_trait]
pub trait RemoteExecutor: Clone + Send + Sync + 'static {
    /// Run `command` and return its stdout.
    ///
    /// A command exceeding `timeout` is killed and reported as
    /// [`ExecError::Timeout`]; it is never retried here.
    async fn execute(&self, command: &RemoteCommand, timeout: Duration)
        -> Result<String, ExecError>;

    /// Run `command` with `stdin` written to its standard input.
    ///
    /// Payloads travel outside the command line, so their size is not bound
    /// by the host's argument limits.
    async fn execute_with_stdin(
        &self,
        command: &RemoteCommand,
        stdin: &[u8],
        timeout: Duration,
    ) -> Result<String, ExecError>;
}

/// Map a subprocess that produced no exit status to the executor contract.
///
/// A local failure to spawn or feed the transport is a failed command, not
/// an unreachable host.
pub(crate) fn finish(
    result: Result<std::process::Output, SubprocessError>,
) -> Result<std::process::Output, ExecError> {
    match result {
        Ok(output) => Ok(output),
        Err(SubprocessError::TimedOut { timeout, .. }) => Err(ExecError::Timeout(timeout)),
        Err(e @ SubprocessError::Io { .. }) => Err(ExecError::Failed {
            code: None,
            output: e.to_string(),
        }),
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
