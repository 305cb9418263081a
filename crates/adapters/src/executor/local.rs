// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Executor that runs commands through the local `sh`.
//!
//! Used when the agent runs on the supervisor's own host.

use super::{finish, ExecError, RemoteExecutor};
use crate::subprocess::{combined_output, run_with_input, run_with_timeout, stdout_text};
use async_trait::async_trait;
use std::time::Duration;
use tokio::process::Command;
use wd_core::RemoteCommand;

#[derive(Clone, Default)]
pub struct LocalExecutor;

impl LocalExecutor {
    pub fn new() -> Self {
        Self
    }

    fn command(command: &RemoteCommand) -> Command {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(command.as_str());
        cmd
    }
}

fn outcome(output: std::process::Output) -> Result<String, ExecError> {
    if !output.status.success() {
        return Err(ExecError::Failed {
            code: output.status.code(),
            output: combined_output(&output),
        });
    }
    Ok(stdout_text(&output))
}

#[async_trait]
impl RemoteExecutor for LocalExecutor {
    async fn execute(
        &self,
        command: &RemoteCommand,
        timeout: Duration,
    ) -> Result<String, ExecError> {
        let cmd = Self::command(command);
        outcome(finish(run_with_timeout(cmd, timeout, "sh -c").await)?)
    }

    async fn execute_with_stdin(
        &self,
        command: &RemoteCommand,
        stdin: &[u8],
        timeout: Duration,
    ) -> Result<String, ExecError> {
        let cmd = Self::command(command);
        outcome(finish(run_with_input(cmd, stdin, timeout, "sh -c").await)?)
    }
}

#[cfg(test)]
#[path = "local_tests.rs"]
mod tests;
