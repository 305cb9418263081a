// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Executor that runs commands on the agent host through the `ssh` client.

use super::{finish, ExecError, RemoteExecutor};
use crate::subprocess::{
    combined_output, run_with_input, run_with_timeout, stdout_text, SSH_CONNECT_TIMEOUT_SECS,
};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use wd_core::RemoteCommand;

/// `ssh` reserves this exit status for its own (connection) errors.
const SSH_ERROR_STATUS: i32 = 255;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshConfig {
    pub host: String,
    pub user: String,
    pub port: u16,
    pub key_path: Option<PathBuf>,
}

/// Runs commands as `ssh -o BatchMode=yes user@host -- <command>`.
#[derive(Clone)]
pub struct SshExecutor {
    config: Arc<SshConfig>,
}

impl SshExecutor {
    pub fn new(config: SshConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    /// Arguments passed to `ssh`, excluding the remote command.
    pub fn ssh_args(&self) -> Vec<String> {
        let c = &self.config;
        let mut args = vec![
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-o".to_string(),
            format!("ConnectTimeout={}", SSH_CONNECT_TIMEOUT_SECS),
            "-o".to_string(),
            "StrictHostKeyChecking=accept-new".to_string(),
            // Keeps host-key notices out of command output.
            "-o".to_string(),
            "LogLevel=ERROR".to_string(),
            "-p".to_string(),
            c.port.to_string(),
        ];
        if let Some(key) = &c.key_path {
            args.push("-i".to_string());
            args.push(key.display().to_string());
        }
        args.push(format!("{}@{}", c.user, c.host));
        args.push("--".to_string());
        args
    }

    fn command(&self, command: &RemoteCommand) -> Command {
        let mut cmd = Command::new("ssh");
        cmd.args(self.ssh_args()).arg(command.as_str());
        cmd
    }
}

fn outcome(output: std::process::Output) -> Result<String, ExecError> {
    match output.status.code() {
        Some(0) => Ok(stdout_text(&output)),
        Some(SSH_ERROR_STATUS) => Err(ExecError::Unreachable(
            combined_output(&output).trim().to_string(),
        )),
        code => Err(ExecError::Failed {
            code,
            output: combined_output(&output),
        }),
    }
}

#[async_trait]
impl RemoteExecutor for SshExecutor {
    async fn execute(
        &self,
        command: &RemoteCommand,
        timeout: Duration,
    ) -> Result<String, ExecError> {
        let cmd = self.command(command);
        outcome(finish(run_with_timeout(cmd, timeout, "ssh").await)?)
    }

    async fn execute_with_stdin(
        &self,
        command: &RemoteCommand,
        stdin: &[u8],
        timeout: Duration,
    ) -> Result<String, ExecError> {
        let cmd = self.command(command);
        outcome(finish(run_with_input(cmd, stdin, timeout, "ssh").await)?)
    }
}

#[cfg(test)]
#[path = "ssh_tests.rs"]
mod tests;
