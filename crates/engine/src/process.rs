// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Remote process control for the agent
//!
//! Start resumes the agent's own entry point when it exists and deploys the
//! bootstrap otherwise. Stops are best-effort: a process that is already gone
//! is not an error.

use crate::error::ProcessError;
use crate::seed::Seed;
use std::time::Duration;
use wd_adapters::RemoteExecutor;
use wd_core::{CommandBuilder, CommandError, Program, RemoteCommand, SafePath, Step};

/// File an established agent keeps in its code directory.
pub const DEFAULT_LIFECYCLE_MARKER: &str = "LIFECYCLE";

/// Paths, interpreter and retry limits for the process controller
#[derive(Debug, Clone)]
pub struct ProcessConfig {
    pub code_dir: SafePath,
    /// `<code_dir>/<entry_point>`
    pub entry: SafePath,
    /// `<code_dir>/<marker>`; code without it at boot is a previous life
    pub lifecycle_marker: SafePath,
    pub interpreter: String,
    pub log_file: SafePath,
    pub max_restart_attempts: u32,
    pub restart_pause: Duration,
    pub ready_attempts: u32,
    pub ready_delay: Duration,
    pub command_timeout: Duration,
}

impl ProcessConfig {
    /// Defaults for everything but the paths and the interpreter.
    pub fn new(
        code_dir: SafePath,
        entry_point: &str,
        interpreter: impl Into<String>,
        log_file: SafePath,
    ) -> Result<Self, CommandError> {
        let entry = code_dir.join(entry_point)?;
        let lifecycle_marker = code_dir.join(DEFAULT_LIFECYCLE_MARKER)?;
        Ok(Self {
            code_dir,
            entry,
            lifecycle_marker,
            interpreter: interpreter.into(),
            log_file,
            max_restart_attempts: 3,
            restart_pause: Duration::from_secs(1),
            ready_attempts: 15,
            ready_delay: Duration::from_secs(2),
            command_timeout: Duration::from_secs(10),
        })
    }

    /// Use `name` inside the code directory as the lifecycle marker.
    pub fn with_lifecycle_marker(mut self, name: &str) -> Result<Self, CommandError> {
        self.lifecycle_marker = self.code_dir.join(name)?;
        Ok(self)
    }
}

/// Result of a successful start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StartOutcome {
    pub pid: u32,
    /// Whether the bootstrap was deployed first
    pub deployed: bool,
}

/// Starts, stops and locates the agent process.
#[derive(Clone)]
pub struct ProcessController<E> {
    executor: E,
    config: ProcessConfig,
    seed: Seed,
}

impl<E: RemoteExecutor> ProcessController<E> {
    pub fn new(executor: E, config: ProcessConfig, seed: Seed) -> Self {
        Self {
            executor,
            config,
            seed,
        }
    }

    pub fn config(&self) -> &ProcessConfig {
        &self.config
    }

    async fn run(&self, op: &'static str, command: RemoteCommand) -> Result<String, ProcessError> {
        self.executor
            .execute(&command, self.config.command_timeout)
            .await
            .map_err(|source| ProcessError::Remote { op, source })
    }

    pub async fn entry_exists(&self) -> Result<bool, ProcessError> {
        self.file_exists("entry_exists", &self.config.entry).await
    }

    pub async fn lifecycle_marker_exists(&self) -> Result<bool, ProcessError> {
        self.file_exists("lifecycle_marker_exists", &self.config.lifecycle_marker)
            .await
    }

    async fn file_exists(&self, op: &'static str, path: &SafePath) -> Result<bool, ProcessError> {
        let cmd = CommandBuilder::new(Step::new(Program::Test).flag("-f").path(path))
            .and(Step::new(Program::Echo).flag("yes"))
            .or(Step::new(Program::Echo).flag("no"))
            .build();
        Ok(self.run(op, cmd).await?.trim() == "yes")
    }

    /// Resume the existing entry point, or deploy the bootstrap and start it.
    pub async fn start(&self) -> Result<StartOutcome, ProcessError> {
        if self.entry_exists().await? {
            let pid = self.launch().await?;
            tracing::info!(pid, "resumed agent entry point");
            return Ok(StartOutcome {
                pid,
                deployed: false,
            });
        }
        self.deploy_and_start().await
    }

    /// Deploy the bootstrap unconditionally and start it.
    pub async fn deploy_and_start(&self) -> Result<StartOutcome, ProcessError> {
        self.deploy_seed().await?;
        let pid = self.launch().await?;
        tracing::info!(pid, entry = %self.config.entry, "started bootstrap");
        Ok(StartOutcome {
            pid,
            deployed: true,
        })
    }

    /// Write the bootstrap to the entry point. The base64 payload travels on
    /// stdin so its size is not bound by the remote argument limit.
    pub async fn deploy_seed(&self) -> Result<(), ProcessError> {
        let cmd = CommandBuilder::new(Step::new(Program::Mkdir).flag("-p").path(&self.config.code_dir))
            .and(Step::new(Program::Base64).flag("-d").stdout_to(&self.config.entry))
            .build();
        let payload = self.seed.encoded();
        self.executor
            .execute_with_stdin(&cmd, payload.as_bytes(), self.config.command_timeout)
            .await
            .map_err(|source| ProcessError::Remote {
                op: "deploy_seed",
                source,
            })?;
        Ok(())
    }

    /// `cd dir && nohup interpreter entry > log 2>&1 & echo $!`
    async fn launch(&self) -> Result<u32, ProcessError> {
        let cmd = CommandBuilder::in_dir(&self.config.code_dir)
            .and(
                Step::new(Program::Nohup)
                    .arg(&self.config.interpreter)
                    .path(&self.config.entry)
                    .stdout_to(&self.config.log_file)
                    .stderr_to_stdout(),
            )
            .background(Step::new(Program::Echo).flag("$!"))
            .build();
        let output = self.run("launch", cmd).await?;
        parse_pid(&output).ok_or(ProcessError::BadPid(output))
    }

    /// Kill `pid` and anything still running the entry point.
    pub async fn stop(&self, pid: Option<u32>) -> Result<(), ProcessError> {
        self.kill(pid).await?;
        self.pkill(&self.config.entry).await
    }

    /// Kill `pid` and anything running from the code directory.
    pub async fn stop_all(&self, pid: Option<u32>) -> Result<(), ProcessError> {
        self.kill(pid).await?;
        self.pkill(&self.config.code_dir).await
    }

    async fn kill(&self, pid: Option<u32>) -> Result<(), ProcessError> {
        let Some(pid) = pid else {
            return Ok(());
        };
        let cmd = CommandBuilder::new(Step::new(Program::Kill).number(u64::from(pid)).quiet())
            .best_effort()
            .build();
        self.run("kill", cmd).await?;
        Ok(())
    }

    async fn pkill(&self, path: &SafePath) -> Result<(), ProcessError> {
        let cmd = CommandBuilder::new(
            Step::new(Program::Pkill)
                .flag("-f")
                .arg(&process_pattern(path))
                .quiet(),
        )
        .best_effort()
        .build();
        self.run("pkill", cmd).await?;
        Ok(())
    }

    /// Stop, pause, then start with up to `max_restart_attempts` attempts.
    pub async fn restart(&self, pid: Option<u32>) -> Result<StartOutcome, ProcessError> {
        if let Err(e) = self.stop(pid).await {
            tracing::warn!(error = %e, "stop before restart failed");
        }
        tokio::time::sleep(self.config.restart_pause).await;

        let attempts = self.config.max_restart_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.start().await {
                Ok(outcome) => return Ok(outcome),
                Err(e) if attempt >= attempts => {
                    return Err(ProcessError::RestartExhausted {
                        attempts,
                        last: Box::new(e),
                    });
                }
                Err(e) => {
                    tracing::warn!(attempt, attempts, error = %e, "start attempt failed");
                    attempt += 1;
                    tokio::time::sleep(self.config.restart_pause).await;
                }
            }
        }
    }

    /// Poll the executor until it answers. `false` if it never does.
    pub async fn wait_ready(&self) -> bool {
        let probe = CommandBuilder::new(Step::new(Program::Echo).flag("ok")).build();
        for attempt in 1..=self.config.ready_attempts {
            match self.run("ready", probe.clone()).await {
                Ok(out) if out.trim() == "ok" => return true,
                Ok(out) => tracing::debug!(attempt, output = %out.trim(), "executor not ready"),
                Err(e) => tracing::debug!(attempt, error = %e, "executor not ready"),
            }
            if attempt < self.config.ready_attempts {
                tokio::time::sleep(self.config.ready_delay).await;
            }
        }
        false
    }

    /// PID of a process running from the code directory, if any.
    pub async fn discover_pid(&self) -> Result<Option<u32>, ProcessError> {
        let cmd = CommandBuilder::new(
            Step::new(Program::Pgrep)
                .flag("-f")
                .arg(&process_pattern(&self.config.code_dir)),
        )
        .pipe(Step::new(Program::Head).flag("-1"))
        .build();
        Ok(parse_pid(&self.run("discover_pid", cmd).await?))
    }
}

/// Last non-empty line of `output` as a PID.
fn parse_pid(output: &str) -> Option<u32> {
    output
        .lines()
        .map(str::trim)
        .rfind(|l| !l.is_empty())
        .and_then(|l| l.parse().ok())
        .filter(|pid| *pid > 0)
}

/// Extended regex matching `path` in a command line, but not its own text.
///
/// The first character goes in a bracket expression so the `pgrep`/`pkill`
/// invocation (whose command line contains the pattern) never matches itself.
pub fn process_pattern(path: &SafePath) -> String {
    let literal = path.as_str().replace('.', "[.]");
    let mut chars = literal.chars();
    match chars.next() {
        Some('/') => format!("[/]{}", chars.as_str()),
        _ => literal,
    }
}

#[cfg(test)]
#[path = "process_tests.rs"]
mod tests;
