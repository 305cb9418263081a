// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Subprocess execution helpers

use std::process::{Output, Stdio};
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Bound on every remote command.
pub const REMOTE_COMMAND_TIMEOUT: Duration = Duration::from_secs(10);

/// TCP connect timeout handed to ssh (`-o ConnectTimeout`), in seconds.
pub const SSH_CONNECT_TIMEOUT_SECS: u64 = 5;

/// Why a subprocess produced no exit status.
#[derive(Debug, Error)]
pub enum SubprocessError {
    /// Spawning, feeding or waiting on the child failed locally
    #[error("{description} failed: {source}")]
    Io {
        description: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{description} timed out after {}s", .timeout.as_secs())]
    TimedOut {
        description: String,
        timeout: Duration,
    },
}

/// Run a subprocess command with a timeout.
///
/// Wraps `Command::output()` with `tokio::time::timeout`. The child is
/// spawned with `kill_on_drop`, so it is killed when the timeout elapses.
pub async fn run_with_timeout(
    mut cmd: Command,
    timeout: Duration,
    description: &str,
) -> Result<Output, SubprocessError> {
    cmd.kill_on_drop(true);
    match tokio::time::timeout(timeout, cmd.output()).await {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(source)) => Err(io_error(description, source)),
        Err(_elapsed) => Err(timed_out(description, timeout)),
    }
}

/// Like [`run_with_timeout`], writing `input` to the child's stdin.
///
/// Stdin is fed while stdout and stderr are drained, then closed so the child
/// sees end of input.
pub async fn run_with_input(
    mut cmd: Command,
    input: &[u8],
    timeout: Duration,
    description: &str,
) -> Result<Output, SubprocessError> {
    cmd.stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    let mut child = cmd.spawn().map_err(|e| io_error(description, e))?;
    let stdin = child.stdin.take();

    let feed = async move {
        if let Some(mut stdin) = stdin {
            stdin.write_all(input).await?;
            stdin.shutdown().await?;
        }
        Ok::<(), std::io::Error>(())
    };
    let run = async { tokio::join!(feed, child.wait_with_output()) };

    match tokio::time::timeout(timeout, run).await {
        Ok((_, Err(source))) => Err(io_error(description, source)),
        Ok((Err(source), Ok(output))) if output.status.success() => {
            Err(io_error(description, source))
        }
        // A child that exits early closes its stdin; its status tells the story.
        Ok((_, Ok(output))) => Ok(output),
        Err(_elapsed) => Err(timed_out(description, timeout)),
    }
}

fn io_error(description: &str, source: std::io::Error) -> SubprocessError {
    SubprocessError::Io {
        description: description.to_string(),
        source,
    }
}

fn timed_out(description: &str, timeout: Duration) -> SubprocessError {
    SubprocessError::TimedOut {
        description: description.to_string(),
        timeout,
    }
}

/// Combined stdout and stderr of a finished command, lossily decoded.
pub fn combined_output(output: &Output) -> String {
    let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
    if !output.stderr.is_empty() {
        text.push_str(&String::from_utf8_lossy(&output.stderr));
    }
    text
}

/// Stdout of a finished command, lossily decoded.
pub fn stdout_text(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[cfg(test)]
#[path = "subprocess_tests.rs"]
mod tests;
