// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake executor for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{ExecError, RemoteExecutor};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use wd_core::RemoteCommand;

/// Recorded executor call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecCall {
    pub command: String,
    /// Bytes written to the command's stdin, if any
    pub stdin: Option<Vec<u8>>,
    pub timeout: Duration,
}

struct Rule {
    pattern: String,
    reply: Result<String, ExecError>,
    once: bool,
}

#[derive(Default)]
struct FakeExecutorState {
    rules: Vec<Rule>,
    delays: Vec<(String, Duration)>,
    calls: Vec<ExecCall>,
    in_flight: usize,
    max_in_flight: usize,
}

/// Scripted executor.
///
/// Replies are matched by substring against the command; the most recently
/// added matching rule wins. Unmatched commands succeed with empty output.
#[derive(Clone, Default)]
pub struct FakeExecutor {
    inner: Arc<Mutex<FakeExecutorState>>,
}

impl FakeExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    fn add(&self, pattern: &str, reply: Result<String, ExecError>, once: bool) {
        self.inner.lock().rules.push(Rule {
            pattern: pattern.to_string(),
            reply,
            once,
        });
    }

    /// Reply `output` to every command containing `pattern`.
    pub fn on(&self, pattern: &str, output: &str) {
        self.add(pattern, Ok(output.to_string()), false);
    }

    /// Reply `output` to the next command containing `pattern`.
    pub fn on_once(&self, pattern: &str, output: &str) {
        self.add(pattern, Ok(output.to_string()), true);
    }

    /// Fail every command containing `pattern`.
    pub fn fail_on(&self, pattern: &str, error: ExecError) {
        self.add(pattern, Err(error), false);
    }

    /// Fail the next command containing `pattern`.
    pub fn fail_once(&self, pattern: &str, error: ExecError) {
        self.add(pattern, Err(error), true);
    }

    /// Hold commands containing `pattern` for `delay` before replying.
    pub fn delay_on(&self, pattern: &str, delay: Duration) {
        self.inner.lock().delays.push((pattern.to_string(), delay));
    }

    /// Drop every scripted reply and delay.
    pub fn reset_rules(&self) {
        let mut state = self.inner.lock();
        state.rules.clear();
        state.delays.clear();
    }

    pub fn calls(&self) -> Vec<ExecCall> {
        self.inner.lock().calls.clone()
    }

    pub fn commands(&self) -> Vec<String> {
        self.inner.lock().calls.iter().map(|c| c.command.clone()).collect()
    }

    /// Number of recorded commands containing `pattern`.
    pub fn count_matching(&self, pattern: &str) -> usize {
        self.inner
            .lock()
            .calls
            .iter()
            .filter(|c| c.command.contains(pattern))
            .count()
    }

    /// Highest number of commands observed executing at once.
    pub fn max_concurrency(&self) -> usize {
        self.inner.lock().max_in_flight
    }
}

impl FakeExecutor {
    async fn respond(
        &self,
        command: &RemoteCommand,
        stdin: Option<&[u8]>,
        timeout: Duration,
    ) -> Result<String, ExecError> {
        let delay = {
            let mut state = self.inner.lock();
            state.calls.push(ExecCall {
                command: command.to_string(),
                stdin: stdin.map(<[u8]>::to_vec),
                timeout,
            });
            state.in_flight += 1;
            state.max_in_flight = state.max_in_flight.max(state.in_flight);
            state
                .delays
                .iter()
                .rev()
                .find(|(p, _)| command.as_str().contains(p.as_str()))
                .map(|(_, d)| *d)
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.inner.lock();
        state.in_flight -= 1;
        let matched = state
            .rules
            .iter()
            .rposition(|r| command.as_str().contains(r.pattern.as_str()));
        match matched {
            Some(idx) if state.rules[idx].once => state.rules.remove(idx).reply,
            Some(idx) => state.rules[idx].reply.clone(),
            None => Ok(String::new()),
        }
    }
}

#[async_trait]
impl RemoteExecutor for FakeExecutor {
    async fn execute(
        &self,
        command: &RemoteCommand,
        timeout: Duration,
    ) -> Result<String, ExecError> {
        self.respond(command, None, timeout).await
    }

    async fn execute_with_stdin(
        &self,
        command: &RemoteCommand,
        stdin: &[u8],
        timeout: Duration,
    ) -> Result<String, ExecError> {
        self.respond(command, Some(stdin), timeout).await
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
