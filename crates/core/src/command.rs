// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Allowlisted remote shell command builder.
//!
//! A [`RemoteCommand`] can only be assembled from [`Step`]s whose program is
//! one of the fixed [`Program`] verbs. Fixed flags are `&'static str`; every
//! runtime value goes through [`Step::arg`] (single-quoted) or a validated
//! type ([`SafePath`], [`GitRef`], numbers).

use crate::git::{CommitMessage, GitRef};
use regex::Regex;
use std::fmt;
use std::sync::LazyLock;
use thiserror::Error;

// Allow expect here as the regex is compile-time verified to be valid
#[allow(clippy::expect_used)]
static SAFE_PATH_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^/[A-Za-z0-9._/-]+$").expect("constant regex pattern is valid")
});

#[allow(clippy::expect_used)]
static SAFE_SEGMENT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._-]*$").expect("constant regex pattern is valid")
});

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("unsafe path: {0:?}")]
    UnsafePath(String),
    #[error("unsafe path segment: {0:?}")]
    UnsafeSegment(String),
}

/// Fixed verbs a remote command may invoke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Program {
    Cd,
    Git,
    Kill,
    Pkill,
    Pgrep,
    Test,
    Find,
    Rm,
    Mkdir,
    Tar,
    Du,
    Cut,
    Head,
    Wc,
    Echo,
    Base64,
    Nohup,
    True,
}

impl Program {
    pub fn as_str(&self) -> &'static str {
        match self {
            Program::Cd => "cd",
            Program::Git => "git",
            Program::Kill => "kill",
            Program::Pkill => "pkill",
            Program::Pgrep => "pgrep",
            Program::Test => "test",
            Program::Find => "find",
            Program::Rm => "rm",
            Program::Mkdir => "mkdir",
            Program::Tar => "tar",
            Program::Du => "du",
            Program::Cut => "cut",
            Program::Head => "head",
            Program::Wc => "wc",
            Program::Echo => "echo",
            Program::Base64 => "base64",
            Program::Nohup => "nohup",
            Program::True => "true",
        }
    }
}

/// Quote `value` for a POSIX shell.
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

/// An absolute path made only of `[A-Za-z0-9._/-]` with no `..` component.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SafePath(String);

impl SafePath {
    pub fn parse(raw: &str) -> Result<Self, CommandError> {
        let trimmed = if raw.len() > 1 { raw.trim_end_matches('/') } else { raw };
        if !SAFE_PATH_PATTERN.is_match(trimmed) || trimmed.split('/').any(|c| c == "..") {
            return Err(CommandError::UnsafePath(raw.to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Append one path segment (a file or directory name).
    pub fn join(&self, segment: &str) -> Result<Self, CommandError> {
        if !SAFE_SEGMENT_PATTERN.is_match(segment) {
            return Err(CommandError::UnsafeSegment(segment.to_string()));
        }
        Ok(Self(format!("{}/{}", self.0, segment)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SafePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One program invocation with its arguments and redirections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    words: Vec<String>,
}

impl Step {
    pub fn new(program: Program) -> Self {
        Self {
            words: vec![program.as_str().to_string()],
        }
    }

    /// Trusted literal (flag, subcommand, fixed pattern).
    pub fn flag(mut self, literal: &'static str) -> Self {
        self.words.push(literal.to_string());
        self
    }

    /// Untrusted value, always quoted.
    pub fn arg(mut self, value: &str) -> Self {
        self.words.push(shell_quote(value));
        self
    }

    pub fn path(self, path: &SafePath) -> Self {
        self.arg(path.as_str())
    }

    pub fn git_ref(self, r: &GitRef) -> Self {
        self.arg(r.as_str())
    }

    pub fn message(self, message: &CommitMessage) -> Self {
        self.arg(message.as_str())
    }

    pub fn number(mut self, n: u64) -> Self {
        self.words.push(n.to_string());
        self
    }

    /// `> path`
    pub fn stdout_to(mut self, path: &SafePath) -> Self {
        self.words.push(format!("> {}", shell_quote(path.as_str())));
        self
    }

    /// `2>&1`
    pub fn stderr_to_stdout(mut self) -> Self {
        self.words.push("2>&1".to_string());
        self
    }

    /// `2>/dev/null`
    pub fn quiet(mut self) -> Self {
        self.words.push("2>/dev/null".to_string());
        self
    }

    fn render(&self) -> String {
        self.words.join(" ")
    }
}

/// Separator between two steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Join {
    And,
    Or,
    Then,
    Pipe,
    Background,
}

impl Join {
    fn as_str(&self) -> &'static str {
        match self {
            Join::And => " && ",
            Join::Or => " || ",
            Join::Then => "; ",
            Join::Pipe => " | ",
            Join::Background => " & ",
        }
    }
}

/// Composes steps into a [`RemoteCommand`].
#[derive(Debug, Clone)]
pub struct CommandBuilder {
    rendered: String,
}

impl CommandBuilder {
    pub fn new(first: Step) -> Self {
        Self {
            rendered: first.render(),
        }
    }

    /// Start with `cd <dir>`.
    pub fn in_dir(dir: &SafePath) -> Self {
        Self::new(Step::new(Program::Cd).path(dir))
    }

    fn push(mut self, join: Join, step: Step) -> Self {
        self.rendered.push_str(join.as_str());
        self.rendered.push_str(&step.render());
        self
    }

    pub fn and(self, step: Step) -> Self {
        self.push(Join::And, step)
    }

    pub fn or(self, step: Step) -> Self {
        self.push(Join::Or, step)
    }

    pub fn then(self, step: Step) -> Self {
        self.push(Join::Then, step)
    }

    pub fn pipe(self, step: Step) -> Self {
        self.push(Join::Pipe, step)
    }

    /// Run everything so far in the background, then `step`.
    pub fn background(self, step: Step) -> Self {
        self.push(Join::Background, step)
    }

    /// Append `; true` so the command's exit status is always success.
    pub fn best_effort(self) -> Self {
        self.then(Step::new(Program::True))
    }

    pub fn build(self) -> RemoteCommand {
        RemoteCommand(self.rendered)
    }
}

/// A composed shell command ready for the remote executor.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RemoteCommand(String);

impl RemoteCommand {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Build a command from an arbitrary string (tests only).
    #[cfg(any(test, feature = "test-support"))]
    pub fn raw(s: impl Into<String>) -> Self {
        Self(s.into())
    }
}

impl fmt::Display for RemoteCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
#[path = "command_tests.rs"]
mod tests;
