// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Validated git references and commit messages, and read projections of the
//! agent's repository.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;
use thiserror::Error;

/// Prefix of supervisor-created stable tags (`stable-vN`).
pub const STABLE_TAG_PREFIX: &str = "stable-v";

/// Maximum commit message length in characters.
pub const MAX_COMMIT_MESSAGE_LEN: usize = 200;

// Allow expect here as the regex is compile-time verified to be valid
#[allow(clippy::expect_used)]
static REF_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._/-]{0,127}$").expect("constant regex pattern is valid")
});

#[allow(clippy::expect_used)]
static STABLE_TAG_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^stable-v([0-9]{1,9})$").expect("constant regex pattern is valid")
});

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RefError {
    #[error("invalid git reference: {0:?}")]
    InvalidRef(String),
    #[error("commit message must not be empty")]
    EmptyMessage,
    #[error("commit message exceeds {MAX_COMMIT_MESSAGE_LEN} characters")]
    MessageTooLong,
    #[error("commit message contains a forbidden character: {0:?}")]
    ForbiddenCharacter(char),
}

/// A tag name or commit hash safe to pass to git on a remote shell.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct GitRef(String);

impl GitRef {
    pub fn parse(raw: &str) -> Result<Self, RefError> {
        let invalid = || RefError::InvalidRef(raw.to_string());
        if !REF_PATTERN.is_match(raw) {
            return Err(invalid());
        }
        if raw.contains("..") || raw.contains("@{") || raw.contains("//") {
            return Err(invalid());
        }
        if raw.ends_with(".lock") || raw.ends_with('/') || raw.ends_with('.') {
            return Err(invalid());
        }
        Ok(Self(raw.to_string()))
    }

    /// The `stable-vN` tag for `n`.
    pub fn stable(n: u32) -> Self {
        Self(format!("{}{}", STABLE_TAG_PREFIX, n))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GitRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for GitRef {
    type Error = RefError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<GitRef> for String {
    fn from(r: GitRef) -> Self {
        r.0
    }
}

/// A commit message validated for remote composition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitMessage(String);

impl CommitMessage {
    pub fn parse(raw: &str) -> Result<Self, RefError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(RefError::EmptyMessage);
        }
        if trimmed.chars().count() > MAX_COMMIT_MESSAGE_LEN {
            return Err(RefError::MessageTooLong);
        }
        if let Some(c) = trimmed
            .chars()
            .find(|c| c.is_control() || *c == '`' || *c == '$')
        {
            return Err(RefError::ForbiddenCharacter(c));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CommitMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Whether `tag` is a supervisor stable tag.
pub fn is_stable_tag(tag: &str) -> bool {
    STABLE_TAG_PATTERN.is_match(tag)
}

/// `N` of a `stable-vN` tag.
pub fn stable_tag_number(tag: &str) -> Option<u32> {
    STABLE_TAG_PATTERN
        .captures(tag)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// One entry of the repository log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitEntry {
    pub hash: String,
    pub message: String,
    /// ISO-8601 author date
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
}

impl CommitEntry {
    /// Parse one `%h|||%s|||%aI` log line.
    pub fn parse_log_line(line: &str) -> Option<Self> {
        let mut parts = line.splitn(3, "|||");
        let hash = parts.next()?.trim();
        let message = parts.next()?;
        let timestamp = parts.next()?.trim();
        if hash.is_empty() {
            return None;
        }
        Some(Self {
            hash: hash.to_string(),
            message: message.to_string(),
            timestamp: timestamp.to_string(),
            tag: None,
        })
    }
}

/// Result of a commit that changed the tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitInfo {
    pub hash: String,
    pub timestamp: String,
}

#[cfg(test)]
#[path = "git_tests.rs"]
mod tests;
