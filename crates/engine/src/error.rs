// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for the supervision engine

use thiserror::Error;
use wd_adapters::ExecError;
use wd_core::{CommandError, RefError};

/// Errors from version-control operations on the agent's code directory
#[derive(Debug, Error)]
pub enum VcsError {
    #[error("invalid reference: {0}")]
    InvalidRef(#[from] RefError),
    #[error("no repository in {0}")]
    NoRepository(String),
    #[error("{op} failed for {target}: {source}")]
    Remote {
        op: &'static str,
        target: String,
        #[source]
        source: ExecError,
    },
    #[error("code directory too large to back up ({size_mb}MB > {max_mb}MB)")]
    TooLarge { size_mb: u64, max_mb: u64 },
    #[error("unexpected output from {op}: {output:?}")]
    Parse { op: &'static str, output: String },
    #[error(transparent)]
    Command(#[from] CommandError),
}

impl VcsError {
    /// Policy-invalid errors are rejected before any state-changing command runs.
    pub fn is_policy_invalid(&self) -> bool {
        matches!(self, VcsError::InvalidRef(_) | VcsError::NoRepository(_))
    }
}

/// Errors from starting, stopping and locating the agent process
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("{op} failed: {source}")]
    Remote {
        op: &'static str,
        #[source]
        source: ExecError,
    },
    #[error("launch returned no pid: {0:?}")]
    BadPid(String),
    #[error("start failed after {attempts} attempts: {last}")]
    RestartExhausted { attempts: u32, last: Box<ProcessError> },
}

/// Errors loading the bootstrap artifact
#[derive(Debug, Error)]
pub enum SeedError {
    #[error("failed to read bootstrap {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("bootstrap {0} is not valid UTF-8")]
    NotUtf8(String),
    #[error("bootstrap {path} renders to {bytes} bytes, limit is {max}")]
    TooLarge { path: String, bytes: usize, max: usize },
}

/// Errors surfaced to manual lifecycle triggers
#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("lifecycle busy: another operation is in flight")]
    Busy,
    #[error("invalid rollback target: {0}")]
    InvalidTarget(RefError),
    #[error("invalid commit message: {0}")]
    InvalidMessage(RefError),
    #[error(transparent)]
    Vcs(#[from] VcsError),
    #[error(transparent)]
    Process(#[from] ProcessError),
}
