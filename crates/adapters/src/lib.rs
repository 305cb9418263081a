// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
// Enable coverage(off) attribute for excluding test infrastructure
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Adapters for external I/O: the remote command channel and the health probe

pub mod executor;
pub mod probe;
pub mod subprocess;
pub mod traced;

pub use executor::{ExecError, LocalExecutor, RemoteExecutor, SshConfig, SshExecutor};
pub use probe::{HealthProbe, HttpHealthProbe, ProbeConfig};
pub use traced::{TracedExecutor, TracedProbe};

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
pub use executor::{ExecCall, FakeExecutor};
#[cfg(any(test, feature = "test-support"))]
pub use probe::FakeProbe;
