// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Warden supervisor daemon library
//!
//! Configuration loading and the daemon lifecycle, shared by the `wardend`
//! binary and its tests.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod config;
pub mod env;
pub mod lifecycle;

pub use config::{ConfigError, ExecutorSettings, FileConfig, Settings, Transport};
pub use lifecycle::{startup, startup_with, Daemon, LifecycleError, Paths};
