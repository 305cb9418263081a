// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Storage layer for the Warden supervisor: health history and growth log

mod growth_log;
mod health_log;
mod jsonl;

pub use growth_log::GrowthLog;
pub use health_log::HealthLog;
pub use jsonl::LogError;
