// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Health-check outcomes and the durable record written for them.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Rolling window kept in the health history.
pub const HEALTH_RETENTION: Duration = Duration::from_secs(24 * 60 * 60);

/// Classification of a single health poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Ok,
    /// Non-200, connection error, malformed body, or slower than the request timeout
    Fail,
    /// No response within the timeout ceiling
    Timeout,
}

impl HealthStatus {
    pub fn is_ok(&self) -> bool {
        matches!(self, HealthStatus::Ok)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Ok => "ok",
            HealthStatus::Fail => "fail",
            HealthStatus::Timeout => "timeout",
        }
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a probe observed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeOutcome {
    pub status: HealthStatus,
    pub response_time_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<serde_json::Value>,
}

impl ProbeOutcome {
    pub fn ok(response_time_ms: u64) -> Self {
        Self {
            status: HealthStatus::Ok,
            response_time_ms,
            detail: None,
        }
    }

    pub fn fail(response_time_ms: u64, reason: impl Into<String>) -> Self {
        Self {
            status: HealthStatus::Fail,
            response_time_ms,
            detail: Some(serde_json::json!({ "error": reason.into() })),
        }
    }

    pub fn timeout(response_time_ms: u64) -> Self {
        Self {
            status: HealthStatus::Timeout,
            response_time_ms,
            detail: Some(serde_json::json!({ "error": "timeout" })),
        }
    }
}

/// Append-only health observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthCheckRecord {
    pub status: HealthStatus,
    pub response_time_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<serde_json::Value>,
    pub checked_at_ms: u64,
}

impl HealthCheckRecord {
    pub fn from_outcome(outcome: ProbeOutcome, checked_at_ms: u64) -> Self {
        Self {
            status: outcome.status,
            response_time_ms: outcome.response_time_ms,
            detail: outcome.detail,
            checked_at_ms,
        }
    }

    /// Attach (or merge into) the structured detail.
    pub fn with_detail(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        let mut map = match self.detail.take() {
            Some(serde_json::Value::Object(map)) => map,
            _ => serde_json::Map::new(),
        };
        map.insert(key.to_string(), value.into());
        self.detail = Some(serde_json::Value::Object(map));
        self
    }

    /// Whether the record falls outside the retention window ending at `now_ms`.
    pub fn is_expired(&self, now_ms: u64, retention: Duration) -> bool {
        let cutoff = now_ms.saturating_sub(retention.as_millis() as u64);
        self.checked_at_ms < cutoff
    }
}

#[cfg(test)]
#[path = "health_tests.rs"]
mod tests;
