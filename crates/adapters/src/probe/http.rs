// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP health probe: `GET http://host:port<path>` expecting `200 {"status":"ok"}`.

use super::HealthProbe;
use async_trait::async_trait;
use std::time::{Duration, Instant};
use wd_core::ProbeOutcome;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeConfig {
    pub url: String,
    /// Responses slower than this are failures
    pub request_timeout: Duration,
    /// Requests still outstanding at this point are timeouts
    pub timeout_ceiling: Duration,
}

impl ProbeConfig {
    pub fn new(host: &str, port: u16, path: &str) -> Self {
        let path = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{}", path)
        };
        Self {
            url: format!("http://{}:{}{}", host, port, path),
            request_timeout: Duration::from_secs(5),
            timeout_ceiling: Duration::from_secs(8),
        }
    }

    pub fn with_timeouts(mut self, request_timeout: Duration, timeout_ceiling: Duration) -> Self {
        self.request_timeout = request_timeout;
        self.timeout_ceiling = timeout_ceiling;
        self
    }
}

#[derive(Clone)]
pub struct HttpHealthProbe {
    client: reqwest::Client,
    config: ProbeConfig,
}

impl HttpHealthProbe {
    pub fn new(config: ProbeConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.timeout_ceiling)
            .build()?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &ProbeConfig {
        &self.config
    }

    async fn fetch(&self) -> Result<(u16, String), reqwest::Error> {
        let resp = self.client.get(&self.config.url).send().await?;
        let status = resp.status().as_u16();
        let body = resp.text().await?;
        Ok((status, body))
    }
}

#[async_trait]
impl HealthProbe for HttpHealthProbe {
    async fn check(&self) -> ProbeOutcome {
        let start = Instant::now();
        let result = tokio::time::timeout(self.config.timeout_ceiling, self.fetch()).await;
        let elapsed = start.elapsed();
        let elapsed_ms = elapsed.as_millis() as u64;
        match result {
            Err(_) => ProbeOutcome::timeout(elapsed_ms),
            Ok(Err(e)) => ProbeOutcome::fail(elapsed_ms, format!("request error: {}", e)),
            Ok(Ok((status, body))) => {
                if elapsed > self.config.request_timeout {
                    return ProbeOutcome::fail(
                        elapsed_ms,
                        format!(
                            "slow response: {}ms > {}ms",
                            elapsed_ms,
                            self.config.request_timeout.as_millis()
                        ),
                    );
                }
                classify_response(status, &body, elapsed_ms)
            }
        }
    }
}

/// Classify a completed response. Only `200` with a JSON body whose `status`
/// is `"ok"` passes.
pub fn classify_response(status: u16, body: &str, elapsed_ms: u64) -> ProbeOutcome {
    if status != 200 {
        let snippet: String = body.chars().take(200).collect();
        return ProbeOutcome::fail(elapsed_ms, format!("status {}: {}", status, snippet));
    }
    match serde_json::from_str::<serde_json::Value>(body) {
        Ok(v) if v.get("status").and_then(|s| s.as_str()) == Some("ok") => {
            ProbeOutcome::ok(elapsed_ms)
        }
        _ => ProbeOutcome::fail(elapsed_ms, "invalid health response"),
    }
}

#[cfg(test)]
#[path = "http_tests.rs"]
mod tests;
