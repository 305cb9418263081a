// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use wd_adapters::FakeProbe;
use wd_core::HealthStatus;

const MINUTE: u64 = 60_000;

fn monitor() -> HealthMonitor<FakeProbe> {
    HealthMonitor::new(FakeProbe::new(), Duration::from_secs(600))
}

#[test]
fn failures_are_always_recorded() {
    let m = monitor();
    for i in 0..3 {
        let record = m.record_for(&ProbeOutcome::fail(12, "refused"), 0, i * 1000).unwrap();
        assert_eq!(record.status, HealthStatus::Fail);
    }
    let record = m.record_for(&ProbeOutcome::timeout(8000), 0, 5000).unwrap();
    assert_eq!(record.status, HealthStatus::Timeout);
}

#[test]
fn routine_successes_are_summarized() {
    let m = monitor();
    let ok = ProbeOutcome::ok(3);

    assert!(m.record_for(&ok, 0, 0).is_some());
    assert!(m.record_for(&ok, 0, MINUTE).is_none());
    assert!(m.record_for(&ok, 0, 9 * MINUTE).is_none());
    let summary = m.record_for(&ok, 0, 10 * MINUTE).unwrap();
    assert_eq!(summary.detail, Some(serde_json::json!({"summary": true})));
    assert!(m.record_for(&ok, 0, 11 * MINUTE).is_none());
}

#[test]
fn recovery_is_recorded_with_streak() {
    let m = monitor();
    let ok = ProbeOutcome::ok(3);
    assert!(m.record_for(&ok, 0, 0).is_some());

    let record = m.record_for(&ok, 4, MINUTE).unwrap();
    assert_eq!(record.detail, Some(serde_json::json!({"recovered_after": 4})));
    assert_eq!(record.checked_at_ms, MINUTE);
}

#[tokio::test]
async fn check_delegates_to_probe() {
    let probe = FakeProbe::new();
    probe.push(ProbeOutcome::fail(5, "HTTP 503"));
    let m = HealthMonitor::new(probe.clone(), Duration::from_secs(600));

    assert_eq!(m.check().await.status, HealthStatus::Fail);
    assert!(m.check().await.status.is_ok());
    assert_eq!(probe.checks(), 2);
}
