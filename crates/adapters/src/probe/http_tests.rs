// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use wd_core::HealthStatus;

#[yare::parameterized(
    healthy        = { 200, r#"{"status":"ok"}"#, HealthStatus::Ok },
    extra_fields   = { 200, r#"{"status":"ok","cycle":4}"#, HealthStatus::Ok },
    wrong_status   = { 200, r#"{"status":"degraded"}"#, HealthStatus::Fail },
    not_json       = { 200, "ok", HealthStatus::Fail },
    server_error   = { 503, r#"{"status":"ok"}"#, HealthStatus::Fail },
    not_found      = { 404, "", HealthStatus::Fail },
)]
fn classify(status: u16, body: &str, expected: HealthStatus) {
    assert_eq!(classify_response(status, body, 5).status, expected);
}

#[test]
fn url_is_built_from_parts() {
    assert_eq!(
        ProbeConfig::new("10.0.0.2", 9001, "/health").url,
        "http://10.0.0.2:9001/health"
    );
    assert_eq!(
        ProbeConfig::new("localhost", 80, "healthz").url,
        "http://localhost:80/healthz"
    );
}

/// Serve one canned HTTP response after `delay`.
async fn serve_once(status_line: &'static str, body: &'static str, delay: Duration) -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        let (mut sock, _) = listener.accept().await.unwrap();
        let mut buf = [0u8; 1024];
        let _ = sock.read(&mut buf).await;
        tokio::time::sleep(delay).await;
        let resp = format!(
            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status_line,
            body.len(),
            body
        );
        let _ = sock.write_all(resp.as_bytes()).await;
    });
    port
}

fn probe(port: u16, request_ms: u64, ceiling_ms: u64) -> HttpHealthProbe {
    HttpHealthProbe::new(
        ProbeConfig::new("127.0.0.1", port, "/health").with_timeouts(
            Duration::from_millis(request_ms),
            Duration::from_millis(ceiling_ms),
        ),
    )
    .unwrap()
}

#[tokio::test]
async fn healthy_agent_is_ok() {
    let port = serve_once("200 OK", r#"{"status":"ok"}"#, Duration::ZERO).await;
    let outcome = probe(port, 2_000, 4_000).check().await;
    assert_eq!(outcome.status, HealthStatus::Ok, "{:?}", outcome);
}

#[tokio::test]
async fn slow_response_is_fail() {
    let port = serve_once("200 OK", r#"{"status":"ok"}"#, Duration::from_millis(300)).await;
    let outcome = probe(port, 100, 2_000).check().await;
    assert_eq!(outcome.status, HealthStatus::Fail, "{:?}", outcome);
}

#[tokio::test]
async fn hung_agent_is_timeout() {
    let port = serve_once("200 OK", r#"{"status":"ok"}"#, Duration::from_secs(5)).await;
    let outcome = probe(port, 100, 300).check().await;
    assert_eq!(outcome.status, HealthStatus::Timeout, "{:?}", outcome);
}

#[tokio::test]
async fn refused_connection_is_fail() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    let outcome = probe(port, 500, 1_000).check().await;
    assert_eq!(outcome.status, HealthStatus::Fail, "{:?}", outcome);
}
