//! Integration tests for SSE events endpoint.

mod common;

use common::{upload, wait_for_job, TestHarness};
use ow_core::events::EventPayload;

#[tokio::test]
async fn sse_stream_connects() {
    let (_h, addr) = TestHarness::with_server().await;
    let client = reqwest::Client::new();

    let resp = client
        .get(format!("http://{addr}/api/events"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    // Verify content type is event-stream.
    let ct = resp
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap();
    assert!(ct.contains("text/event-stream"), "expected SSE content-type, got: {ct}");
}

#[tokio::test]
async fn job_lifecycle_is_broadcast() {
    let (h, addr) = TestHarness::with_server().await;

    upload(addr, "song.mp3", "audio/mpeg", b"audio").await;
    wait_for_job(addr).await;

    let events = h.ctx.event_bus.recent_events(50);
    // Most recent first.
    assert!(matches!(
        events.first().map(|e| &e.payload),
        Some(EventPayload::JobSucceeded { size: 7, .. })
    ));
    assert!(matches!(
        events.last().map(|e| &e.payload),
        Some(EventPayload::JobStarted { .. })
    ));
    assert!(events
        .iter()
        .any(|e| matches!(e.payload, EventPayload::JobProgress { .. })));
}
