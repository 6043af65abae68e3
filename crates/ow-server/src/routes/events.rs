//! Server-Sent Events stream of engine and job notifications.

use axum::extract::State;
use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use std::convert::Infallible;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;

use ow_core::events::Event;

use crate::context::AppContext;

/// How many past events a new subscriber receives.
const REPLAY: usize = 50;

const HEARTBEAT: Duration = Duration::from_secs(15);

fn to_sse(event: &Event) -> Option<SseEvent> {
    let data = serde_json::to_string(event).ok()?;
    Some(SseEvent::default().id(event.seq.to_string()).data(data))
}

/// GET /api/events
///
/// Replays recent history oldest-first, then follows the live bus. Events
/// already replayed are skipped if they also arrive live.
pub async fn events_handler(
    State(ctx): State<AppContext>,
) -> Sse<impl futures_core::Stream<Item = Result<SseEvent, Infallible>>> {
    // Subscribe before reading history so nothing falls in between.
    let mut rx = ctx.event_bus.subscribe();
    let history = ctx.event_bus.recent_events(REPLAY);
    let mut last_seq = history.first().map(|e| e.seq).unwrap_or(0);

    let stream = async_stream::stream! {
        for event in history.iter().rev() {
            if let Some(sse) = to_sse(event) {
                yield Ok(sse);
            }
        }

        let mut heartbeat = tokio::time::interval(HEARTBEAT);
        heartbeat.tick().await;

        loop {
            tokio::select! {
                received = rx.recv() => match received {
                    Ok(event) if event.seq <= last_seq => {}
                    Ok(event) => {
                        last_seq = event.seq;
                        if let Some(sse) = to_sse(&event) {
                            yield Ok(sse);
                        }
                    }
                    Err(RecvError::Lagged(n)) => {
                        tracing::debug!("SSE client lagged by {n} events");
                    }
                    Err(RecvError::Closed) => break,
                },
                _ = heartbeat.tick() => {
                    yield Ok(SseEvent::default()
                        .event("heartbeat")
                        .data(r#"{"type":"heartbeat"}"#));
                }
            }
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::new().interval(HEARTBEAT).text("ping"))
}
