//! Server-Sent Events support
//!
//! A session stream starts with an `init` event holding the snapshot, then
//! relays every session event and ends after `closed`.

use crate::runtime::{SessionEvent, SessionSnapshot};
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use serde_json::json;
use std::convert::Infallible;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

/// Convert a session subscription to an SSE stream
pub fn sse_stream(
    snapshot: SessionSnapshot,
    broadcast_rx: broadcast::Receiver<SessionEvent>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let init = futures::stream::once(async move { Ok(init_event(&snapshot)) });

    let updates = futures::stream::unfold(
        Some(BroadcastStream::new(broadcast_rx)),
        |stream| async move {
            let mut stream = stream?;
            while let Some(result) = stream.next().await {
                // Lagged receivers skip what they missed
                let Ok(event) = result else { continue };
                let closed = matches!(event, SessionEvent::Closed);
                let next = if closed { None } else { Some(stream) };
                return Some((Ok::<_, Infallible>(session_event_to_axum(event)), next));
            }
            None
        },
    );

    Sse::new(init.chain(updates)).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    )
}

fn init_event(snapshot: &SessionSnapshot) -> Event {
    let data = json!({
        "type": "init",
        "session_id": snapshot.session_id,
        "state": snapshot.state,
        "turns": snapshot.turns,
    });
    Event::default().event("init").data(data.to_string())
}

fn session_event_to_axum(event: SessionEvent) -> Event {
    let (event_type, data) = session_event_payload(event);
    Event::default().event(event_type).data(data.to_string())
}

fn session_event_payload(event: SessionEvent) -> (&'static str, serde_json::Value) {
    match event {
        SessionEvent::Turn { turn } => (
            "turn",
            json!({
                "type": "turn",
                "turn": turn
            }),
        ),
        SessionEvent::StateChange { state } => (
            "state_change",
            json!({
                "type": "state_change",
                "state": state
            }),
        ),
        SessionEvent::Record { record } => (
            "record",
            json!({
                "type": "record",
                "record": record
            }),
        ),
        SessionEvent::Closed => (
            "closed",
            json!({
                "type": "closed"
            }),
        ),
    }
}
