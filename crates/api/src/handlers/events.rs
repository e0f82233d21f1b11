use std::convert::Infallible;

use axum::extract::State;
use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use futures::Stream;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

use super::AppState;

/// `subscribeEvents()` — every task state transition across every job,
/// served as a line-delimited SSE stream. A lagging client misses events
/// rather than blocking the publisher; each dropped batch is logged and
/// skipped.
pub async fn subscribe_events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<SseEvent, Infallible>>> {
    let receiver = state.scheduler.event_hub().subscribe();
    let stream = BroadcastStream::new(receiver).filter_map(|result| match result {
        Ok(event) => match serde_json::to_string(&event) {
            Ok(json) => Some(Ok(SseEvent::default().event("task-state").data(json))),
            Err(e) => {
                tracing::warn!(error = %e, "failed to serialize event for SSE");
                None
            }
        },
        Err(e) => {
            tracing::debug!(error = %e, "event subscriber lagged, skipping gap");
            None
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
