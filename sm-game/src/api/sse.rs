//! Server-Sent Events stream of game events
//!
//! `GET /api/events` streams every [`GameEvent`]; `?session=<id>` narrows it
//! to one session's events plus the process-wide ones (catalog reloads).

use crate::AppState;
use axum::{
    extract::{Query, State},
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::{Stream, StreamExt};
use serde::Deserialize;
use sm_common::events::GameEvent;
use std::convert::Infallible;
use std::time::Duration;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Debug, Default, Deserialize)]
pub struct EventFilter {
    pub session: Option<Uuid>,
}

impl EventFilter {
    fn accepts(&self, event: &GameEvent) -> bool {
        match (self.session, event.session_id()) {
            (Some(wanted), Some(actual)) => wanted == actual,
            _ => true,
        }
    }
}

/// GET /api/events
pub async fn event_stream(
    State(state): State<AppState>,
    Query(filter): Query<EventFilter>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    debug!("New SSE client connected (session filter: {:?})", filter.session);

    let rx = state.events.subscribe();
    let stream = BroadcastStream::new(rx).filter_map(move |result| {
        let event = match result {
            Ok(event) if filter.accepts(&event) => Some(event),
            Ok(_) => None,
            Err(e) => {
                warn!("SSE stream error: {:?}", e);
                None
            }
        };
        async move {
            let event = event?;
            match serde_json::to_string(&event) {
                Ok(json) => Some(Ok(Event::default().event(event.event_type()).data(json))),
                Err(e) => {
                    warn!("Failed to serialize event: {}", e);
                    None
                }
            }
        }
    });

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}
