//! # Live Change Events
//!
//! `GET /v1/events` streams committed ledger changes as Server-Sent Events.
//! Each `attendance-changed` event carries a JSON array of
//! `{studentId, day, status}`. Delivery is best effort: a viewer that falls
//! behind the broadcast buffer receives a `resync` event and should
//! re-fetch the ledger, as it should after any reconnect.

use std::convert::Infallible;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::routing::get;
use axum::Router;
use futures::future;
use futures::stream::{self, Stream, StreamExt};
use rollcall_ledger::ChangeEvent;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::broadcast::Receiver;

use crate::auth::{require_role, CallerIdentity, Role};
use crate::error::AppError;
use crate::state::AppState;

/// Event name of a batch of committed changes.
pub const CHANGED_EVENT: &str = "attendance-changed";

/// Event name telling a lagging viewer to re-fetch.
pub const RESYNC_EVENT: &str = "resync";

#[utoipa::path(
    get,
    path = "/v1/events",
    responses(
        (status = 200, description = "Server-Sent Events stream of attendance changes", content_type = "text/event-stream"),
    ),
    tag = "attendance"
)]
pub async fn stream_events(
    State(state): State<AppState>,
    caller: CallerIdentity,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    require_role(&caller, Role::Teacher)?;
    let receiver = state.ledger.broadcaster().subscribe();
    tracing::debug!(
        viewers = state.ledger.broadcaster().subscriber_count(),
        "viewer connected"
    );
    Ok(Sse::new(change_stream(receiver)).keep_alive(KeepAlive::default()))
}

/// What a connected viewer is told next.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ViewerMessage {
    Changed(ChangeEvent),
    /// The viewer missed this many events and must re-fetch.
    Resync(u64),
}

impl ViewerMessage {
    fn into_event(self) -> Option<Event> {
        match self {
            Self::Changed(change) => {
                match Event::default().event(CHANGED_EVENT).json_data(&change.changes) {
                    Ok(event) => Some(event),
                    Err(e) => {
                        tracing::error!(error = %e, "failed to encode change event");
                        None
                    }
                }
            }
            Self::Resync(skipped) => {
                Some(Event::default().event(RESYNC_EVENT).data(skipped.to_string()))
            }
        }
    }
}

/// Messages for one viewer, ending when the broadcaster is dropped.
fn viewer_messages(receiver: Receiver<ChangeEvent>) -> impl Stream<Item = ViewerMessage> {
    stream::unfold(receiver, |mut receiver| async move {
        match receiver.recv().await {
            Ok(change) => Some((ViewerMessage::Changed(change), receiver)),
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "viewer lagged behind, requesting resync");
                Some((ViewerMessage::Resync(skipped), receiver))
            }
            Err(RecvError::Closed) => None,
        }
    })
}

/// Adapt a broadcast receiver into an SSE stream.
fn change_stream(receiver: Receiver<ChangeEvent>) -> impl Stream<Item = Result<Event, Infallible>> {
    viewer_messages(receiver)
        .filter_map(|message| future::ready(message.into_event().map(Ok)))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/v1/events", get(stream_events))
}
