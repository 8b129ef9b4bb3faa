//! SSE stream handler: the server side of one long-lived connection.
//!
//! Lifecycle per accepted stream: register a connection (possibly
//! evicting the same user's oldest one), emit a `connected` control
//! event, interleave dispatched frames with periodic heartbeats, and
//! tear everything down when the channel closes or the client goes away.
//! Nothing here is retried; a broken stream is torn down and the client
//! is responsible for opening a new one.

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::State;
use axum::response::sse::{Event as SseEvent, Sse};
use futures::stream::Stream;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use tasklive_core::event::Event;
use tasklive_core::realtime::{Connection, Dispatcher};

use crate::auth::AuthedUser;
use crate::state::AppState;

/// Unregisters the connection when the response body is dropped - client
/// abort, heartbeat write failure and eviction all end up here.
struct StreamGuard {
    dispatcher: Arc<Dispatcher>,
    user_id: String,
    conn_id: String,
}

impl Drop for StreamGuard {
    fn drop(&mut self) {
        debug!(user_id = %self.user_id, conn_id = %self.conn_id, "Stream closing");
        self.dispatcher.drop_connection(&self.user_id, &self.conn_id);
        info!(user_id = %self.user_id, conn_id = %self.conn_id, "Stream closed");
    }
}

/// `GET /api/stream` - establish the long-lived event stream.
pub async fn stream_handler(
    State(state): State<AppState>,
    AuthedUser(user_id): AuthedUser,
) -> Sse<impl Stream<Item = Result<SseEvent, Infallible>>> {
    let (tx, mut rx) = mpsc::channel(state.config.stream_buffer);
    let conn = Connection::new(user_id.clone(), tx);
    info!(%user_id, conn_id = %conn.id(), "Stream opening");

    let guard = StreamGuard {
        dispatcher: state.dispatcher.clone(),
        user_id,
        conn_id: conn.id().to_string(),
    };
    state.dispatcher.register_connection(conn);
    let heartbeat_interval = state.config.heartbeat_interval;

    let stream = async_stream::stream! {
        let guard = guard;

        if let Ok(frame) = Event::connected().to_json() {
            yield Ok(SseEvent::default().data(frame));
        }
        debug!(user_id = %guard.user_id, conn_id = %guard.conn_id, "Stream established");

        let mut ticker = tokio::time::interval(heartbeat_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        ticker.tick().await;

        loop {
            let frame = tokio::select! {
                maybe = rx.recv() => match maybe {
                    Some(frame) => frame,
                    // Registry dropped our sender: evicted or unregistered.
                    None => break,
                },
                _ = ticker.tick() => match Event::heartbeat().to_json() {
                    Ok(frame) => frame,
                    Err(_) => continue,
                },
            };
            yield Ok(SseEvent::default().data(frame));
        }
    };

    Sse::new(stream)
}
