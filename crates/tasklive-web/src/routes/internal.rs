//! Internal notification endpoint.
//!
//! The seam through which mutation handlers (task CRUD, uploads,
//! category edits) push change events after committing state.

use axum::{extract::State, http::StatusCode, Json};
use tracing::info;

use tasklive_core::notifier::NotifyRequest;

use crate::state::AppState;

/// Receive a notification and fan it out to the matching connections.
pub async fn notify(
    State(state): State<AppState>,
    Json(request): Json<NotifyRequest>,
) -> StatusCode {
    match request {
        NotifyRequest::User { user_id, event } => {
            info!(%user_id, kind = %event.kind, "Dispatching user notification");
            state.dispatcher.send_to_user(&user_id, &event).await;
        }
        NotifyRequest::Topic { topic, event } => {
            info!(%topic, kind = %event.kind, "Dispatching topic notification");
            state.dispatcher.send_to_topic(&topic, &event).await;
        }
        NotifyRequest::Broadcast { event } => {
            info!(kind = %event.kind, "Dispatching broadcast notification");
            state.dispatcher.broadcast(&event).await;
        }
    }
    StatusCode::OK
}
