//! Topic viewer registration endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
};
use tracing::debug;

use crate::auth::AuthedUser;
use crate::state::AppState;

/// `POST /api/topics/{topic}/viewers` - register the caller as a viewer.
pub async fn add_viewer(
    State(state): State<AppState>,
    Path(topic): Path<String>,
    AuthedUser(user_id): AuthedUser,
) -> StatusCode {
    debug!(%topic, %user_id, "Viewer registration");
    state.dispatcher.viewers().add_viewer(&topic, &user_id);
    StatusCode::NO_CONTENT
}

/// `DELETE /api/topics/{topic}/viewers` - unregister the caller.
pub async fn remove_viewer(
    State(state): State<AppState>,
    Path(topic): Path<String>,
    AuthedUser(user_id): AuthedUser,
) -> StatusCode {
    debug!(%topic, %user_id, "Viewer unregistration");
    state.dispatcher.viewers().remove_viewer(&topic, &user_id);
    StatusCode::NO_CONTENT
}
