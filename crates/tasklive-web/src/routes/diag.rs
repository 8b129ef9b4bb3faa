//! Diagnostic endpoints.
//!
//! Operability introspection over the two registries. Mounted only when
//! diagnostics are enabled; production deployments leave them off.

use std::collections::BTreeMap;

use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
pub struct ConnectionInfo {
    pub id: String,
    pub opened_at: DateTime<Utc>,
}

#[derive(Serialize)]
pub struct ConnectedUsers {
    pub users: BTreeMap<String, Vec<ConnectionInfo>>,
}

/// `GET /internal/diag/users` - connected users and their connections.
pub async fn users(State(state): State<AppState>) -> Json<ConnectedUsers> {
    let registry = state.dispatcher.connections();
    let mut users = BTreeMap::new();
    for user_id in registry.users() {
        let conns = registry
            .connections_of(&user_id)
            .iter()
            .map(|c| ConnectionInfo {
                id: c.id().to_string(),
                opened_at: c.opened_at(),
            })
            .collect();
        users.insert(user_id, conns);
    }
    Json(ConnectedUsers { users })
}

/// `GET /internal/diag/topics` - current topic to viewer map.
pub async fn topics(State(state): State<AppState>) -> Json<BTreeMap<String, Vec<String>>> {
    Json(state.dispatcher.viewers().topics())
}
