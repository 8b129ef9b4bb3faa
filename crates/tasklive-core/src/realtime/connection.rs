//! Live stream connections and the per-user connection registry.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tracing::{debug, info};
use uuid::Uuid;

/// Identity of an authenticated user, as established upstream.
pub type UserId = String;

/// Unique identifier of one live connection.
pub type ConnectionId = String;

/// Error returned when writing to a connection whose reader is gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionClosed;

/// One live server-to-client streaming channel.
///
/// Holds the sending half of the bounded channel drained by the stream
/// handler. A write suspends once the buffer fills; the dispatcher races
/// its per-write timeout against exactly that suspension.
#[derive(Clone)]
pub struct Connection {
    id: ConnectionId,
    user_id: UserId,
    opened_at: DateTime<Utc>,
    tx: mpsc::Sender<String>,
}

impl Connection {
    /// Wrap the sending half of a freshly created stream channel.
    pub fn new(user_id: impl Into<UserId>, tx: mpsc::Sender<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            opened_at: Utc::now(),
            tx,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn opened_at(&self) -> DateTime<Utc> {
        self.opened_at
    }

    /// Queue one serialized frame for the stream handler to flush.
    ///
    /// Suspends while the outbound buffer is full; fails once the
    /// receiving side has gone away.
    pub async fn write(&self, frame: String) -> Result<(), ConnectionClosed> {
        self.tx.send(frame).await.map_err(|_| ConnectionClosed)
    }

    /// Drop this end of the channel. The stream handler's receive loop
    /// ends once any in-flight sender clones settle; close never fails.
    fn close(self) {
        debug!(conn_id = %self.id, user_id = %self.user_id, "Connection closed");
    }
}

/// Outcome of removing a connection from the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Removal {
    /// The connection was removed; the user still has others.
    Removed,
    /// The connection was removed and it was the user's last one.
    UserEmptied,
    /// Nothing matched; the connection was already evicted or pruned.
    NotFound,
}

/// Registry of every user's live connections, newest last.
///
/// A user may hold several connections at once (tabs, devices); the list
/// is capped and the oldest entries are evicted first. All operations are
/// synchronous and never held across an await.
pub struct ConnectionRegistry {
    max_per_user: usize,
    inner: RwLock<HashMap<UserId, Vec<Connection>>>,
}

impl ConnectionRegistry {
    pub fn new(max_per_user: usize) -> Self {
        Self {
            max_per_user,
            inner: RwLock::new(HashMap::new()),
        }
    }

    /// Add a connection, evicting the user's oldest entries beyond the cap.
    pub fn register(&self, conn: Connection) -> ConnectionId {
        let conn_id = conn.id.clone();
        let user_id = conn.user_id.clone();
        let mut evicted = Vec::new();

        {
            let mut map = self.inner.write().expect("connection registry poisoned");
            let list = map.entry(user_id.clone()).or_default();
            list.push(conn);
            while list.len() > self.max_per_user {
                evicted.push(list.remove(0));
            }
        }

        for old in evicted {
            info!(
                user_id = %user_id,
                evicted_conn_id = %old.id,
                "Connection cap exceeded, evicting oldest"
            );
            old.close();
        }

        debug!(user_id = %user_id, conn_id = %conn_id, "Connection registered");
        conn_id
    }

    /// Remove one connection. Reports whether the user's entry emptied so
    /// the caller can run the viewer cascade. Idempotent: teardown and
    /// eviction may both attempt the same removal.
    pub fn unregister(&self, user_id: &str, conn_id: &str) -> Removal {
        let mut map = self.inner.write().expect("connection registry poisoned");
        let Some(list) = map.get_mut(user_id) else {
            return Removal::NotFound;
        };
        let Some(pos) = list.iter().position(|c| c.id == conn_id) else {
            return Removal::NotFound;
        };

        let conn = list.remove(pos);
        let emptied = list.is_empty();
        if emptied {
            map.remove(user_id);
        }
        drop(map);

        conn.close();
        debug!(%user_id, %conn_id, emptied, "Connection unregistered");
        if emptied {
            Removal::UserEmptied
        } else {
            Removal::Removed
        }
    }

    /// Remove and close every connection a user holds.
    pub fn unregister_all(&self, user_id: &str) -> bool {
        let removed = {
            let mut map = self.inner.write().expect("connection registry poisoned");
            map.remove(user_id)
        };
        match removed {
            Some(list) => {
                info!(%user_id, count = list.len(), "All connections unregistered");
                for conn in list {
                    conn.close();
                }
                true
            }
            None => false,
        }
    }

    /// Snapshot of one user's connections, oldest first.
    pub fn connections_of(&self, user_id: &str) -> Vec<Connection> {
        self.inner
            .read()
            .expect("connection registry poisoned")
            .get(user_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Snapshot of every live connection across all users.
    pub fn snapshot(&self) -> Vec<Connection> {
        self.inner
            .read()
            .expect("connection registry poisoned")
            .values()
            .flatten()
            .cloned()
            .collect()
    }

    /// Users currently holding at least one connection.
    pub fn users(&self) -> Vec<UserId> {
        self.inner
            .read()
            .expect("connection registry poisoned")
            .keys()
            .cloned()
            .collect()
    }

    pub fn connection_count(&self, user_id: &str) -> usize {
        self.inner
            .read()
            .expect("connection registry poisoned")
            .get(user_id)
            .map_or(0, Vec::len)
    }

    /// Close everything. Part of process shutdown.
    pub fn clear(&self) {
        let drained: Vec<Connection> = {
            let mut map = self.inner.write().expect("connection registry poisoned");
            map.drain().flat_map(|(_, list)| list).collect()
        };
        for conn in drained {
            conn.close();
        }
    }
}
