//! Best-effort event fan-out.
//!
//! The dispatcher resolves recipients through the connection and viewer
//! registries and writes the serialized event to each matching connection.
//! Delivery is at-most-once per connection per call: nothing is queued,
//! retried or acknowledged. Writes are raced against a fixed timeout so a
//! half-open connection can never stall a mutation handler, and every
//! failed or timed-out connection is pruned after the attempt loop.

use std::time::Duration;

use futures::future::join_all;
use tracing::{debug, info, warn};

use super::connection::{Connection, ConnectionId, ConnectionRegistry, Removal, UserId};
use super::viewer::ViewerRegistry;
use crate::config::RealtimeConfig;
use crate::event::Event;

/// The fan-out engine and owner of both registries.
///
/// Constructed once per process and shared by reference with whatever
/// accepts streams and whatever handles mutations.
pub struct Dispatcher {
    connections: ConnectionRegistry,
    viewers: ViewerRegistry,
    write_timeout: Duration,
}

impl Dispatcher {
    pub fn new(config: &RealtimeConfig) -> Self {
        Self {
            connections: ConnectionRegistry::new(config.max_connections_per_user),
            viewers: ViewerRegistry::new(),
            write_timeout: config.write_timeout,
        }
    }

    pub fn connections(&self) -> &ConnectionRegistry {
        &self.connections
    }

    pub fn viewers(&self) -> &ViewerRegistry {
        &self.viewers
    }

    /// Register a freshly opened connection. May evict the same user's
    /// oldest connection past the cap.
    pub fn register_connection(&self, conn: Connection) -> ConnectionId {
        self.connections.register(conn)
    }

    /// Remove one connection, cascading the user out of every topic when
    /// it was their last.
    pub fn drop_connection(&self, user_id: &str, conn_id: &str) {
        if self.connections.unregister(user_id, conn_id) == Removal::UserEmptied {
            self.viewers.cascade_remove_user(user_id);
        }
    }

    /// Remove all of a user's connections and cascade unconditionally.
    pub fn drop_user(&self, user_id: &str) {
        self.connections.unregister_all(user_id);
        self.viewers.cascade_remove_user(user_id);
    }

    /// Deliver an event to every connection of one user.
    ///
    /// A user with no connections is not an error; the send is skipped.
    pub async fn send_to_user(&self, user_id: &str, event: &Event) {
        let Some(frame) = self.serialize(event) else {
            return;
        };
        let conns = self.connections.connections_of(user_id);
        if conns.is_empty() {
            debug!(%user_id, kind = %event.kind, "No connections for user, skipping send");
            return;
        }
        let delivered = self.write_all(conns, &frame).await;
        debug!(%user_id, kind = %event.kind, delivered, "User fan-out complete");
    }

    /// Deliver an event to every viewer of a topic.
    ///
    /// Viewers found without any connection at dispatch time are treated
    /// as no longer reachable and removed from the topic's viewer set.
    pub async fn send_to_topic(&self, topic: &str, event: &Event) {
        let Some(frame) = self.serialize(event) else {
            return;
        };
        let viewer_ids = self.viewers.viewers_of(topic);
        if viewer_ids.is_empty() {
            debug!(%topic, kind = %event.kind, "No viewers for topic, skipping send");
            return;
        }
        debug!(%topic, kind = %event.kind, viewers = viewer_ids.len(), "Fanning out topic event");
        join_all(
            viewer_ids
                .iter()
                .map(|user_id| self.deliver_to_viewer(topic, user_id, &frame)),
        )
        .await;
    }

    /// Deliver an event to every connection of every user.
    pub async fn broadcast(&self, event: &Event) {
        let Some(frame) = self.serialize(event) else {
            return;
        };
        let conns = self.connections.snapshot();
        let delivered = self.write_all(conns, &frame).await;
        debug!(kind = %event.kind, delivered, "Broadcast complete");
    }

    /// Close every connection and drop all viewer state.
    pub fn shutdown(&self) {
        info!("Realtime dispatcher shutting down");
        self.connections.clear();
        self.viewers.clear();
    }

    async fn deliver_to_viewer(&self, topic: &str, user_id: &str, frame: &str) {
        let conns = self.connections.connections_of(user_id);
        if conns.is_empty() {
            debug!(%topic, %user_id, "Viewer unreachable, removing from topic");
            self.viewers.remove_viewer(topic, user_id);
            return;
        }
        self.write_all(conns, frame).await;
    }

    /// Write one frame to each connection concurrently, each write raced
    /// against the configured timeout. Dead connections are pruned only
    /// after the whole attempt loop, so one slow peer never cancels a
    /// sibling's in-flight write.
    async fn write_all(&self, conns: Vec<Connection>, frame: &str) -> usize {
        let attempts = conns.iter().map(|conn| async move {
            match tokio::time::timeout(self.write_timeout, conn.write(frame.to_string())).await {
                Ok(Ok(())) => Ok(()),
                Ok(Err(_)) => {
                    warn!(
                        user_id = %conn.user_id(),
                        conn_id = %conn.id(),
                        "Write to closed connection, pruning"
                    );
                    Err((conn.user_id().to_string(), conn.id().to_string()))
                }
                Err(_) => {
                    warn!(
                        user_id = %conn.user_id(),
                        conn_id = %conn.id(),
                        timeout_ms = self.write_timeout.as_millis() as u64,
                        "Write timed out, pruning"
                    );
                    Err((conn.user_id().to_string(), conn.id().to_string()))
                }
            }
        });

        let mut delivered = 0;
        let mut dead: Vec<(UserId, ConnectionId)> = Vec::new();
        for outcome in join_all(attempts).await {
            match outcome {
                Ok(()) => delivered += 1,
                Err(key) => dead.push(key),
            }
        }
        for (user_id, conn_id) in dead {
            self.drop_connection(&user_id, &conn_id);
        }
        delivered
    }

    fn serialize(&self, event: &Event) -> Option<String> {
        match event.to_json() {
            Ok(frame) => Some(frame),
            Err(e) => {
                warn!(kind = %event.kind, error = %e, "Failed to serialize event, dropping");
                None
            }
        }
    }
}
