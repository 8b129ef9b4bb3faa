//! Web server notifier for realtime updates.
//!
//! Out-of-process collaborators (CLI commands, background jobs) use this
//! to hand events to the running server, which fans them out to connected
//! clients. Delivery is best-effort: a server that is not running is not
//! an error worth surfacing.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::event::Event;

/// Default web server URL.
const DEFAULT_WEB_URL: &str = "http://127.0.0.1:3030";

/// Body of the internal notify endpoint, shared between this client and
/// the server-side route.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "target", rename_all = "snake_case")]
pub enum NotifyRequest {
    /// Deliver to every connection of one user.
    User { user_id: String, event: Event },
    /// Deliver to every viewer of a topic.
    Topic { topic: String, event: Event },
    /// Deliver to every connected client.
    Broadcast { event: Event },
}

/// Notifies the web server of state changes via HTTP.
#[derive(Clone)]
pub struct ChangeNotifier {
    client: reqwest::Client,
    base_url: String,
}

impl ChangeNotifier {
    /// Create a notifier with default settings.
    ///
    /// Uses the `TASKLIVE_WEB_URL` environment variable if set,
    /// otherwise defaults to `http://127.0.0.1:3030`.
    pub fn new() -> Self {
        let base_url =
            std::env::var("TASKLIVE_WEB_URL").unwrap_or_else(|_| DEFAULT_WEB_URL.to_string());
        debug!(base_url = %base_url, "ChangeNotifier initialized");
        Self::with_url(&base_url)
    }

    /// Create a notifier with a custom base URL.
    pub fn with_url(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(2))
                .build()
                .unwrap_or_default(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Notify every connection of one user.
    pub async fn notify_user(&self, user_id: &str, event: Event) {
        self.post(NotifyRequest::User {
            user_id: user_id.to_string(),
            event,
        })
        .await;
    }

    /// Notify every viewer of a topic.
    pub async fn notify_topic(&self, topic: &str, event: Event) {
        self.post(NotifyRequest::Topic {
            topic: topic.to_string(),
            event,
        })
        .await;
    }

    /// Notify every connected client.
    pub async fn notify_broadcast(&self, event: Event) {
        self.post(NotifyRequest::Broadcast { event }).await;
    }

    async fn post(&self, request: NotifyRequest) {
        let url = format!("{}/internal/notify", self.base_url);
        match self.client.post(&url).json(&request).send().await {
            Ok(response) => {
                if response.status().is_success() {
                    debug!(url = %url, "Change notification sent");
                } else {
                    warn!(
                        url = %url,
                        status_code = %response.status(),
                        "Change notification failed with status"
                    );
                }
            }
            Err(e) => {
                // Expected when tasklive serve is not running - just debug log
                debug!(
                    url = %url,
                    error = %e,
                    "Failed to send change notification (tasklive serve may not be running)"
                );
            }
        }
    }
}

impl Default for ChangeNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_notify_request_wire_shape() {
        let request = NotifyRequest::Topic {
            topic: "task-42".to_string(),
            event: Event::with_payload("task-updated", json!({"id": 42})),
        };
        let wire = serde_json::to_value(&request).unwrap();
        assert_eq!(wire["target"], "topic");
        assert_eq!(wire["topic"], "task-42");
        assert_eq!(wire["event"]["type"], "task-updated");
        assert_eq!(wire["event"]["id"], 42);
    }

    #[test]
    fn test_base_url_trailing_slash_is_normalized() {
        let notifier = ChangeNotifier::with_url("http://127.0.0.1:9999/");
        assert_eq!(notifier.base_url, "http://127.0.0.1:9999");
    }
}
