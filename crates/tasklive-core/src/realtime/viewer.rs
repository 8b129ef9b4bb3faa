//! Topic viewer registry.
//!
//! Tracks which users are currently looking at a given topic. Topics are
//! opaque keys; by convention the board composes them as `"<task-id>"`,
//! `"category:<name>"` or `"share:<id>"`, but nothing here depends on
//! that structure.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::RwLock;

use tracing::debug;

use super::connection::UserId;

/// Registry mapping topic → set of viewing users.
///
/// A topic entry exists only while its viewer set is non-empty. Viewer
/// membership is independent of connection state: a viewer may transiently
/// have no reachable connection.
pub struct ViewerRegistry {
    inner: RwLock<HashMap<String, HashSet<UserId>>>,
}

impl ViewerRegistry {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }

    /// Mark a user as viewing a topic. Idempotent.
    pub fn add_viewer(&self, topic: &str, user_id: &str) {
        let mut map = self.inner.write().expect("viewer registry poisoned");
        let inserted = map
            .entry(topic.to_string())
            .or_default()
            .insert(user_id.to_string());
        if inserted {
            debug!(%topic, %user_id, "Viewer added");
        }
    }

    /// Remove a user from a topic, reclaiming the topic when it empties.
    pub fn remove_viewer(&self, topic: &str, user_id: &str) {
        let mut map = self.inner.write().expect("viewer registry poisoned");
        if let Some(set) = map.get_mut(topic) {
            if set.remove(user_id) {
                debug!(%topic, %user_id, "Viewer removed");
            }
            if set.is_empty() {
                map.remove(topic);
            }
        }
    }

    /// Remove a user from every topic. Runs when the user's last
    /// connection is dropped, so viewer state never outlives all of a
    /// user's connections indefinitely.
    pub fn cascade_remove_user(&self, user_id: &str) {
        let mut map = self.inner.write().expect("viewer registry poisoned");
        let before = map.len();
        map.retain(|_, set| {
            set.remove(user_id);
            !set.is_empty()
        });
        debug!(%user_id, reclaimed_topics = before - map.len(), "Viewer cascade");
    }

    /// Current viewers of a topic.
    pub fn viewers_of(&self, topic: &str) -> Vec<UserId> {
        self.inner
            .read()
            .expect("viewer registry poisoned")
            .get(topic)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Sorted topic → viewers map, for diagnostics.
    pub fn topics(&self) -> BTreeMap<String, Vec<UserId>> {
        self.inner
            .read()
            .expect("viewer registry poisoned")
            .iter()
            .map(|(topic, set)| {
                let mut users: Vec<UserId> = set.iter().cloned().collect();
                users.sort();
                (topic.clone(), users)
            })
            .collect()
    }

    /// Drop all viewer state. Part of process shutdown.
    pub fn clear(&self) {
        self.inner
            .write()
            .expect("viewer registry poisoned")
            .clear();
    }
}

impl Default for ViewerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_viewer_is_idempotent() {
        let registry = ViewerRegistry::new();
        registry.add_viewer("task-42", "alice");
        registry.add_viewer("task-42", "alice");
        assert_eq!(registry.viewers_of("task-42"), vec!["alice".to_string()]);
    }

    #[test]
    fn test_empty_topic_is_reclaimed() {
        let registry = ViewerRegistry::new();
        registry.add_viewer("category:inbox", "alice");
        registry.remove_viewer("category:inbox", "alice");
        assert!(registry.topics().is_empty());
    }

    #[test]
    fn test_remove_unknown_viewer_is_a_noop() {
        let registry = ViewerRegistry::new();
        registry.add_viewer("task-1", "alice");
        registry.remove_viewer("task-1", "bob");
        registry.remove_viewer("task-9", "alice");
        assert_eq!(registry.viewers_of("task-1"), vec!["alice".to_string()]);
    }

    #[test]
    fn test_cascade_removes_user_everywhere() {
        let registry = ViewerRegistry::new();
        registry.add_viewer("task-1", "alice");
        registry.add_viewer("task-2", "alice");
        registry.add_viewer("task-2", "bob");

        registry.cascade_remove_user("alice");

        assert!(registry.viewers_of("task-1").is_empty());
        assert_eq!(registry.viewers_of("task-2"), vec!["bob".to_string()]);
        assert_eq!(registry.topics().len(), 1);
    }
}
