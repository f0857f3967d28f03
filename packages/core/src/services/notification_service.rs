//! Notification Publisher - Realtime Freshness Hints
//!
//! After a successful reconciliation, live sessions of the owning user are
//! told which notes changed so open views can refresh. Delivery is
//! at-most-once and best-effort: the Reference Store and note content
//! remain the single source of truth, the push is a UI freshness hint, and
//! clients can always fetch current reference state on demand.
//!
//! Delivery failures are logged and swallowed - they must never fail or
//! delay the save operation that triggered them.
//!
//! # Wire Format (JSON Serialization)
//!
//! `ReferenceEvent` uses `#[serde(rename_all = "camelCase")]`, matching the
//! app frontend's event types. The contract test below pins the format.

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Channel capacity per live session.
///
/// 128 provides sufficient headroom for burst reconciliations while
/// limiting memory overhead; a session lagging further than this starts
/// dropping events, which is acceptable for freshness hints.
const SESSION_CHANNEL_CAPACITY: usize = 128;

/// Event pushed to a user's live sessions after reconciliation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceEvent {
    /// The note whose save triggered the reconciliation
    pub note_id: String,
    /// Every note affected by the pass (source plus mutated targets)
    pub affected_note_ids: Vec<String>,
    /// Human-readable summary for debug consoles
    pub message: String,
}

/// Opaque handle identifying one live session
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionHandle {
    pub session_id: String,
}

/// A session could not accept an event
#[derive(Error, Debug)]
#[error("session {session_id} is no longer reachable: {reason}")]
pub struct SessionSendError {
    pub session_id: String,
    pub reason: String,
}

/// Registry of live sessions, as consumed by the publisher
///
/// The transport behind a session (websocket, SSE, in-process channel) is
/// the app's concern; the engine only needs "who is live" and "push this".
#[async_trait]
pub trait SessionRegistry: Send + Sync {
    /// All currently live sessions for one user
    fn live_sessions(&self, user_id: &str) -> Vec<SessionHandle>;

    /// Push one event to one session
    async fn send(
        &self,
        handle: &SessionHandle,
        event: ReferenceEvent,
    ) -> Result<(), SessionSendError>;
}

/// In-memory SessionRegistry backed by per-session channels
///
/// Used by the app shell for in-process delivery and by tests as the
/// registry double.
#[derive(Default)]
pub struct InMemorySessionRegistry {
    /// user_id -> live sessions with their event channels
    sessions: DashMap<String, Vec<(SessionHandle, mpsc::Sender<ReferenceEvent>)>>,
}

impl InMemorySessionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a live session and return its event receiver
    ///
    /// Re-registering an existing session id replaces the old channel.
    pub fn register(&self, user_id: &str, session_id: &str) -> mpsc::Receiver<ReferenceEvent> {
        let (tx, rx) = mpsc::channel(SESSION_CHANNEL_CAPACITY);
        let handle = SessionHandle {
            session_id: session_id.to_string(),
        };

        let mut entry = self.sessions.entry(user_id.to_string()).or_default();
        entry.retain(|(h, _)| h != &handle);
        entry.push((handle, tx));

        rx
    }

    /// Drop a session (e.g. the client disconnected)
    pub fn unregister(&self, user_id: &str, session_id: &str) {
        if let Some(mut entry) = self.sessions.get_mut(user_id) {
            entry.retain(|(h, _)| h.session_id != session_id);
        }
    }
}

#[async_trait]
impl SessionRegistry for InMemorySessionRegistry {
    fn live_sessions(&self, user_id: &str) -> Vec<SessionHandle> {
        self.sessions
            .get(user_id)
            .map(|entry| entry.iter().map(|(h, _)| h.clone()).collect())
            .unwrap_or_default()
    }

    async fn send(
        &self,
        handle: &SessionHandle,
        event: ReferenceEvent,
    ) -> Result<(), SessionSendError> {
        let sender = self
            .sessions
            .iter()
            .find_map(|entry| {
                entry
                    .value()
                    .iter()
                    .find(|(h, _)| h == handle)
                    .map(|(_, tx)| tx.clone())
            })
            .ok_or_else(|| SessionSendError {
                session_id: handle.session_id.clone(),
                reason: "not registered".to_string(),
            })?;

        sender.try_send(event).map_err(|e| SessionSendError {
            session_id: handle.session_id.clone(),
            reason: e.to_string(),
        })
    }
}

/// Publishes reconciliation results to a user's live sessions
pub struct NotificationPublisher {
    registry: Arc<dyn SessionRegistry>,
}

impl NotificationPublisher {
    /// Create a new publisher over an injected session registry
    pub fn new(registry: Arc<dyn SessionRegistry>) -> Self {
        Self { registry }
    }

    /// Push the affected-notes event to every live session of the user
    ///
    /// Infallible by contract: a user with no live sessions is a silent
    /// no-op, and per-session delivery failures are logged and swallowed.
    pub async fn publish(&self, user_id: &str, source_note_id: &str, affected_note_ids: &[String]) {
        let sessions = self.registry.live_sessions(user_id);
        if sessions.is_empty() {
            debug!(
                "no live sessions for user {}; dropping reference event",
                user_id
            );
            return;
        }

        let event = ReferenceEvent {
            note_id: source_note_id.to_string(),
            affected_note_ids: affected_note_ids.to_vec(),
            message: format!("References updated for note {source_note_id}"),
        };

        for handle in sessions {
            if let Err(e) = self.registry.send(&handle, event.clone()).await {
                warn!(
                    "dropping reference event for session {}: {}",
                    handle.session_id, e
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Contract test: pins the exact JSON event format the app frontend
    /// consumes.
    #[test]
    fn test_event_serialization_contract() {
        let event = ReferenceEvent {
            note_id: "a".to_string(),
            affected_note_ids: vec!["a".to_string(), "b".to_string()],
            message: "References updated for note a".to_string(),
        };

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json.get("noteId").unwrap(), "a");
        assert_eq!(
            json.get("affectedNoteIds").unwrap(),
            &serde_json::json!(["a", "b"])
        );
        assert_eq!(
            json.get("message").unwrap(),
            "References updated for note a"
        );
        assert!(json.get("note_id").is_none());
    }

    #[tokio::test]
    async fn test_publish_reaches_all_live_sessions() {
        let registry = Arc::new(InMemorySessionRegistry::new());
        let mut rx1 = registry.register("user-1", "s1");
        let mut rx2 = registry.register("user-1", "s2");

        let publisher = NotificationPublisher::new(registry);
        publisher
            .publish("user-1", "a", &["a".to_string(), "b".to_string()])
            .await;

        let e1 = rx1.recv().await.unwrap();
        let e2 = rx2.recv().await.unwrap();
        assert_eq!(e1.note_id, "a");
        assert_eq!(e1, e2);
    }

    #[tokio::test]
    async fn test_publish_without_sessions_is_noop() {
        let registry = Arc::new(InMemorySessionRegistry::new());
        let publisher = NotificationPublisher::new(registry);

        // Must not fail or panic
        publisher.publish("user-1", "a", &["a".to_string()]).await;
    }

    #[tokio::test]
    async fn test_publish_skips_dead_session() {
        let registry = Arc::new(InMemorySessionRegistry::new());
        let rx1 = registry.register("user-1", "dead");
        drop(rx1);
        let mut rx2 = registry.register("user-1", "live");

        let publisher = NotificationPublisher::new(registry);
        publisher.publish("user-1", "a", &["a".to_string()]).await;

        // The dead session's failure is swallowed; the live one still
        // receives the event
        let event = rx2.recv().await.unwrap();
        assert_eq!(event.note_id, "a");
    }

    #[tokio::test]
    async fn test_sessions_are_per_user() {
        let registry = Arc::new(InMemorySessionRegistry::new());
        let mut other_rx = registry.register("user-2", "s1");

        let publisher = NotificationPublisher::new(registry);
        publisher.publish("user-1", "a", &["a".to_string()]).await;

        // user-2 never sees user-1's events
        assert!(other_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_unregister_removes_session() {
        let registry = Arc::new(InMemorySessionRegistry::new());
        let _rx = registry.register("user-1", "s1");
        registry.unregister("user-1", "s1");

        assert!(registry.live_sessions("user-1").is_empty());
    }
}
