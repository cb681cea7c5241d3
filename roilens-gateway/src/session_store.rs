//! Bounded, expiring store for conversation sessions.
//!
//! Replaces process-global session maps with a lock-guarded TTL cache:
//! entries expire after `ttl` of inactivity and expired entries are swept
//! on every write.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;

/// Conversational state for one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationSession {
    /// Provider-assigned thread handle, created once per session.
    pub thread_id: String,
    /// Last context version injected into the thread.
    pub context_version: Option<String>,
    /// Whether the thread has been sent its first context message.
    pub has_received_context: bool,
}

impl ConversationSession {
    pub fn new(thread_id: impl Into<String>) -> Self {
        Self {
            thread_id: thread_id.into(),
            context_version: None,
            has_received_context: false,
        }
    }
}

#[derive(Debug)]
struct SessionEntry {
    session: ConversationSession,
    touched: Instant,
}

/// TTL-bounded session map keyed by session id.
#[derive(Debug)]
pub struct SessionStore {
    ttl: Duration,
    map: RwLock<HashMap<String, SessionEntry>>,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            map: RwLock::new(HashMap::new()),
        }
    }

    /// Fetch a live session, refreshing its idle timer.
    pub async fn get(&self, session_id: &str) -> Option<ConversationSession> {
        let mut map = self.map.write().await;
        let entry = map.get_mut(session_id)?;
        if entry.touched.elapsed() > self.ttl {
            map.remove(session_id);
            return None;
        }
        entry.touched = Instant::now();
        Some(entry.session.clone())
    }

    /// Insert or replace a session, sweeping expired entries.
    pub async fn insert(&self, session_id: impl Into<String>, session: ConversationSession) {
        let mut map = self.map.write().await;
        map.retain(|_, entry| entry.touched.elapsed() <= self.ttl);
        map.insert(
            session_id.into(),
            SessionEntry {
                session,
                touched: Instant::now(),
            },
        );
    }

    /// Number of live entries (expired entries may still be counted until
    /// the next sweep).
    pub async fn len(&self) -> usize {
        self.map.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.map.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn get_returns_inserted_session() {
        let store = SessionStore::new(Duration::from_millis(100));
        store
            .insert("s1", ConversationSession::new("thread_1"))
            .await;

        let session = store.get("s1").await.unwrap();
        assert_eq!(session.thread_id, "thread_1");
        assert!(!session.has_received_context);
    }

    #[tokio::test]
    async fn expired_sessions_are_gone() {
        let store = SessionStore::new(Duration::from_millis(10));
        store
            .insert("s1", ConversationSession::new("thread_1"))
            .await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(store.get("s1").await.is_none());
    }

    #[tokio::test]
    async fn insert_sweeps_expired_entries() {
        let store = SessionStore::new(Duration::from_millis(10));
        store
            .insert("old", ConversationSession::new("thread_old"))
            .await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        store
            .insert("new", ConversationSession::new("thread_new"))
            .await;

        assert_eq!(store.len().await, 1);
        assert!(store.get("new").await.is_some());
    }

    #[tokio::test]
    async fn get_refreshes_idle_timer() {
        let store = SessionStore::new(Duration::from_millis(40));
        store
            .insert("s1", ConversationSession::new("thread_1"))
            .await;

        // Keep touching the session past its original TTL.
        for _ in 0..3 {
            tokio::time::sleep(Duration::from_millis(25)).await;
            assert!(store.get("s1").await.is_some());
        }
    }

    #[tokio::test]
    async fn replacing_a_session_updates_state() {
        let store = SessionStore::new(Duration::from_secs(60));
        store
            .insert("s1", ConversationSession::new("thread_1"))
            .await;

        let mut session = store.get("s1").await.unwrap();
        session.has_received_context = true;
        session.context_version = Some("v2".to_string());
        store.insert("s1", session).await;

        let session = store.get("s1").await.unwrap();
        assert!(session.has_received_context);
        assert_eq!(session.context_version.as_deref(), Some("v2"));
    }
}
