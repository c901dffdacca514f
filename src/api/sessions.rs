//! In-memory conversation sessions
//!
//! Sessions idle for longer than the TTL are dropped when a new session is
//! created; past the size cap the least recently used idle session goes.
//! A session whose turn is running is never evicted.

use crate::runtime::Transcript;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;

/// Transcript of one session; locked for the duration of a turn
pub type SessionHandle = Arc<Mutex<Transcript>>;

pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(60 * 60);
pub const DEFAULT_MAX_SESSIONS: usize = 1000;

struct Entry {
    transcript: SessionHandle,
    last_used: Instant,
}

impl Entry {
    fn is_busy(&self) -> bool {
        self.transcript.try_lock().is_err()
    }
}

/// Sessions by id
#[derive(Clone)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<String, Entry>>>,
    ttl: Duration,
    max_sessions: usize,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(DEFAULT_SESSION_TTL, DEFAULT_MAX_SESSIONS)
    }
}

impl SessionStore {
    pub fn new(ttl: Duration, max_sessions: usize) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            ttl,
            max_sessions: max_sessions.max(1),
        }
    }

    /// Start a new empty session
    pub async fn create(&self) -> (String, SessionHandle) {
        let id = uuid::Uuid::new_v4().to_string();
        let handle = SessionHandle::default();

        let mut sessions = self.sessions.write().await;
        self.evict(&mut sessions);
        sessions.insert(
            id.clone(),
            Entry {
                transcript: handle.clone(),
                last_used: Instant::now(),
            },
        );
        tracing::info!(session_id = %id, sessions = sessions.len(), "Session created");
        (id, handle)
    }

    /// Look up a session and mark it used
    pub async fn get(&self, id: &str) -> Option<SessionHandle> {
        let mut sessions = self.sessions.write().await;
        let entry = sessions.get_mut(id)?;
        entry.last_used = Instant::now();
        Some(entry.transcript.clone())
    }

    pub async fn remove(&self, id: &str) -> bool {
        self.sessions.write().await.remove(id).is_some()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Drop expired sessions, then idle ones until there is room for one more
    fn evict(&self, sessions: &mut HashMap<String, Entry>) {
        let now = Instant::now();
        let before = sessions.len();
        sessions.retain(|_, entry| entry.is_busy() || now - entry.last_used < self.ttl);

        while sessions.len() >= self.max_sessions {
            let oldest = sessions
                .iter()
                .filter(|(_, entry)| !entry.is_busy())
                .min_by_key(|(_, entry)| entry.last_used)
                .map(|(id, _)| id.clone());
            match oldest {
                Some(id) => {
                    sessions.remove(&id);
                }
                // Everything is mid-turn
                None => break,
            }
        }

        let evicted = before - sessions.len();
        if evicted > 0 {
            tracing::info!(evicted, "Evicted idle sessions");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::LlmMessage;

    #[tokio::test]
    async fn test_create_get_remove() {
        let store = SessionStore::default();
        assert!(store.is_empty().await);

        let (id, handle) = store.create().await;
        handle.lock().await.push(LlmMessage::user("hi"));

        let fetched = store.get(&id).await.unwrap();
        assert_eq!(fetched.lock().await.len(), 1);
        assert_eq!(store.len().await, 1);

        assert!(store.remove(&id).await);
        assert!(!store.remove(&id).await);
        assert!(store.get(&id).await.is_none());
    }

    #[tokio::test]
    async fn test_ids_are_unique() {
        let store = SessionStore::default();
        let (a, _) = store.create().await;
        let (b, _) = store.create().await;
        assert_ne!(a, b);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_sessions_are_dropped() {
        let store = SessionStore::new(Duration::from_secs(60), 100);
        let (stale, _) = store.create().await;
        let (fresh, _) = store.create().await;

        tokio::time::advance(Duration::from_secs(45)).await;
        assert!(store.get(&fresh).await.is_some());
        tokio::time::advance(Duration::from_secs(30)).await;

        let (_new, _) = store.create().await;
        assert!(store.get(&stale).await.is_none());
        assert!(store.get(&fresh).await.is_some());
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cap_evicts_least_recently_used() {
        let store = SessionStore::new(DEFAULT_SESSION_TTL, 2);
        let (first, _) = store.create().await;
        tokio::time::advance(Duration::from_secs(1)).await;
        let (second, _) = store.create().await;
        tokio::time::advance(Duration::from_secs(1)).await;
        store.get(&first).await;

        let (third, _) = store.create().await;
        assert_eq!(store.len().await, 2);
        assert!(store.get(&second).await.is_none());
        assert!(store.get(&first).await.is_some());
        assert!(store.get(&third).await.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_busy_sessions_are_kept() {
        let store = SessionStore::new(Duration::from_secs(10), 1);
        let (busy, handle) = store.create().await;
        let _turn = handle.lock().await;

        tokio::time::advance(Duration::from_secs(60)).await;
        let (_other, _) = store.create().await;
        assert!(store.get(&busy).await.is_some());
        assert_eq!(store.len().await, 2);
    }
}
