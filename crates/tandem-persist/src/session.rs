use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::Result;

/// Maps an opaque session id to the actor identity tools act on behalf of.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub session_id: String,
    pub actor_id: i64,
    pub actor_name: String,
    pub created_at: DateTime<Utc>,
    /// Absent means the session never expires.
    pub expires_at: Option<DateTime<Utc>>,
}

impl SessionRecord {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        matches!(self.expires_at, Some(at) if at <= now)
    }
}

/// Session context storage with lazy expiry.
///
/// An expired record is logically gone: `get` treats it as absent and removes
/// it, and `refresh` never resurrects one.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Upsert. Reinitializing an existing session id updates it in place.
    async fn create_or_update(
        &self,
        session_id: &str,
        actor_id: i64,
        actor_name: &str,
        ttl: Option<Duration>,
    ) -> Result<SessionRecord>;

    async fn get(&self, session_id: &str) -> Result<Option<SessionRecord>>;

    /// Extends the expiry of a live session. Returns false for missing or
    /// already expired sessions.
    async fn refresh(&self, session_id: &str, ttl: Option<Duration>) -> Result<bool>;

    async fn delete(&self, session_id: &str) -> Result<bool>;
}

#[derive(Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<String, SessionRecord>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw record count, including not-yet-collected expired records. Test hook.
    pub async fn raw_len(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn create_or_update(
        &self,
        session_id: &str,
        actor_id: i64,
        actor_name: &str,
        ttl: Option<Duration>,
    ) -> Result<SessionRecord> {
        let now = Utc::now();
        let record = SessionRecord {
            session_id: session_id.to_string(),
            actor_id,
            actor_name: actor_name.to_string(),
            created_at: now,
            expires_at: ttl.map(|d| now + d),
        };
        self.sessions
            .write()
            .await
            .insert(session_id.to_string(), record.clone());
        Ok(record)
    }

    async fn get(&self, session_id: &str) -> Result<Option<SessionRecord>> {
        let now = Utc::now();
        {
            let sessions = self.sessions.read().await;
            match sessions.get(session_id) {
                None => return Ok(None),
                Some(record) if !record.is_expired(now) => return Ok(Some(record.clone())),
                Some(_) => {}
            }
        }
        // Expired: remove it so later existence checks also miss.
        let mut sessions = self.sessions.write().await;
        if let Some(record) = sessions.get(session_id) {
            if record.is_expired(now) {
                sessions.remove(session_id);
                tracing::debug!(session_id, "removed expired session on read");
            }
        }
        Ok(None)
    }

    async fn refresh(&self, session_id: &str, ttl: Option<Duration>) -> Result<bool> {
        let now = Utc::now();
        let mut sessions = self.sessions.write().await;
        match sessions.get_mut(session_id) {
            Some(record) if !record.is_expired(now) => {
                record.expires_at = ttl.map(|d| now + d);
                Ok(true)
            }
            Some(_) => {
                sessions.remove(session_id);
                Ok(false)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, session_id: &str) -> Result<bool> {
        Ok(self.sessions.write().await.remove(session_id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn upsert_keeps_a_single_record_per_id() {
        let store = MemorySessionStore::new();
        store.create_or_update("s1", 42, "Eve", None).await.unwrap();
        store.create_or_update("s1", 43, "Eva", None).await.unwrap();

        assert_eq!(store.raw_len().await, 1);
        let record = store.get("s1").await.unwrap().unwrap();
        assert_eq!(record.actor_id, 43);
        assert_eq!(record.actor_name, "Eva");
    }

    #[tokio::test]
    async fn expired_session_is_absent_and_collected_on_read() {
        let store = MemorySessionStore::new();
        store
            .create_or_update("s1", 42, "Eve", Some(Duration::seconds(-1)))
            .await
            .unwrap();

        assert!(store.get("s1").await.unwrap().is_none());
        // The read also removed the record from storage.
        assert_eq!(store.raw_len().await, 0);
        assert!(store.get("s1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn refresh_extends_live_sessions_only() {
        let store = MemorySessionStore::new();
        store
            .create_or_update("live", 1, "A", Some(Duration::hours(1)))
            .await
            .unwrap();
        store
            .create_or_update("dead", 2, "B", Some(Duration::seconds(-1)))
            .await
            .unwrap();

        assert!(store.refresh("live", Some(Duration::hours(2))).await.unwrap());
        assert!(!store.refresh("dead", Some(Duration::hours(2))).await.unwrap());
        assert!(!store.refresh("missing", None).await.unwrap());
        // Refresh must not resurrect the expired session.
        assert!(store.get("dead").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn sessions_without_ttl_never_expire() {
        let store = MemorySessionStore::new();
        store.create_or_update("s1", 42, "Eve", None).await.unwrap();
        let record = store.get("s1").await.unwrap().unwrap();
        assert!(record.expires_at.is_none());
        assert!(!record.is_expired(Utc::now() + Duration::days(365)));
    }

    #[tokio::test]
    async fn delete_reports_presence() {
        let store = MemorySessionStore::new();
        store.create_or_update("s1", 42, "Eve", None).await.unwrap();
        assert!(store.delete("s1").await.unwrap());
        assert!(!store.delete("s1").await.unwrap());
    }
}
