use async_trait::async_trait;
use chrono::{Duration, Utc};
use mongodb::bson::doc;
use mongodb::{Client, Collection};

use crate::checkpoint::{Checkpoint, CheckpointStore};
use crate::error::{PersistError, Result};
use crate::session::{SessionRecord, SessionStore};

const CHECKPOINT_COLLECTION: &str = "checkpoints";
const SESSION_COLLECTION: &str = "sessions";

/// MongoDB-backed checkpoint store. Checkpoints are append-only documents
/// keyed by `(thread_id, seq)`.
#[derive(Clone)]
pub struct MongoCheckpointStore {
    collection: Collection<Checkpoint>,
}

impl MongoCheckpointStore {
    pub async fn connect(mongodb_uri: &str, database: &str) -> Result<Self> {
        let client = Client::with_uri_str(mongodb_uri)
            .await
            .map_err(|e| PersistError::Connection(e.to_string()))?;
        Ok(Self::new(&client, database))
    }

    pub fn new(client: &Client, database: &str) -> Self {
        let collection = client.database(database).collection(CHECKPOINT_COLLECTION);
        Self { collection }
    }
}

#[async_trait]
impl CheckpointStore for MongoCheckpointStore {
    async fn save(&self, checkpoint: Checkpoint) -> Result<()> {
        self.collection.insert_one(&checkpoint).await?;
        Ok(())
    }

    async fn latest(&self, thread_id: &str) -> Result<Option<Checkpoint>> {
        let found = self
            .collection
            .find_one(doc! { "thread_id": thread_id })
            .sort(doc! { "seq": -1 })
            .await?;
        Ok(found)
    }

    async fn clear_thread(&self, thread_id: &str) -> Result<u64> {
        let result = self
            .collection
            .delete_many(doc! { "thread_id": thread_id })
            .await?;
        Ok(result.deleted_count)
    }
}

/// MongoDB-backed session store. Expiry is enforced lazily on read, matching
/// the in-memory implementation.
#[derive(Clone)]
pub struct MongoSessionStore {
    collection: Collection<SessionRecord>,
}

impl MongoSessionStore {
    pub async fn connect(mongodb_uri: &str, database: &str) -> Result<Self> {
        let client = Client::with_uri_str(mongodb_uri)
            .await
            .map_err(|e| PersistError::Connection(e.to_string()))?;
        Ok(Self::new(&client, database))
    }

    pub fn new(client: &Client, database: &str) -> Self {
        let collection = client.database(database).collection(SESSION_COLLECTION);
        Self { collection }
    }
}

#[async_trait]
impl SessionStore for MongoSessionStore {
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
        self.collection
            .replace_one(doc! { "session_id": session_id }, &record)
            .upsert(true)
            .await?;
        Ok(record)
    }

    async fn get(&self, session_id: &str) -> Result<Option<SessionRecord>> {
        let found = self
            .collection
            .find_one(doc! { "session_id": session_id })
            .await?;
        match found {
            Some(record) if record.is_expired(Utc::now()) => {
                self.collection
                    .delete_one(doc! { "session_id": session_id })
                    .await?;
                tracing::debug!(session_id, "removed expired session on read");
                Ok(None)
            }
            other => Ok(other),
        }
    }

    async fn refresh(&self, session_id: &str, ttl: Option<Duration>) -> Result<bool> {
        let Some(record) = self.get(session_id).await? else {
            return Ok(false);
        };
        let now = Utc::now();
        let mut refreshed = record;
        refreshed.expires_at = ttl.map(|d| now + d);
        self.collection
            .replace_one(doc! { "session_id": session_id }, &refreshed)
            .await?;
        Ok(true)
    }

    async fn delete(&self, session_id: &str) -> Result<bool> {
        let result = self
            .collection
            .delete_one(doc! { "session_id": session_id })
            .await?;
        Ok(result.deleted_count > 0)
    }
}
