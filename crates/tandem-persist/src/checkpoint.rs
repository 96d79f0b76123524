use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tandem_llm::Message;
use tandem_types::{Interrupt, NodeKind};
use tokio::sync::RwLock;

use crate::error::Result;

/// Snapshot of a thread's full state at one point in execution.
///
/// The latest checkpoint for a thread is always sufficient to resume: it
/// carries the complete message sequence, the node pointer and any pending
/// interrupt, never references to in-memory state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub thread_id: String,
    pub seq: u64,
    pub node: NodeKind,
    pub messages: Vec<Message>,
    pub pending_interrupt: Option<Interrupt>,
    pub created_at: DateTime<Utc>,
}

impl Checkpoint {
    pub fn new(
        thread_id: impl Into<String>,
        seq: u64,
        node: NodeKind,
        messages: Vec<Message>,
        pending_interrupt: Option<Interrupt>,
    ) -> Self {
        Self {
            thread_id: thread_id.into(),
            seq,
            node,
            messages,
            pending_interrupt,
            created_at: Utc::now(),
        }
    }
}

/// Durable storage for checkpoints, keyed by thread id.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Appends a checkpoint. Awaited by the state machine before it acts on
    /// the transition the checkpoint records.
    async fn save(&self, checkpoint: Checkpoint) -> Result<()>;

    /// Most recent checkpoint for the thread, if any.
    async fn latest(&self, thread_id: &str) -> Result<Option<Checkpoint>>;

    /// Deletes every checkpoint for the thread. Returns how many were
    /// removed; a thread with no checkpoints is not an error.
    async fn clear_thread(&self, thread_id: &str) -> Result<u64>;
}

/// In-memory checkpoint store. Suitable for tests and single-process runs.
#[derive(Default)]
pub struct MemoryCheckpointStore {
    threads: RwLock<HashMap<String, Vec<Checkpoint>>>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of checkpoints recorded for a thread. Test hook.
    pub async fn count(&self, thread_id: &str) -> usize {
        self.threads
            .read()
            .await
            .get(thread_id)
            .map(Vec::len)
            .unwrap_or(0)
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn save(&self, checkpoint: Checkpoint) -> Result<()> {
        let mut threads = self.threads.write().await;
        threads
            .entry(checkpoint.thread_id.clone())
            .or_default()
            .push(checkpoint);
        Ok(())
    }

    async fn latest(&self, thread_id: &str) -> Result<Option<Checkpoint>> {
        let threads = self.threads.read().await;
        Ok(threads.get(thread_id).and_then(|v| v.last().cloned()))
    }

    async fn clear_thread(&self, thread_id: &str) -> Result<u64> {
        let mut threads = self.threads.write().await;
        Ok(threads.remove(thread_id).map(|v| v.len() as u64).unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checkpoint(thread_id: &str, seq: u64) -> Checkpoint {
        Checkpoint::new(
            thread_id,
            seq,
            NodeKind::Decide,
            vec![Message::human(format!("msg {seq}"))],
            None,
        )
    }

    #[tokio::test]
    async fn latest_returns_most_recent() {
        let store = MemoryCheckpointStore::new();
        store.save(checkpoint("t1", 0)).await.unwrap();
        store.save(checkpoint("t1", 1)).await.unwrap();
        store.save(checkpoint("t2", 0)).await.unwrap();

        let latest = store.latest("t1").await.unwrap().unwrap();
        assert_eq!(latest.seq, 1);
        assert!(store.latest("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn clear_thread_removes_all_and_only_that_thread() {
        let store = MemoryCheckpointStore::new();
        store.save(checkpoint("t1", 0)).await.unwrap();
        store.save(checkpoint("t1", 1)).await.unwrap();
        store.save(checkpoint("t2", 0)).await.unwrap();

        assert_eq!(store.clear_thread("t1").await.unwrap(), 2);
        assert!(store.latest("t1").await.unwrap().is_none());
        assert!(store.latest("t2").await.unwrap().is_some());
        // Clearing a thread with no data is a no-op.
        assert_eq!(store.clear_thread("t1").await.unwrap(), 0);
    }

    #[test]
    fn checkpoint_round_trips_through_json() {
        let cp = Checkpoint::new(
            "t1",
            3,
            NodeKind::HumanGate,
            vec![Message::human("hi")],
            Some(Interrupt::tool_approval(vec![])),
        );
        let json = serde_json::to_string(&cp).unwrap();
        let back: Checkpoint = serde_json::from_str(&json).unwrap();
        assert_eq!(back.seq, 3);
        assert_eq!(back.node, NodeKind::HumanGate);
        assert!(back.pending_interrupt.is_some());
    }
}
