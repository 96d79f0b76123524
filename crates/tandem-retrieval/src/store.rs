use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::embedder::Embedder;

pub const DEFAULT_TOP_K: usize = 5;

/// A piece of an ingested document, owned by exactly one actor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    pub owner_id: i64,
    pub text: String,
    pub source: Option<String>,
    #[serde(skip)]
    pub embedding: Vec<f32>,
}

/// A chunk with its similarity to the query, higher is closer.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
}

/// Top-K similarity search over an actor's documents.
///
/// Implementations must restrict candidates to chunks owned by `actor_scope`
/// before ranking. A chunk owned by another actor must never be returned,
/// whatever the similarity.
#[async_trait]
pub trait Retriever: Send + Sync {
    async fn retrieve(&self, query: &str, actor_scope: i64, k: usize) -> Result<Vec<ScoredChunk>>;
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// In-memory vector store backed by brute-force cosine search.
pub struct MemoryVectorStore {
    embedder: Arc<dyn Embedder>,
    chunks: RwLock<Vec<Chunk>>,
}

impl MemoryVectorStore {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            embedder,
            chunks: RwLock::new(Vec::new()),
        }
    }

    /// Embeds and stores document texts for one owner. Returns the chunk ids.
    pub async fn ingest(
        &self,
        owner_id: i64,
        texts: Vec<String>,
        source: Option<String>,
    ) -> Result<Vec<String>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let embeddings = self.embedder.embed(&texts).await?;
        let mut store = self.chunks.write().await;
        let mut ids = Vec::with_capacity(texts.len());
        for (text, embedding) in texts.into_iter().zip(embeddings) {
            let id = Uuid::new_v4().to_string();
            ids.push(id.clone());
            store.push(Chunk {
                id,
                owner_id,
                text,
                source: source.clone(),
                embedding,
            });
        }
        tracing::debug!(owner_id, count = ids.len(), "ingested document chunks");
        Ok(ids)
    }

    /// Inserts pre-embedded chunks. Used by tests and bulk loaders.
    pub async fn insert_chunks(&self, chunks: Vec<Chunk>) {
        self.chunks.write().await.extend(chunks);
    }

    /// Removes every chunk owned by the given actor.
    pub async fn clear_owner(&self, owner_id: i64) -> usize {
        let mut store = self.chunks.write().await;
        let before = store.len();
        store.retain(|c| c.owner_id != owner_id);
        before - store.len()
    }
}

#[async_trait]
impl Retriever for MemoryVectorStore {
    async fn retrieve(&self, query: &str, actor_scope: i64, k: usize) -> Result<Vec<ScoredChunk>> {
        let query_embedding = self.embedder.embed_one(query).await?;
        let store = self.chunks.read().await;

        // Scope filter applies before any ranking.
        let mut scored: Vec<ScoredChunk> = store
            .iter()
            .filter(|c| c.owner_id == actor_scope)
            .map(|c| ScoredChunk {
                score: cosine_similarity(&query_embedding, &c.embedding),
                chunk: c.clone(),
            })
            .collect();

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        Ok(scored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct HashEmbedder;

    #[async_trait]
    impl Embedder for HashEmbedder {
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            // Deterministic toy embedding: letter frequency histogram.
            Ok(texts
                .iter()
                .map(|t| {
                    let mut v = vec![0.0f32; 26];
                    for c in t.to_lowercase().chars() {
                        if c.is_ascii_lowercase() {
                            v[(c as u8 - b'a') as usize] += 1.0;
                        }
                    }
                    v
                })
                .collect())
        }
    }

    fn store() -> MemoryVectorStore {
        MemoryVectorStore::new(Arc::new(HashEmbedder))
    }

    #[test]
    fn cosine_of_identical_vectors_is_one() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
        assert_eq!(cosine_similarity(&v, &[0.0, 0.0, 0.0]), 0.0);
    }

    #[tokio::test]
    async fn retrieval_never_crosses_actor_scopes() {
        let store = store();
        store
            .ingest(1, vec!["alpha vacation policy".into()], None)
            .await
            .unwrap();
        store
            .ingest(2, vec!["alpha vacation policy".into()], None)
            .await
            .unwrap();

        for _ in 0..3 {
            let results = store.retrieve("alpha vacation policy", 1, 5).await.unwrap();
            assert!(!results.is_empty());
            assert!(results.iter().all(|r| r.chunk.owner_id == 1));
        }

        let results = store.retrieve("alpha vacation policy", 3, 5).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn top_k_is_ordered_and_bounded() {
        let store = store();
        store
            .ingest(
                7,
                vec![
                    "annual leave entitlement".into(),
                    "office parking rules".into(),
                    "leave carryover and annual leave".into(),
                ],
                None,
            )
            .await
            .unwrap();

        let results = store.retrieve("annual leave", 7, 2).await.unwrap();
        assert_eq!(results.len(), 2);
        assert!(results[0].score >= results[1].score);
    }

    #[tokio::test]
    async fn clear_owner_removes_only_that_owner() {
        let store = store();
        store.ingest(1, vec!["a".into()], None).await.unwrap();
        store.ingest(2, vec!["b".into()], None).await.unwrap();
        assert_eq!(store.clear_owner(1).await, 1);
        assert!(store.retrieve("a", 1, 5).await.unwrap().is_empty());
        assert_eq!(store.retrieve("b", 2, 5).await.unwrap().len(), 1);
    }
}
