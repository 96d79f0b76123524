use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use tandem_tools::{ToolHandler, ToolSpec};
use tandem_types::ActorContext;

use crate::store::{Retriever, DEFAULT_TOP_K};

pub const RETRIEVER_TOOL_NAME: &str = "retrieve_documents";

const CHUNK_SEPARATOR: &str = "\n\n---\n\n";

/// Exposes the retriever to the model as a regular tool. The result is the
/// matched chunks joined into one text block, or an empty string when nothing
/// matched, which downstream nodes treat as "no usable context".
pub struct RetrieverTool {
    retriever: Arc<dyn Retriever>,
    k: usize,
}

impl RetrieverTool {
    pub fn new(retriever: Arc<dyn Retriever>) -> Self {
        Self {
            retriever,
            k: DEFAULT_TOP_K,
        }
    }

    pub fn with_top_k(mut self, k: usize) -> Self {
        self.k = k;
        self
    }
}

#[async_trait]
impl ToolHandler for RetrieverTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec::new(
            RETRIEVER_TOOL_NAME,
            "Search and return information from ingested documents.",
            json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "Search query to run against the user's documents"
                    }
                },
                "required": ["query"]
            }),
        )
    }

    async fn call(&self, args: Value, actor: Option<&ActorContext>) -> Result<String> {
        let query = args
            .get("query")
            .and_then(Value::as_str)
            .context("query is required")?;

        let Some(actor) = actor else {
            tracing::warn!("retrieval called without actor context, returning no documents");
            return Ok(String::new());
        };

        let results = self.retriever.retrieve(query, actor.actor_id, self.k).await?;
        tracing::debug!(
            actor_id = actor.actor_id,
            query,
            hits = results.len(),
            "retrieval complete"
        );

        let texts: Vec<&str> = results.iter().map(|r| r.chunk.text.as_str()).collect();
        Ok(texts.join(CHUNK_SEPARATOR))
    }
}
