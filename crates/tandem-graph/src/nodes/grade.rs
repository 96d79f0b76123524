use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tandem_llm::{ChatClient, ChatOptions, ChatRequest, Message};
use tandem_types::{GraphConfig, NodeKind};

use crate::history::{latest_tool_content, latest_user_question, recent_tool_responses};
use crate::node::{EventSender, Node, Transition};
use crate::prompts;
use crate::state::TurnState;

/// Binary relevance judgment over the retrieved content.
///
/// Bounded: two or more tool responses in the recent window mean a rewrite
/// already happened for this question, so the judgment is skipped and the
/// machine proceeds to answer regardless.
pub struct GradeNode {
    llm: Arc<dyn ChatClient>,
    config: GraphConfig,
}

impl GradeNode {
    pub fn new(llm: Arc<dyn ChatClient>, config: GraphConfig) -> Self {
        Self { llm, config }
    }
}

#[async_trait]
impl Node for GradeNode {
    fn kind(&self) -> NodeKind {
        NodeKind::Grade
    }

    async fn run(&self, state: &mut TurnState, _event_tx: EventSender) -> Result<Transition> {
        if recent_tool_responses(&state.messages) >= 2 {
            tracing::debug!(thread_id = %state.thread_id, "rewrite already used, forcing answer");
            return Ok(Transition::To(NodeKind::Answer));
        }

        let question = latest_user_question(&state.messages, true).unwrap_or_default();
        let context = latest_tool_content(&state.messages)
            .or_else(|| state.messages.last().map(Message::content_text))
            .unwrap_or_default();

        let prompt = prompts::grade(&question, &context);
        let request = ChatRequest::new(
            self.config.model.clone(),
            vec![Message::human(prompt)],
        )
        .with_options(ChatOptions::new().temperature(0.0));

        // Grading is advisory; a failed or unparseable judgment falls back
        // to answering with what we have.
        let verdict = match self.llm.chat(request).await {
            Ok(response) => response.content.unwrap_or_default(),
            Err(e) => {
                tracing::warn!(thread_id = %state.thread_id, error = %e, "grading call failed");
                String::new()
            }
        };

        if verdict.trim().to_lowercase().starts_with("no") {
            Ok(Transition::To(NodeKind::Rewrite))
        } else {
            Ok(Transition::To(NodeKind::Answer))
        }
    }
}
