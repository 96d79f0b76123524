use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tandem_llm::{ChatClient, ChatOptions, ChatRequest, Message};
use tandem_types::{GraphConfig, NodeKind};

use crate::history::latest_user_question;
use crate::node::{EventSender, Node, Transition};
use crate::prompts;
use crate::state::TurnState;

/// Paraphrases the current question into a new user message and loops back
/// to the decision node.
pub struct RewriteNode {
    llm: Arc<dyn ChatClient>,
    config: GraphConfig,
}

impl RewriteNode {
    pub fn new(llm: Arc<dyn ChatClient>, config: GraphConfig) -> Self {
        Self { llm, config }
    }
}

#[async_trait]
impl Node for RewriteNode {
    fn kind(&self) -> NodeKind {
        NodeKind::Rewrite
    }

    async fn run(&self, state: &mut TurnState, _event_tx: EventSender) -> Result<Transition> {
        let question = latest_user_question(&state.messages, false).unwrap_or_default();
        let prompt = prompts::rewrite(&question);

        let request = ChatRequest::new(
            self.config.model.clone(),
            vec![Message::human(prompt)],
        )
        .with_options(ChatOptions::new().temperature(0.0));

        let response = self
            .llm
            .chat(request)
            .await
            .context("question rewrite failed")?;
        let rewritten = response.content.unwrap_or(question);
        tracing::debug!(thread_id = %state.thread_id, rewritten = %rewritten, "question rewritten");

        state.push_message(Message::human(rewritten));
        Ok(Transition::To(NodeKind::Decide))
    }
}
