use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tandem_llm::{ChatClient, ChatOptions, ChatRequest, Message};
use tandem_types::{GraphConfig, NodeKind};

use crate::history::{latest_tool_content, latest_user_question};
use crate::node::{EventSender, Node, Transition};
use crate::nodes::stream_model;
use crate::prompts;
use crate::state::TurnState;

/// Synthesizes the final answer from tool or retrieval content. With no
/// usable content, a fixed fallback is emitted without a model call.
pub struct AnswerNode {
    llm: Arc<dyn ChatClient>,
    config: GraphConfig,
}

impl AnswerNode {
    pub fn new(llm: Arc<dyn ChatClient>, config: GraphConfig) -> Self {
        Self { llm, config }
    }
}

#[async_trait]
impl Node for AnswerNode {
    fn kind(&self) -> NodeKind {
        NodeKind::Answer
    }

    async fn run(&self, state: &mut TurnState, event_tx: EventSender) -> Result<Transition> {
        let question = latest_user_question(&state.messages, true).unwrap_or_default();
        let context = latest_tool_content(&state.messages)
            .or_else(|| state.messages.last().map(Message::content_text))
            .unwrap_or_default();

        if context.trim().is_empty() {
            tracing::debug!(thread_id = %state.thread_id, "no usable context, emitting fallback");
            state.final_answer.push_str(prompts::NO_CONTEXT_FALLBACK);
            state.push_message(Message::ai(prompts::NO_CONTEXT_FALLBACK));
            return Ok(Transition::Finish);
        }

        let prompt = prompts::answer(&question, &context);
        let mut options = ChatOptions::new();
        if let Some(temp) = self.config.temperature {
            options = options.temperature(temp);
        }
        let request = ChatRequest::new(self.config.model.clone(), vec![Message::human(prompt)])
            .with_options(options);

        let (content, _) =
            stream_model(self.llm.as_ref(), request, &state.thread_id, &event_tx).await?;
        state.final_answer.push_str(&content);
        state.push_message(Message::ai(content));
        Ok(Transition::Finish)
    }
}
