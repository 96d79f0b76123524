use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tandem_llm::{ChatClient, ChatOptions, ChatRequest, Message, ToolChoice};
use tandem_tools::ToolRegistry;
use tandem_types::{GraphConfig, NodeKind};

use crate::history::{latest_user_question, repair_sequence};
use crate::node::{EventSender, Node, Transition};
use crate::nodes::stream_model;
use crate::prompts;
use crate::state::TurnState;

/// Entry node of every question cycle: the model either answers directly or
/// requests tool calls.
pub struct DecideNode {
    llm: Arc<dyn ChatClient>,
    registry: Arc<ToolRegistry>,
    config: GraphConfig,
}

impl DecideNode {
    pub fn new(llm: Arc<dyn ChatClient>, registry: Arc<ToolRegistry>, config: GraphConfig) -> Self {
        Self {
            llm,
            registry,
            config,
        }
    }
}

#[async_trait]
impl Node for DecideNode {
    fn kind(&self) -> NodeKind {
        NodeKind::Decide
    }

    async fn run(&self, state: &mut TurnState, event_tx: EventSender) -> Result<Transition> {
        // A checkpoint truncated mid-tool-cycle must not reach the model.
        let cleaned = repair_sequence(&state.messages);
        let question = latest_user_question(&cleaned, false).unwrap_or_default();

        let mut messages = Vec::with_capacity(cleaned.len() + 1);
        messages.push(Message::system(prompts::decide_system(&question)));
        messages.extend(cleaned);

        let tools = self.registry.llm_tools().await;
        let mut options = ChatOptions::new();
        if !tools.is_empty() {
            options = options.tools(tools).tool_choice(ToolChoice::auto());
        }
        if let Some(temp) = self.config.temperature {
            options = options.temperature(temp);
        }

        let request = ChatRequest::new(self.config.model.clone(), messages).with_options(options);
        let (content, tool_calls) =
            stream_model(self.llm.as_ref(), request, &state.thread_id, &event_tx).await?;

        if tool_calls.is_empty() {
            tracing::debug!(thread_id = %state.thread_id, "model answered directly");
            state.final_answer.push_str(&content);
            state.push_message(Message::ai(content));
            return Ok(Transition::Finish);
        }

        tracing::debug!(
            thread_id = %state.thread_id,
            count = tool_calls.len(),
            "model requested tool calls"
        );
        state.push_message(if content.is_empty() {
            Message::ai_with_tools(tool_calls)
        } else {
            Message::AI {
                content: Some(content.into()),
                tool_calls: Some(tool_calls),
                name: None,
            }
        });
        // The gate decides whether execution needs human approval first.
        Ok(Transition::To(NodeKind::HumanGate))
    }
}
