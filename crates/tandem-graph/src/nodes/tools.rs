use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use tandem_llm::Message;
use tandem_tools::ToolRegistry;
use tandem_types::{ActorContext, GraphConfig, NodeKind};

use crate::history::{latest_tool_content, latest_tool_name};
use crate::node::{EventSender, Node, Transition};
use crate::state::TurnState;

/// Retrieved content shorter than this skips human document review.
const REVIEW_MIN_CONTEXT_LEN: usize = 50;

/// Executes the tool calls declared by the last assistant message. Failures
/// become textual results the model sees on the next step; a failing tool
/// never aborts the turn.
pub struct ToolExecNode {
    registry: Arc<ToolRegistry>,
    config: GraphConfig,
    actor: Option<ActorContext>,
}

impl ToolExecNode {
    pub fn new(
        registry: Arc<ToolRegistry>,
        config: GraphConfig,
        actor: Option<ActorContext>,
    ) -> Self {
        Self {
            registry,
            config,
            actor,
        }
    }
}

#[async_trait]
impl Node for ToolExecNode {
    fn kind(&self) -> NodeKind {
        NodeKind::ToolExec
    }

    async fn run(&self, state: &mut TurnState, _event_tx: EventSender) -> Result<Transition> {
        let pending: Vec<_> = state
            .messages
            .iter()
            .rev()
            .find_map(|m| m.tool_calls())
            .map(|calls| calls.to_vec())
            .unwrap_or_default();

        if pending.is_empty() {
            return Ok(Transition::To(NodeKind::Answer));
        }

        for call in pending {
            let args = call.arguments_value().unwrap_or(Value::Null);
            tracing::info!(
                thread_id = %state.thread_id,
                tool = %call.function.name,
                "executing tool call"
            );
            let result = self
                .registry
                .invoke(&call.function.name, args, self.actor.as_ref())
                .await;
            state.push_message(Message::tool_result(call.id, call.function.name, result));
        }

        // Retrieval feeds grading (or review); action tools go straight to
        // answer synthesis.
        if latest_tool_name(&state.messages).as_deref() == Some(self.config.retrieval_tool.as_str())
        {
            let context_len = latest_tool_content(&state.messages)
                .map(|c| c.trim().len())
                .unwrap_or(0);
            if self.config.gates.document_review_enabled && context_len >= REVIEW_MIN_CONTEXT_LEN {
                return Ok(Transition::To(NodeKind::DocReview));
            }
            return Ok(Transition::To(NodeKind::Grade));
        }
        Ok(Transition::To(NodeKind::Answer))
    }
}
