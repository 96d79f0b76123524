use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use tandem_llm::Message;
use tandem_types::{GraphConfig, Interrupt, NodeKind, PendingAction, ResumeDecision};

use crate::history::latest_tool_content;
use crate::node::{EventSender, Node, Transition};
use crate::prompts;
use crate::state::TurnState;

/// Characters of retrieved content shown in a review interrupt.
const REVIEW_PREVIEW_CHARS: usize = 2000;

const ADDED_CONTEXT_HEADER: &str = "\n\n--- User-provided context ---\n";

/// Gate in front of tool execution. Suspends only when the pending calls
/// include a sensitive tool under an approval-enabled policy; everything
/// else passes straight through.
pub struct HumanGateNode {
    config: GraphConfig,
}

impl HumanGateNode {
    pub fn new(config: GraphConfig) -> Self {
        Self { config }
    }

    /// Applies a human decision to a thread suspended at this gate.
    pub fn resolve(state: &mut TurnState, decision: &ResumeDecision) -> NodeKind {
        if decision.approves() {
            return NodeKind::ToolExec;
        }
        // Anything else is a rejection: steer the model toward
        // alternatives instead of executing.
        state.push_message(Message::human(prompts::REJECTION_MESSAGE));
        NodeKind::Decide
    }
}

#[async_trait]
impl Node for HumanGateNode {
    fn kind(&self) -> NodeKind {
        NodeKind::HumanGate
    }

    async fn run(&self, state: &mut TurnState, _event_tx: EventSender) -> Result<Transition> {
        let Some(calls) = state.messages.iter().rev().find_map(|m| m.tool_calls()) else {
            return Ok(Transition::To(NodeKind::ToolExec));
        };

        let pending: Vec<PendingAction> = calls
            .iter()
            .filter(|c| self.config.gates.is_sensitive(&c.function.name))
            .map(|c| PendingAction {
                tool: c.function.name.clone(),
                args: c.arguments_value().unwrap_or(Value::Null),
            })
            .collect();

        if pending.is_empty() {
            return Ok(Transition::To(NodeKind::ToolExec));
        }

        tracing::info!(
            thread_id = %state.thread_id,
            count = pending.len(),
            "suspending for tool approval"
        );
        Ok(Transition::Suspend(Interrupt::tool_approval(pending)))
    }
}

/// Gate between retrieval and answering. Shows the retrieved content and
/// waits for the human to accept it, enrich it, or reject it.
pub struct DocReviewNode;

impl DocReviewNode {
    /// Applies a human decision to a thread suspended at this gate.
    pub fn resolve(state: &mut TurnState, decision: &ResumeDecision, retrieval_tool: &str) -> NodeKind {
        match decision.action.as_str() {
            "reject_all" => {
                state.push_message(Message::human(prompts::DOCUMENTS_REJECTED_MESSAGE));
                NodeKind::Rewrite
            }
            "add_context" => {
                if let Some(extra) = decision
                    .additional_context
                    .as_deref()
                    .filter(|s| !s.trim().is_empty())
                {
                    append_to_retrieval_result(state, retrieval_tool, extra);
                }
                NodeKind::Answer
            }
            // use_all, or anything unrecognized.
            _ => NodeKind::Answer,
        }
    }
}

fn append_to_retrieval_result(state: &mut TurnState, retrieval_tool: &str, extra: &str) {
    for msg in state.messages.iter_mut().rev() {
        if let Message::Tool { name, content, .. } = msg {
            if name.as_deref() == Some(retrieval_tool) {
                let enhanced = format!("{}{}{}", content.to_text(), ADDED_CONTEXT_HEADER, extra);
                *content = enhanced.into();
                return;
            }
        }
    }
}

#[async_trait]
impl Node for DocReviewNode {
    fn kind(&self) -> NodeKind {
        NodeKind::DocReview
    }

    async fn run(&self, state: &mut TurnState, _event_tx: EventSender) -> Result<Transition> {
        let context = latest_tool_content(&state.messages).unwrap_or_default();
        let preview: String = context.chars().take(REVIEW_PREVIEW_CHARS).collect();
        tracing::info!(thread_id = %state.thread_id, "suspending for document review");
        Ok(Transition::Suspend(Interrupt::document_review(preview)))
    }
}
