use serde::{Deserialize, Serialize};
use serde_json::Value;

/// What a gate node is asking the human for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterruptKind {
    ToolApproval,
    DocumentReview,
}

/// A tool call awaiting human approval.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingAction {
    pub tool: String,
    pub args: Value,
}

/// Payload emitted when the state machine suspends at a human gate.
///
/// Serialized as the `interrupt_data` of an `interrupt` stream event, and
/// persisted with the checkpoint so resumption can validate the decision
/// against the gate that asked for it. Consumed exactly once by resume.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Interrupt {
    #[serde(rename = "action")]
    pub kind: InterruptKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending_actions: Option<Vec<PendingAction>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub documents: Option<String>,
    pub options: Vec<String>,
}

impl Interrupt {
    pub fn tool_approval(pending_actions: Vec<PendingAction>) -> Self {
        Self {
            kind: InterruptKind::ToolApproval,
            message: "The agent wants to perform the following actions. Do you approve?"
                .to_string(),
            pending_actions: Some(pending_actions),
            documents: None,
            options: vec!["approve".to_string(), "reject".to_string()],
        }
    }

    pub fn document_review(documents: String) -> Self {
        Self {
            kind: InterruptKind::DocumentReview,
            message: "Review retrieved documents before generating answer:".to_string(),
            pending_actions: None,
            documents: Some(documents),
            options: vec![
                "use_all".to_string(),
                "add_context".to_string(),
                "reject_all".to_string(),
            ],
        }
    }
}

/// The human's answer to an interrupt, supplied through the resume entry
/// point. `action` should be one of the options the gate offered; gate nodes
/// decide how to treat anything else. Approval payloads may carry
/// `{"approved": true}` instead of an action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResumeDecision {
    #[serde(default)]
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_context: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remarks: Option<String>,
}

impl ResumeDecision {
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            approved: None,
            additional_context: None,
            remarks: None,
        }
    }

    pub fn with_additional_context(mut self, text: impl Into<String>) -> Self {
        self.additional_context = Some(text.into());
        self
    }

    /// True when the decision approves the pending actions, either through
    /// the `approve` action or the `approved` boolean shorthand.
    pub fn approves(&self) -> bool {
        self.approved.unwrap_or(false) || self.action == "approve"
    }
}
