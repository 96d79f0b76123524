use serde::{Deserialize, Serialize};

/// Position in the conversation state machine.
///
/// Persisted inside every checkpoint so a thread can be resumed at exactly
/// the node that was about to execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// Generate a direct answer or decide to call tools.
    Decide,
    /// Human approval gate in front of sensitive tool calls.
    HumanGate,
    /// Execute the pending tool calls.
    ToolExec,
    /// Human review of retrieved documents.
    DocReview,
    /// Binary relevance judgment over retrieved content.
    Grade,
    /// Paraphrase the question and try again.
    Rewrite,
    /// Synthesize the final answer from tool content.
    Answer,
    /// Terminal.
    End,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Decide => "decide",
            Self::HumanGate => "human_gate",
            Self::ToolExec => "tool_exec",
            Self::DocReview => "doc_review",
            Self::Grade => "grade",
            Self::Rewrite => "rewrite",
            Self::Answer => "answer",
            Self::End => "end",
        }
    }

    /// Gate nodes suspend execution and wait for a resume decision.
    pub fn is_gate(&self) -> bool {
        matches!(self, Self::HumanGate | Self::DocReview)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_snake_case() {
        let json = serde_json::to_string(&NodeKind::HumanGate).unwrap();
        assert_eq!(json, "\"human_gate\"");
        let back: NodeKind = serde_json::from_str("\"doc_review\"").unwrap();
        assert_eq!(back, NodeKind::DocReview);
    }

    #[test]
    fn only_gates_report_gate() {
        assert!(NodeKind::HumanGate.is_gate());
        assert!(NodeKind::DocReview.is_gate());
        assert!(!NodeKind::Decide.is_gate());
        assert!(!NodeKind::End.is_gate());
    }
}
