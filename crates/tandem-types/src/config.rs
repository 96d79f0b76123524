use serde::{Deserialize, Serialize};

/// Human-in-the-loop policy for the two gate nodes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatePolicy {
    /// When true, tool calls naming a sensitive tool suspend for approval.
    pub approval_enabled: bool,
    /// Tool names that require approval before execution.
    pub sensitive_tools: Vec<String>,
    /// When true, retrieved documents suspend for review before answering.
    pub document_review_enabled: bool,
}

impl Default for GatePolicy {
    fn default() -> Self {
        Self {
            approval_enabled: true,
            sensitive_tools: vec![
                "apply_for_leave".to_string(),
                "apply_leave_for_employee".to_string(),
                "approve_leave_for_employee".to_string(),
                "cancel_leave_for_employee".to_string(),
                "apply_attendance".to_string(),
                "approve_attendance_for_employee".to_string(),
                "cancel_attendance_for_employee".to_string(),
            ],
            document_review_enabled: false,
        }
    }
}

impl GatePolicy {
    pub fn is_sensitive(&self, tool_name: &str) -> bool {
        self.approval_enabled && self.sensitive_tools.iter().any(|t| t == tool_name)
    }
}

/// Configuration for one graph instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphConfig {
    pub model: String,
    pub temperature: Option<f32>,
    /// Guardrail on node transitions per turn.
    pub max_iterations: usize,
    /// Registry name of the retrieval tool; its results route through
    /// grading rather than straight to the answer.
    pub retrieval_tool: String,
    pub gates: GatePolicy,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            temperature: Some(0.0),
            max_iterations: 50,
            retrieval_tool: "retrieve_documents".to_string(),
            gates: GatePolicy::default(),
        }
    }
}

impl GraphConfig {
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_gates(mut self, gates: GatePolicy) -> Self {
        self.gates = gates;
        self
    }

    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sensitivity_requires_enabled_policy() {
        let mut policy = GatePolicy::default();
        assert!(policy.is_sensitive("apply_for_leave"));
        assert!(!policy.is_sensitive("retrieve_documents"));

        policy.approval_enabled = false;
        assert!(!policy.is_sensitive("apply_for_leave"));
    }
}
