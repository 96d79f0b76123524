use super::content::Content;
use super::tool::ToolCall;
use serde::{Deserialize, Serialize};

/// One turn unit, provider-agnostic.
///
/// An `AI` message carrying `tool_calls` must be followed, before the next
/// user message, by one `Tool` message per declared call id; sequences that
/// violate this are treated as corrupted and repaired before reaching a
/// model (see tandem-graph's history module).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Message {
    /// System instructions.
    System {
        content: Content,

        #[serde(skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },

    /// User message.
    #[serde(rename = "user")]
    Human {
        content: Content,

        #[serde(skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },

    /// Assistant message; either content, tool calls, or both.
    #[serde(rename = "assistant")]
    AI {
        #[serde(skip_serializing_if = "Option::is_none")]
        content: Option<Content>,

        #[serde(skip_serializing_if = "Option::is_none")]
        tool_calls: Option<Vec<ToolCall>>,

        #[serde(skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },

    /// Tool result; `name` identifies which tool produced it so the state
    /// machine can route on it after execution.
    Tool {
        tool_call_id: String,

        #[serde(skip_serializing_if = "Option::is_none")]
        name: Option<String>,

        content: Content,
    },
}

impl Message {
    pub fn system(content: impl Into<Content>) -> Self {
        Self::System {
            content: content.into(),
            name: None,
        }
    }

    pub fn human(content: impl Into<Content>) -> Self {
        Self::Human {
            content: content.into(),
            name: None,
        }
    }

    pub fn ai(content: impl Into<Content>) -> Self {
        Self::AI {
            content: Some(content.into()),
            tool_calls: None,
            name: None,
        }
    }

    pub fn ai_with_tools(tool_calls: Vec<ToolCall>) -> Self {
        Self::AI {
            content: None,
            tool_calls: Some(tool_calls),
            name: None,
        }
    }

    pub fn tool_result(
        tool_call_id: impl Into<String>,
        name: impl Into<String>,
        content: impl Into<Content>,
    ) -> Self {
        Self::Tool {
            tool_call_id: tool_call_id.into(),
            name: Some(name.into()),
            content: content.into(),
        }
    }

    pub fn role(&self) -> &str {
        match self {
            Self::System { .. } => "system",
            Self::Human { .. } => "user",
            Self::AI { .. } => "assistant",
            Self::Tool { .. } => "tool",
        }
    }

    /// Tool calls declared by an assistant message, if any.
    pub fn tool_calls(&self) -> Option<&[ToolCall]> {
        match self {
            Self::AI {
                tool_calls: Some(calls),
                ..
            } => Some(calls),
            _ => None,
        }
    }

    /// Message content flattened to plain text; empty for content-less
    /// assistant messages.
    pub fn content_text(&self) -> String {
        match self {
            Self::System { content, .. }
            | Self::Human { content, .. }
            | Self::Tool { content, .. } => content.to_text(),
            Self::AI { content, .. } => content.as_ref().map(Content::to_text).unwrap_or_default(),
        }
    }

    pub fn is_tool_result(&self) -> bool {
        matches!(self, Self::Tool { .. })
    }

    pub fn is_user(&self) -> bool {
        matches!(self, Self::Human { .. })
    }
}
