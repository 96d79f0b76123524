//! Message-history inspection helpers shared by the nodes.

use std::collections::HashSet;

use tandem_llm::Message;

/// Window the grading loop-bound counts tool responses in.
pub const GRADE_WINDOW: usize = 6;

/// Drops assistant messages whose declared tool calls were never answered.
///
/// A checkpoint written between tool dispatch and tool completion leaves an
/// assistant message with `tool_calls` but no matching tool responses; chat
/// APIs reject such sequences outright. An assistant message is kept only if
/// every declared call id has a tool response later in the sequence, before
/// the next user message. Survivors keep their original order.
pub fn repair_sequence(messages: &[Message]) -> Vec<Message> {
    let mut cleaned = Vec::with_capacity(messages.len());

    for (i, msg) in messages.iter().enumerate() {
        let Some(tool_calls) = msg.tool_calls() else {
            cleaned.push(msg.clone());
            continue;
        };
        if tool_calls.is_empty() {
            cleaned.push(msg.clone());
            continue;
        }

        let declared: HashSet<&str> = tool_calls.iter().map(|tc| tc.id.as_str()).collect();
        let mut answered: HashSet<&str> = HashSet::new();
        for later in &messages[i + 1..] {
            if later.is_user() {
                break;
            }
            if let Message::Tool { tool_call_id, .. } = later {
                if declared.contains(tool_call_id.as_str()) {
                    answered.insert(tool_call_id.as_str());
                }
            }
        }

        if answered == declared {
            cleaned.push(msg.clone());
        } else {
            tracing::warn!(
                declared = declared.len(),
                answered = answered.len(),
                "dropping assistant message with unanswered tool calls"
            );
        }
    }

    cleaned
}

/// The question the thread is currently answering: the content of the most
/// recent user message, scanning backward.
///
/// `exclude_last` skips a trailing tool message, for nodes that run right
/// after tool execution where the true question precedes the tool-call chain.
pub fn latest_user_question(messages: &[Message], exclude_last: bool) -> Option<String> {
    let slice = if exclude_last && matches!(messages.last(), Some(m) if m.is_tool_result()) {
        &messages[..messages.len() - 1]
    } else {
        messages
    };
    slice
        .iter()
        .rev()
        .find(|m| m.is_user())
        .map(|m| m.content_text())
}

/// Tool responses among the last `GRADE_WINDOW` messages. Two or more means
/// a rewrite already happened for this question.
pub fn recent_tool_responses(messages: &[Message]) -> usize {
    let start = messages.len().saturating_sub(GRADE_WINDOW);
    messages[start..].iter().filter(|m| m.is_tool_result()).count()
}

/// Content of the most recent tool response, if any.
pub fn latest_tool_content(messages: &[Message]) -> Option<String> {
    messages.iter().rev().find_map(|m| match m {
        Message::Tool { content, .. } => Some(content.to_text()),
        _ => None,
    })
}

/// Name of the most recent tool response, if recorded.
pub fn latest_tool_name(messages: &[Message]) -> Option<String> {
    messages.iter().rev().find_map(|m| match m {
        Message::Tool { name, .. } => name.clone(),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tandem_llm::ToolCall;

    fn assistant_with_calls(ids: &[&str]) -> Message {
        let calls = ids
            .iter()
            .map(|id| ToolCall::new(*id, "retrieve_documents", "{}"))
            .collect();
        Message::ai_with_tools(calls)
    }

    #[test]
    fn complete_tool_cycles_survive_repair() {
        let messages = vec![
            Message::human("question"),
            assistant_with_calls(&["call_1"]),
            Message::tool_result("call_1", "retrieve_documents", "some docs"),
        ];
        let cleaned = repair_sequence(&messages);
        assert_eq!(cleaned.len(), 3);
    }

    #[test]
    fn partially_answered_assistant_message_is_dropped() {
        // Two declared calls, only one response: the assistant message must
        // be excluded entirely.
        let messages = vec![
            Message::human("question"),
            assistant_with_calls(&["call_1", "call_2"]),
            Message::tool_result("call_1", "retrieve_documents", "some docs"),
        ];
        let cleaned = repair_sequence(&messages);
        assert_eq!(cleaned.len(), 2);
        assert!(cleaned.iter().all(|m| m.tool_calls().is_none()));
    }

    #[test]
    fn responses_after_next_user_message_do_not_count() {
        let messages = vec![
            assistant_with_calls(&["call_1"]),
            Message::human("new turn"),
            Message::tool_result("call_1", "retrieve_documents", "too late"),
        ];
        let cleaned = repair_sequence(&messages);
        assert_eq!(cleaned.len(), 2);
        assert!(cleaned[0].is_user());
    }

    #[test]
    fn latest_question_scans_backward() {
        let messages = vec![
            Message::human("first question"),
            Message::ai("answer one"),
            Message::human("second question"),
        ];
        assert_eq!(
            latest_user_question(&messages, false).as_deref(),
            Some("second question")
        );
    }

    #[test]
    fn exclude_last_skips_trailing_tool_message_only() {
        let messages = vec![
            Message::human("the question"),
            assistant_with_calls(&["call_1"]),
            Message::tool_result("call_1", "retrieve_documents", "docs"),
        ];
        assert_eq!(
            latest_user_question(&messages, true).as_deref(),
            Some("the question")
        );
        // Without a trailing tool message, exclude_last changes nothing.
        let plain = vec![Message::human("only question")];
        assert_eq!(
            latest_user_question(&plain, true).as_deref(),
            Some("only question")
        );
    }

    #[test]
    fn tool_response_window_counts_recent_only() {
        let mut messages = vec![
            Message::tool_result("old", "t", "out of window"),
        ];
        for i in 0..GRADE_WINDOW {
            messages.push(Message::human(format!("filler {i}")));
        }
        messages.push(Message::tool_result("new", "t", "in window"));
        assert_eq!(recent_tool_responses(&messages), 1);
    }

    #[test]
    fn latest_tool_content_and_name() {
        let messages = vec![
            Message::tool_result("c1", "retrieve_documents", "first"),
            Message::ai("interlude"),
            Message::tool_result("c2", "get_leave_balance", "second"),
        ];
        assert_eq!(latest_tool_content(&messages).as_deref(), Some("second"));
        assert_eq!(latest_tool_name(&messages).as_deref(), Some("get_leave_balance"));
        assert!(latest_tool_content(&[Message::human("x")]).is_none());
    }
}
