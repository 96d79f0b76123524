use crate::interrupt::Interrupt;
use serde::{Deserialize, Serialize};

/// One event in a turn's output stream.
///
/// A turn produces zero or more `token` events followed by exactly one
/// terminal event (`interrupt`, `done` or `error`); the channel closes after
/// the terminal event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// Incremental answer text.
    Token { content: String, thread_id: String },

    /// Execution suspended at a human gate; terminal for this turn. The
    /// caller must later resume the thread with a decision.
    Interrupt {
        interrupt_data: Interrupt,
        thread_id: String,
    },

    /// Turn completed; `content` is the full answer.
    Done { content: String, thread_id: String },

    /// Turn failed; `content` carries diagnostic detail for display.
    Error { content: String, thread_id: String },
}

impl StreamEvent {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Token { .. })
    }

    pub fn thread_id(&self) -> &str {
        match self {
            Self::Token { thread_id, .. }
            | Self::Interrupt { thread_id, .. }
            | Self::Done { thread_id, .. }
            | Self::Error { thread_id, .. } => thread_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tagged_serialization() {
        let event = StreamEvent::Done {
            content: "hello".to_string(),
            thread_id: "t1".to_string(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "done");
        assert_eq!(json["thread_id"], "t1");
    }

    #[test]
    fn terminal_classification() {
        let token = StreamEvent::Token {
            content: "x".into(),
            thread_id: "t".into(),
        };
        assert!(!token.is_terminal());
        let err = StreamEvent::Error {
            content: "boom".into(),
            thread_id: "t".into(),
        };
        assert!(err.is_terminal());
    }
}
