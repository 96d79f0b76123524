use tandem_llm::Message;
use tandem_persist::Checkpoint;
use tandem_types::{Interrupt, NodeKind};
use uuid::Uuid;

/// Mutable state of one conversation thread while a turn executes.
///
/// Everything here is reconstructible from the latest checkpoint; the drive
/// loop persists a new checkpoint after every node transition.
#[derive(Debug, Clone)]
pub struct TurnState {
    pub thread_id: String,
    pub run_id: String,
    pub messages: Vec<Message>,
    pub node: NodeKind,
    pub pending_interrupt: Option<Interrupt>,
    /// Next checkpoint sequence number for this thread.
    pub seq: u64,
    /// Accumulated final answer text for the turn.
    pub final_answer: String,
}

impl TurnState {
    pub fn new(thread_id: impl Into<String>) -> Self {
        Self {
            thread_id: thread_id.into(),
            run_id: Uuid::new_v4().to_string(),
            messages: Vec::new(),
            node: NodeKind::Decide,
            pending_interrupt: None,
            seq: 0,
            final_answer: String::new(),
        }
    }

    pub fn from_checkpoint(checkpoint: Checkpoint) -> Self {
        Self {
            thread_id: checkpoint.thread_id,
            run_id: Uuid::new_v4().to_string(),
            messages: checkpoint.messages,
            node: checkpoint.node,
            pending_interrupt: checkpoint.pending_interrupt,
            seq: checkpoint.seq + 1,
            final_answer: String::new(),
        }
    }

    pub fn to_checkpoint(&self) -> Checkpoint {
        Checkpoint::new(
            self.thread_id.clone(),
            self.seq,
            self.node,
            self.messages.clone(),
            self.pending_interrupt.clone(),
        )
    }

    pub fn push_message(&mut self, message: Message) {
        self.messages.push(message);
    }
}
