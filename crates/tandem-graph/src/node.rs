use anyhow::Result;
use async_trait::async_trait;
use tandem_types::{Interrupt, NodeKind, StreamEvent};
use tokio::sync::mpsc;

use crate::state::TurnState;

pub type EventSender = mpsc::Sender<StreamEvent>;

/// Where the machine goes after a node finishes.
#[derive(Debug, Clone)]
pub enum Transition {
    /// Continue at the given node.
    To(NodeKind),
    /// Suspend the thread and wait for a human decision. The node pointer
    /// stays on the gate that emitted the interrupt.
    Suspend(Interrupt),
    /// Terminal; the turn's answer is in `state.final_answer`.
    Finish,
}

/// A unit of computation in the conversation state machine.
///
/// Nodes mutate the message sequence and report where execution goes next;
/// the drive loop owns checkpointing and event-stream termination.
#[async_trait]
pub trait Node: Send + Sync {
    fn kind(&self) -> NodeKind;

    async fn run(&self, state: &mut TurnState, event_tx: EventSender) -> Result<Transition>;
}
