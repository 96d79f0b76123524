//! The conversation state machine: a graph of nodes over an append-only
//! message sequence, checkpointed after every transition, with human-in-the-
//! loop gates that suspend the thread until a resume decision arrives.

pub mod graph;
pub mod history;
pub mod node;
pub mod nodes;
pub mod prompts;
pub mod state;

pub use graph::{Graph, TurnRequest};
pub use node::{EventSender, Node, Transition};
pub use state::TurnState;
