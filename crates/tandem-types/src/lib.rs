pub mod actor;
pub mod config;
pub mod events;
pub mod interrupt;
pub mod node;

pub use actor::ActorContext;
pub use config::{GatePolicy, GraphConfig};
pub use events::StreamEvent;
pub use interrupt::{Interrupt, InterruptKind, PendingAction, ResumeDecision};
pub use node::NodeKind;
