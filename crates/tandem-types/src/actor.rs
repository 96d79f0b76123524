use serde::{Deserialize, Serialize};

/// Identity of the person a turn acts on behalf of.
///
/// Resolved from the session store at the start of a turn and threaded
/// explicitly through the node and tool call chain; it is per-turn state,
/// never process-global.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorContext {
    pub actor_id: i64,
    pub actor_name: String,
}

impl ActorContext {
    pub fn new(actor_id: i64, actor_name: impl Into<String>) -> Self {
        Self {
            actor_id,
            actor_name: actor_name.into(),
        }
    }
}
