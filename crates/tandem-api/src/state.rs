use std::sync::Arc;

use tandem_graph::Graph;
use tandem_persist::{CheckpointStore, SessionStore};

use crate::config::Config;

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub graph: Arc<Graph>,
    pub sessions: Arc<dyn SessionStore>,
    pub checkpoints: Arc<dyn CheckpointStore>,
}

impl AppState {
    pub fn new(
        config: Config,
        graph: Graph,
        sessions: Arc<dyn SessionStore>,
        checkpoints: Arc<dyn CheckpointStore>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            graph: Arc::new(graph),
            sessions,
            checkpoints,
        }
    }
}
