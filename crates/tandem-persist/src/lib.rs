//! Durable state for the Tandem agent: checkpoints keyed by thread id and
//! session context keyed by session id.
//!
//! Both stores are traits with an in-memory implementation always available
//! and a MongoDB implementation behind the `mongodb` feature.

pub mod checkpoint;
pub mod error;
pub mod session;

#[cfg(feature = "mongodb")]
pub mod mongo;

pub use checkpoint::{Checkpoint, CheckpointStore, MemoryCheckpointStore};
pub use error::{PersistError, Result};
pub use session::{MemorySessionStore, SessionRecord, SessionStore};

#[cfg(feature = "mongodb")]
pub use mongo::{MongoCheckpointStore, MongoSessionStore};
