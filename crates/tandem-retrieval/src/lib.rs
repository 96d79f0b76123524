//! Actor-scoped document retrieval.
//!
//! Documents are chunked, embedded and stored per owner. Queries are ranked
//! by cosine similarity over the owner's chunks only.

pub mod embedder;
pub mod store;
pub mod tool;

pub use embedder::{Embedder, OpenAIEmbedder};
pub use store::{Chunk, MemoryVectorStore, Retriever, ScoredChunk, DEFAULT_TOP_K};
pub use tool::{RetrieverTool, RETRIEVER_TOOL_NAME};
