pub mod openai;
pub mod streaming;
pub mod traits;
pub mod types;

pub use openai::OpenAIClient;
pub use streaming::{StreamEvent, ToolCallAccumulator};
pub use traits::{ChatClient, ChatOptions, ChatRequest, ChatResponse, TokenUsage};
pub use types::{Content, FunctionCall, Message, Tool, ToolCall, ToolChoice};
