pub mod hrms;
pub mod mcp;
pub mod registry;

pub use hrms::{HrmsClient, HrmsConfig};
pub use mcp::McpSource;
pub use registry::{RemoteToolSource, ToolHandler, ToolRegistry, ToolSpec};
