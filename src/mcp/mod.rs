//! MCP (Model Context Protocol) stdio transport.

pub mod protocol;
pub mod server;

pub use protocol::{JsonRpcError, JsonRpcRequest, JsonRpcResponse};
pub use server::McpServer;
