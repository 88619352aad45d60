//! MCP polling server — long-poll task dispatch for tool-calling workers.

pub mod clock;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod mcp;
pub mod tools;
