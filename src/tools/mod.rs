//! Tool abstraction over dispatch operations.

pub mod builtin;
pub mod registry;
pub mod tool;

pub use registry::{ToolDefinition, ToolRegistry};
pub use tool::*;
