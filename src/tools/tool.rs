//! Tool trait and shared helpers.

use std::time::Duration;

use async_trait::async_trait;

pub use crate::error::ToolError;
use crate::error::DispatchError;

/// Output from a tool execution.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    /// JSON payload returned to the caller.
    pub result: serde_json::Value,
    /// Wall time spent executing.
    pub duration: Duration,
}

impl ToolOutput {
    pub fn success(result: serde_json::Value, duration: Duration) -> Self {
        Self { result, duration }
    }

    /// Serialize a typed result into a successful output.
    pub fn from_serialize<T: serde::Serialize>(
        name: &str,
        value: &T,
        duration: Duration,
    ) -> Result<Self, ToolError> {
        let result = serde_json::to_value(value).map_err(|e| ToolError::ExecutionFailed {
            name: name.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self::success(result, duration))
    }

    /// Structured `{"error": ...}` payload for lookups that found nothing.
    ///
    /// Returned as a normal result so a polling caller can keep going.
    pub fn error_payload(err: &DispatchError, duration: Duration) -> Self {
        Self::success(serde_json::json!({ "error": err.to_string() }), duration)
    }
}

/// An operation exposed to protocol callers.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique tool name.
    fn name(&self) -> &str;

    /// Human-readable description shown in tool listings.
    fn description(&self) -> &str;

    /// JSON Schema of the accepted arguments.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Run the tool.
    async fn execute(&self, params: serde_json::Value) -> Result<ToolOutput, ToolError>;
}

/// Extract a required string parameter.
pub fn require_str<'a>(
    tool: &str,
    params: &'a serde_json::Value,
    key: &str,
) -> Result<&'a str, ToolError> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| ToolError::InvalidParameters {
            name: tool.to_string(),
            reason: format!("missing required string parameter '{key}'"),
        })
}
