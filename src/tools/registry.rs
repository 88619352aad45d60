//! Tool registry for managing available tools.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::RwLock;

use crate::dispatch::Dispatcher;
use crate::error::{DispatchError, Error};
use crate::tools::builtin::{
    CreateJobTool, CreateWorkerTool, JobStatusTool, PollTool, SubmitTool,
};
use crate::tools::tool::{Tool, ToolOutput};

/// Tool description as advertised to protocol clients.
#[derive(Debug, Clone, Serialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: serde_json::Value,
}

/// Registry of available tools.
pub struct ToolRegistry {
    tools: RwLock<HashMap<String, Arc<dyn Tool>>>,
}

impl ToolRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            tools: RwLock::new(HashMap::new()),
        }
    }

    /// Register a tool (sync version for startup).
    pub fn register_sync(&self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        if let Ok(mut tools) = self.tools.try_write() {
            tools.insert(name.clone(), tool);
            tracing::debug!("Registered tool: {}", name);
        }
    }

    /// Register the worker/task tools.
    pub fn register_worker_tools(&self, dispatcher: Arc<Dispatcher>) {
        self.register_sync(Arc::new(CreateWorkerTool::new(Arc::clone(&dispatcher))));
        self.register_sync(Arc::new(PollTool::new(Arc::clone(&dispatcher))));
        self.register_sync(Arc::new(SubmitTool::new(dispatcher)));
    }

    /// Register the job tools.
    pub fn register_job_tools(&self, dispatcher: Arc<Dispatcher>) {
        self.register_sync(Arc::new(CreateJobTool::new(Arc::clone(&dispatcher))));
        self.register_sync(Arc::new(JobStatusTool::new(dispatcher)));
    }

    /// Get a tool by name.
    pub async fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.read().await.get(name).cloned()
    }

    /// Get the number of registered tools.
    pub fn count(&self) -> usize {
        self.tools.try_read().map(|t| t.len()).unwrap_or(0)
    }

    /// Tool definitions sorted by name.
    pub async fn tool_definitions(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<ToolDefinition> = self
            .tools
            .read()
            .await
            .values()
            .map(|tool| ToolDefinition {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                input_schema: tool.parameters_schema(),
            })
            .collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    /// Look up and run a tool. An unknown name is an `UnknownOperation`.
    pub async fn call(&self, name: &str, params: serde_json::Value) -> Result<ToolOutput, Error> {
        let tool = self.get(name).await.ok_or_else(|| DispatchError::UnknownOperation {
            name: name.to_string(),
        })?;
        // The read lock is released before a potentially long execution.
        let output = tool.execute(params).await?;
        tracing::debug!(
            tool = %name,
            duration_ms = output.duration.as_millis() as u64,
            "Tool finished"
        );
        Ok(output)
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use crate::dispatch::PromptPool;
    use crate::tools::tool::ToolError;
    use async_trait::async_trait;
    use std::time::Duration;

    #[derive(Debug)]
    struct MockTool {
        name: String,
    }

    #[async_trait]
    impl Tool for MockTool {
        fn name(&self) -> &str {
            &self.name
        }
        fn description(&self) -> &str {
            "A mock tool for testing"
        }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({"type": "object", "properties": {}})
        }
        async fn execute(&self, _params: serde_json::Value) -> Result<ToolOutput, ToolError> {
            Ok(ToolOutput::success(
                serde_json::json!("mock"),
                Duration::from_millis(1),
            ))
        }
    }

    #[tokio::test]
    async fn test_register_and_get() {
        let registry = ToolRegistry::new();
        let tool = Arc::new(MockTool {
            name: "test_tool".to_string(),
        });

        registry.register_sync(tool);
        assert!(registry.get("nonexistent").await.is_none());

        let retrieved = registry.get("test_tool").await;
        assert!(retrieved.is_some());
        assert_eq!(retrieved.unwrap().name(), "test_tool");
    }

    #[tokio::test]
    async fn test_definitions_sorted_and_count() {
        let registry = ToolRegistry::new();
        registry.register_sync(Arc::new(MockTool {
            name: "b".to_string(),
        }));
        registry.register_sync(Arc::new(MockTool {
            name: "a".to_string(),
        }));

        assert_eq!(registry.count(), 2);
        let names: Vec<String> = registry
            .tool_definitions()
            .await
            .into_iter()
            .map(|def| def.name)
            .collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_call_unknown_tool() {
        let registry = ToolRegistry::new();
        let err = registry
            .call("launch_rockets", serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Dispatch(DispatchError::UnknownOperation { ref name }) if name == "launch_rockets"
        ));
    }

    #[tokio::test]
    async fn test_mode_tool_sets() {
        let dispatcher = Dispatcher::new(ServerConfig::default(), PromptPool::default());

        let workers = ToolRegistry::new();
        workers.register_worker_tools(Arc::clone(&dispatcher));
        let names: Vec<String> = workers
            .tool_definitions()
            .await
            .into_iter()
            .map(|def| def.name)
            .collect();
        assert_eq!(names, vec!["worker_create", "worker_poll", "worker_submit"]);

        let jobs = ToolRegistry::new();
        jobs.register_job_tools(dispatcher);
        let defs = jobs.tool_definitions().await;
        assert_eq!(defs.len(), 2);
        assert_eq!(defs[0].name, "job_create");
        assert_eq!(defs[1].name, "job_status");
        assert_eq!(defs[1].input_schema["required"][0], "id");
    }
}
