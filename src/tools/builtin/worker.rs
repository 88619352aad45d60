//! Worker tools — register, long-poll for a task, submit a result.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;

use crate::dispatch::Dispatcher;
use crate::dispatch::outcome::{WORKER_POLL_TOOL, WORKER_SUBMIT_TOOL};
use crate::tools::tool::{Tool, ToolError, ToolOutput, require_str};

/// Registers a new worker.
pub struct CreateWorkerTool {
    dispatcher: Arc<Dispatcher>,
}

impl CreateWorkerTool {
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self { dispatcher }
    }
}

#[async_trait]
impl Tool for CreateWorkerTool {
    fn name(&self) -> &str {
        "worker_create"
    }

    fn description(&self) -> &str {
        "Register as a worker and return instructions to start polling for tasks"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {}
        })
    }

    async fn execute(&self, _params: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let start = Instant::now();
        let created = self.dispatcher.create_worker().await;
        ToolOutput::from_serialize(self.name(), &created, start.elapsed())
    }
}

/// Waits for the next task on behalf of a worker.
pub struct PollTool {
    dispatcher: Arc<Dispatcher>,
}

impl PollTool {
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self { dispatcher }
    }
}

#[async_trait]
impl Tool for PollTool {
    fn name(&self) -> &str {
        WORKER_POLL_TOOL
    }

    fn description(&self) -> &str {
        "Wait for the next task for a worker. Returns a task to answer, or an \
         instruction to poll again when none arrived before the timeout"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "workerId": {
                    "type": "string",
                    "description": "ID returned by worker_create"
                }
            },
            "required": ["workerId"]
        })
    }

    async fn execute(&self, params: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let start = Instant::now();
        let worker_id = require_str(self.name(), &params, "workerId")?;

        match self.dispatcher.poll(worker_id).await {
            Ok(outcome) => ToolOutput::from_serialize(self.name(), &outcome, start.elapsed()),
            Err(e) => Ok(ToolOutput::error_payload(&e, start.elapsed())),
        }
    }
}

/// Stores a worker's answer to its task.
pub struct SubmitTool {
    dispatcher: Arc<Dispatcher>,
}

impl SubmitTool {
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self { dispatcher }
    }
}

#[async_trait]
impl Tool for SubmitTool {
    fn name(&self) -> &str {
        WORKER_SUBMIT_TOOL
    }

    fn description(&self) -> &str {
        "Submit the response for a task and return instructions to poll again"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "workerId": {
                    "type": "string",
                    "description": "ID of the submitting worker"
                },
                "taskId": {
                    "type": "string",
                    "description": "ID of the task being answered"
                },
                "response": {
                    "type": "string",
                    "description": "Brief answer to the task prompt"
                }
            },
            "required": ["workerId", "taskId", "response"]
        })
    }

    async fn execute(&self, params: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let start = Instant::now();
        let worker_id = require_str(self.name(), &params, "workerId")?;
        let task_id = require_str(self.name(), &params, "taskId")?;
        let response = require_str(self.name(), &params, "response")?;

        match self.dispatcher.submit(worker_id, task_id, response).await {
            Ok(submitted) => ToolOutput::from_serialize(self.name(), &submitted, start.elapsed()),
            Err(e) => Ok(ToolOutput::error_payload(&e, start.elapsed())),
        }
    }
}
