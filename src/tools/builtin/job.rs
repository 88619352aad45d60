//! Job tools — create a job and poll its status.
//!
//! A job never leaves `running`; every status check waits out the full
//! timeout and asks the caller to check again.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;

use crate::dispatch::Dispatcher;
use crate::dispatch::outcome::JOB_STATUS_TOOL;
use crate::tools::tool::{Tool, ToolError, ToolOutput, require_str};

/// Creates a new job.
pub struct CreateJobTool {
    dispatcher: Arc<Dispatcher>,
}

impl CreateJobTool {
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self { dispatcher }
    }
}

#[async_trait]
impl Tool for CreateJobTool {
    fn name(&self) -> &str {
        "job_create"
    }

    fn description(&self) -> &str {
        "Create a new job and return instructions to check status"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {}
        })
    }

    async fn execute(&self, _params: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let start = Instant::now();
        let report = self.dispatcher.create_job().await;
        ToolOutput::from_serialize(self.name(), &report, start.elapsed())
    }
}

/// Reports a job's status after the configured wait.
pub struct JobStatusTool {
    dispatcher: Arc<Dispatcher>,
}

impl JobStatusTool {
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self { dispatcher }
    }
}

#[async_trait]
impl Tool for JobStatusTool {
    fn name(&self) -> &str {
        JOB_STATUS_TOOL
    }

    fn description(&self) -> &str {
        "Check the status of a job and returns polling instruction"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "id": {
                    "type": "string",
                    "description": "ID of the job to check"
                }
            },
            "required": ["id"]
        })
    }

    async fn execute(&self, params: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let start = Instant::now();
        let job_id = require_str(self.name(), &params, "id")?;

        match self.dispatcher.job_status(job_id).await {
            Ok(report) => ToolOutput::from_serialize(self.name(), &report, start.elapsed()),
            Err(e) => Ok(ToolOutput::error_payload(&e, start.elapsed())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::ServerConfig;
    use crate::dispatch::PromptPool;

    fn dispatcher() -> Arc<Dispatcher> {
        Dispatcher::with_clock(
            ServerConfig::default(),
            PromptPool::default(),
            Arc::new(ManualClock::default()),
        )
    }

    #[tokio::test]
    async fn create_then_status_stays_running() {
        let d = dispatcher();
        let created = CreateJobTool::new(Arc::clone(&d))
            .execute(serde_json::json!({}))
            .await
            .unwrap()
            .result;
        assert_eq!(created["status"], "running");
        let id = created["id"].as_str().unwrap().to_string();
        assert!(id.starts_with("job_"));

        let status = JobStatusTool::new(d)
            .execute(serde_json::json!({ "id": id }))
            .await
            .unwrap()
            .result;
        assert_eq!(status["id"], id.as_str());
        assert_eq!(status["status"], "running");
        assert!(status["instructions"].as_str().unwrap().contains("job_status"));
    }

    #[tokio::test]
    async fn unknown_job_is_error_payload() {
        let out = JobStatusTool::new(dispatcher())
            .execute(serde_json::json!({ "id": "job_nope" }))
            .await
            .unwrap();
        assert_eq!(out.result["error"], "Job with ID job_nope not found.");
    }

    #[tokio::test]
    async fn missing_id_is_invalid() {
        let result = JobStatusTool::new(dispatcher())
            .execute(serde_json::json!({}))
            .await;
        assert!(matches!(result, Err(ToolError::InvalidParameters { .. })));
    }
}
