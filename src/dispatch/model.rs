//! Worker, task and job records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Generate an opaque identifier: `<prefix>_<unix-millis>_<random hex>`.
pub fn new_id(prefix: &str) -> String {
    format!(
        "{}_{}_{}",
        prefix,
        Utc::now().timestamp_millis(),
        Uuid::new_v4().simple()
    )
}

/// State of a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerStatus {
    /// No task outstanding.
    Idle,
    /// Holding an assigned task that has not been submitted.
    Active,
}

/// A registered worker.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Worker {
    pub id: String,
    pub status: WorkerStatus,
    pub created_at: DateTime<Utc>,
    /// Last poll time. Drives liveness only.
    pub last_poll_at: DateTime<Utc>,
}

impl Worker {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            id: new_id("worker"),
            status: WorkerStatus::Idle,
            created_at: now,
            last_poll_at: now,
        }
    }

    /// Whether the worker polled within `window` of `now`.
    pub fn is_alive(&self, now: DateTime<Utc>, window: std::time::Duration) -> bool {
        match now.signed_duration_since(self.last_poll_at).to_std() {
            Ok(since) => since <= window,
            // last poll is in the future relative to `now`
            Err(_) => true,
        }
    }
}

/// State of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Waiting in the queue.
    Pending,
    /// Handed to a worker.
    Assigned,
    /// Result submitted.
    Completed,
}

impl TaskStatus {
    /// Check if this state allows transitioning to another state.
    ///
    /// `Completed -> Completed` is allowed: a repeated submit overwrites the
    /// stored response.
    pub fn can_transition_to(&self, target: TaskStatus) -> bool {
        use TaskStatus::*;

        matches!(
            (self, target),
            (Pending, Assigned) | (Assigned, Completed) | (Completed, Completed)
        )
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Assigned => "assigned",
            Self::Completed => "completed",
        };
        write!(f, "{s}")
    }
}

/// A unit of work built from one prompt.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub prompt: String,
    pub status: TaskStatus,
    /// Set on assignment.
    pub worker_id: Option<String>,
    /// Set on completion.
    pub response: Option<String>,
    pub created_at: DateTime<Utc>,
    pub assigned_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Task {
    pub fn new(prompt: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: new_id("task"),
            prompt: prompt.into(),
            status: TaskStatus::Pending,
            worker_id: None,
            response: None,
            created_at: now,
            assigned_at: None,
            completed_at: None,
        }
    }

    /// Hand the task to a worker.
    pub fn assign(&mut self, worker_id: &str, now: DateTime<Utc>) -> Result<(), String> {
        self.check_transition(TaskStatus::Assigned)?;
        self.status = TaskStatus::Assigned;
        self.worker_id = Some(worker_id.to_string());
        self.assigned_at = Some(now);
        Ok(())
    }

    /// Record the worker's response. Overwrites any earlier response.
    pub fn complete(&mut self, response: impl Into<String>, now: DateTime<Utc>) -> Result<(), String> {
        self.check_transition(TaskStatus::Completed)?;
        self.status = TaskStatus::Completed;
        self.response = Some(response.into());
        self.completed_at = Some(now);
        Ok(())
    }

    fn check_transition(&self, target: TaskStatus) -> Result<(), String> {
        if self.status.can_transition_to(target) {
            Ok(())
        } else {
            Err(format!(
                "Cannot transition task {} from {} to {}",
                self.id, self.status, target
            ))
        }
    }
}

/// State of a job. Only `Running` is ever produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Running,
    Completed,
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
        }
    }
}

/// A job-mode placeholder record.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: String,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
}

impl Job {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            id: new_id("job"),
            status: JobStatus::Running,
            created_at: now,
        }
    }
}
