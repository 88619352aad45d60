//! Error types for the polling server.

use std::fmt;

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to read prompt file {path}: {source}")]
    PromptFile {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Kind of entity held by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Worker,
    Task,
    Job,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Worker => "Worker",
            Self::Task => "Task",
            Self::Job => "Job",
        };
        write!(f, "{s}")
    }
}

/// Errors produced by dispatch core operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    #[error("{kind} with ID {id} not found.")]
    NotFound { kind: EntityKind, id: String },

    #[error("Unknown tool: {name}")]
    UnknownOperation { name: String },

    #[error("Task with ID {id} has not been assigned yet.")]
    TaskNotAssigned { id: String },
}

impl DispatchError {
    pub fn worker_not_found(id: impl Into<String>) -> Self {
        Self::NotFound {
            kind: EntityKind::Worker,
            id: id.into(),
        }
    }

    pub fn task_not_found(id: impl Into<String>) -> Self {
        Self::NotFound {
            kind: EntityKind::Task,
            id: id.into(),
        }
    }

    pub fn job_not_found(id: impl Into<String>) -> Self {
        Self::NotFound {
            kind: EntityKind::Job,
            id: id.into(),
        }
    }
}

/// Tool execution errors.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("Invalid parameters for tool {name}: {reason}")]
    InvalidParameters { name: String, reason: String },

    #[error("Tool {name} execution failed: {reason}")]
    ExecutionFailed { name: String, reason: String },
}

/// Errors on the JSON-RPC transport.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for the server.
pub type Result<T> = std::result::Result<T, Error>;
