//! Configuration types and command-line parsing.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};

use crate::error::{ConfigError, Result};

/// Default long-poll timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 59;

/// Longest accepted long-poll timeout (one day).
pub const MAX_TIMEOUT_SECS: u64 = 24 * 60 * 60;

/// Which set of tools the server exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ServerMode {
    /// Worker registration, task polling and result submission.
    #[default]
    #[value(aliases = ["task", "workers"])]
    Tasks,
    /// Job creation and status polling.
    #[value(alias = "job")]
    Jobs,
}

impl std::fmt::Display for ServerMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Tasks => write!(f, "tasks"),
            Self::Jobs => write!(f, "jobs"),
        }
    }
}

/// Command-line arguments. Every flag can also be set through its
/// environment variable; the flag wins when both are present.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "mcp-polling-server",
    version,
    about = "MCP server that hands out tasks to long-polling workers over stdio"
)]
pub struct Args {
    /// Seconds a poll or job status call waits before answering
    #[arg(long, env = "MCP_POLL_TIMEOUT_SECS", default_value_t = DEFAULT_TIMEOUT_SECS)]
    pub timeout: u64,

    /// Tool set to expose
    #[arg(long, value_enum, env = "MCP_POLL_MODE", default_value_t = ServerMode::Tasks)]
    pub mode: ServerMode,

    /// File with one prompt per line, replacing the built-in pool
    #[arg(long, env = "MCP_POLL_PROMPTS_FILE")]
    pub prompts: Option<PathBuf>,

    /// Fallback re-check interval inside a poll, in milliseconds
    #[arg(long, env = "MCP_POLL_INTERVAL_MS", default_value_t = 1000)]
    pub poll_interval_ms: u64,

    /// Period of the liveness monitor, in milliseconds
    #[arg(long, env = "MCP_POLL_MONITOR_INTERVAL_MS", default_value_t = 5000)]
    pub monitor_interval_ms: u64,

    /// Seconds added to the timeout when deciding whether a worker is alive
    #[arg(long, env = "MCP_POLL_LIVENESS_GRACE_SECS", default_value_t = 5)]
    pub liveness_grace_secs: u64,

    /// Pending-queue depth at which the monitor stops producing tasks
    #[arg(long, env = "MCP_POLL_MAX_PENDING", default_value_t = 3)]
    pub max_pending: usize,
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Tool set to expose.
    pub mode: ServerMode,
    /// Upper bound for a single poll or job status wait.
    pub timeout: Duration,
    /// Fallback re-check interval inside a poll.
    pub poll_interval: Duration,
    /// Period of the liveness monitor.
    pub monitor_interval: Duration,
    /// Slack added to `timeout` when deciding whether a worker is alive.
    pub liveness_grace: Duration,
    /// Pending-queue depth at which the monitor stops producing tasks.
    pub max_pending_tasks: usize,
    /// Optional file with one prompt per line.
    pub prompts_file: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            mode: ServerMode::Tasks,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            poll_interval: Duration::from_secs(1),
            monitor_interval: Duration::from_secs(5),
            liveness_grace: Duration::from_secs(5),
            max_pending_tasks: 3,
            prompts_file: None,
        }
    }
}

impl ServerConfig {
    /// Build from the process command line and environment.
    ///
    /// Exits with usage help when an argument does not parse.
    pub fn from_env_and_args() -> Result<Self> {
        Self::from_args(Args::parse())
    }

    /// Build from parsed arguments and validate the result.
    pub fn from_args(args: Args) -> Result<Self> {
        let config = Self {
            mode: args.mode,
            timeout: Duration::from_secs(args.timeout),
            poll_interval: Duration::from_millis(args.poll_interval_ms),
            monitor_interval: Duration::from_millis(args.monitor_interval_ms),
            liveness_grace: Duration::from_secs(args.liveness_grace_secs),
            max_pending_tasks: args.max_pending,
            prompts_file: args.prompts,
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the dispatcher cannot honor.
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                key: "timeout".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        if self.timeout > Duration::from_secs(MAX_TIMEOUT_SECS) {
            return Err(ConfigError::InvalidValue {
                key: "timeout".to_string(),
                message: format!("must be at most {MAX_TIMEOUT_SECS} seconds"),
            });
        }
        if self.monitor_interval.is_zero() {
            return Err(ConfigError::InvalidValue {
                key: "monitor_interval".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    /// Polling interval clamped strictly below the timeout.
    pub fn effective_poll_interval(&self) -> Duration {
        let ceiling = self.timeout / 2;
        if self.poll_interval.is_zero() || self.poll_interval >= self.timeout {
            ceiling.max(Duration::from_millis(1))
        } else {
            self.poll_interval
        }
    }

    /// Window within which a worker's last poll counts as alive.
    pub fn liveness_window(&self) -> Duration {
        self.timeout.saturating_add(self.liveness_grace)
    }

    /// Load the prompt pool seed, from `prompts_file` when set.
    pub fn load_prompts(&self) -> Result<Vec<String>> {
        let Some(ref path) = self.prompts_file else {
            return Ok(crate::dispatch::prompts::default_prompts());
        };
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::PromptFile {
            path: path.display().to_string(),
            source,
        })?;
        Ok(contents
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }
}
