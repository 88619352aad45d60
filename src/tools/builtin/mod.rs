//! Built-in tools.

pub mod job;
pub mod worker;

pub use job::{CreateJobTool, JobStatusTool};
pub use worker::{CreateWorkerTool, PollTool, SubmitTool};
