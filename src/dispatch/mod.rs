//! Task dispatch core.
//!
//! - `model` — Worker, Task and Job records with their state machines
//! - `prompts` — finite prompt pool consumed without replacement
//! - `store` — owned entity tables and the FIFO pending queue
//! - `dispatcher` — the `Dispatcher` operations (create, poll, submit, jobs)
//! - `monitor` — liveness-gated task production
//! - `outcome` — typed operation results and caller instructions

pub mod dispatcher;
pub mod model;
pub mod monitor;
pub mod outcome;
pub mod prompts;
pub mod store;

pub use dispatcher::Dispatcher;
pub use model::{Job, JobStatus, Task, TaskStatus, Worker, WorkerStatus};
pub use monitor::{TickOutcome, spawn_liveness_monitor};
pub use outcome::{JobReport, PollOutcome, Submitted, WorkerCreated};
pub use prompts::PromptPool;
pub use store::EntityStore;
