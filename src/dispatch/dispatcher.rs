//! Dispatcher — worker registration, long-poll task assignment, result
//! submission and the job-mode placeholder.
//!
//! All state lives in one [`EntityStore`] behind a single mutex. A poll
//! holds the lock only for the check-and-dequeue step and waits with the
//! lock released, woken by enqueue notifications or the polling interval.

use std::sync::Arc;

use tokio::sync::{Mutex, Notify};
use tracing::{debug, info};

use super::model::{Job, JobStatus, Task, Worker};
use super::outcome::{
    JobReport, PollOutcome, Submitted, WorkerCreated, job_instructions, poll_instructions,
    task_instructions,
};
use super::prompts::PromptPool;
use super::store::EntityStore;
use crate::clock::{Clock, SystemClock};
use crate::config::ServerConfig;
use crate::error::DispatchError;

/// Dispatch core shared by every request handler and the liveness monitor.
pub struct Dispatcher {
    pub(super) store: Mutex<EntityStore>,
    /// Signalled after a task is enqueued.
    pub(super) task_ready: Notify,
    pub(super) clock: Arc<dyn Clock>,
    pub(super) config: ServerConfig,
}

impl Dispatcher {
    /// Create a dispatcher on the system clock.
    pub fn new(config: ServerConfig, pool: PromptPool) -> Arc<Self> {
        Self::with_clock(config, pool, Arc::new(SystemClock))
    }

    pub fn with_clock(config: ServerConfig, pool: PromptPool, clock: Arc<dyn Clock>) -> Arc<Self> {
        Arc::new(Self {
            store: Mutex::new(EntityStore::new(pool)),
            task_ready: Notify::new(),
            clock,
            config,
        })
    }

    /// Register a new idle worker.
    pub async fn create_worker(&self) -> WorkerCreated {
        let worker = Worker::new(self.clock.now());
        let worker_id = worker.id.clone();
        self.store.lock().await.insert_worker(worker);

        info!(worker_id = %worker_id, "Worker registered");

        WorkerCreated {
            instructions: poll_instructions(&worker_id),
            worker_id,
        }
    }

    /// Wait up to the configured timeout for a task and assign it to the
    /// worker.
    ///
    /// Dropping the returned future abandons the wait without side effects
    /// beyond the `lastPollAt` update.
    pub async fn poll(&self, worker_id: &str) -> Result<PollOutcome, DispatchError> {
        let started = self.clock.now();
        self.store.lock().await.touch_worker(worker_id, started)?;

        let timeout = self.config.timeout;
        let interval = self.config.effective_poll_interval();

        loop {
            let notified = {
                let mut store = self.store.lock().await;
                if let Some(task) = store.assign_next(worker_id, self.clock.now())? {
                    drop(store);
                    return Ok(self.assigned(worker_id, task));
                }
                // Registered before the lock is released so an enqueue that
                // lands in between still wakes us.
                self.task_ready.notified()
            };

            let elapsed = self.clock.elapsed_since(started);
            if elapsed >= timeout {
                break;
            }
            let wait = interval.min(timeout - elapsed);

            tokio::select! {
                _ = notified => {}
                _ = self.clock.sleep(wait) => {}
            }
        }

        debug!(worker_id = %worker_id, "Poll timed out with no task");
        Ok(PollOutcome::Idle {
            worker_id: worker_id.to_string(),
            instructions: poll_instructions(worker_id),
        })
    }

    fn assigned(&self, worker_id: &str, task: Task) -> PollOutcome {
        info!(worker_id = %worker_id, task_id = %task.id, "Task dispatched");
        PollOutcome::Assigned {
            worker_id: worker_id.to_string(),
            instructions: task_instructions(worker_id, &task.id),
            task_id: task.id,
            prompt: task.prompt,
        }
    }

    /// Record a worker's response to a task.
    pub async fn submit(
        &self,
        worker_id: &str,
        task_id: &str,
        response: &str,
    ) -> Result<Submitted, DispatchError> {
        let now = self.clock.now();
        self.store
            .lock()
            .await
            .complete_task(worker_id, task_id, response, now)?;

        info!(
            worker_id = %worker_id,
            task_id = %task_id,
            response_len = response.len(),
            "Task completed"
        );

        Ok(Submitted {
            worker_id: worker_id.to_string(),
            instructions: poll_instructions(worker_id),
        })
    }

    /// Append a task built from `prompt` and wake waiting pollers.
    pub async fn enqueue_task(&self, prompt: impl Into<String>) -> String {
        let now = self.clock.now();
        let task_id = self.store.lock().await.enqueue_task(prompt, now);
        self.task_ready.notify_waiters();
        debug!(task_id = %task_id, "Task enqueued");
        task_id
    }

    /// Create a job in the `running` state.
    pub async fn create_job(&self) -> JobReport {
        let job = Job::new(self.clock.now());
        let id = job.id.clone();
        self.store.lock().await.insert_job(job);

        info!(job_id = %id, "Job created");

        JobReport {
            instructions: job_instructions(&id),
            status: JobStatus::Running,
            id,
        }
    }

    /// Wait the full timeout, then report the job as still running.
    pub async fn job_status(&self, job_id: &str) -> Result<JobReport, DispatchError> {
        let status = self
            .store
            .lock()
            .await
            .job(job_id)
            .map(|job| job.status)
            .ok_or_else(|| DispatchError::job_not_found(job_id))?;

        self.clock.sleep(self.config.timeout).await;

        Ok(JobReport {
            id: job_id.to_string(),
            status,
            instructions: job_instructions(job_id),
        })
    }

    // ── Snapshots ────────────────────────────────────────────────────────

    pub async fn worker(&self, id: &str) -> Option<Worker> {
        self.store.lock().await.worker(id).cloned()
    }

    pub async fn task(&self, id: &str) -> Option<Task> {
        self.store.lock().await.task(id).cloned()
    }

    pub async fn pending_count(&self) -> usize {
        self.store.lock().await.pending_len()
    }

    pub async fn worker_count(&self) -> usize {
        self.store.lock().await.worker_count()
    }
}
