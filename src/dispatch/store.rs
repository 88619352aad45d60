//! Entity store — workers, tasks, jobs, the pending queue and the prompt pool.
//!
//! Plain owned state with synchronous methods. The dispatcher wraps it in a
//! single mutex; every method here runs to completion under that lock, so
//! each one is atomic with respect to other callers.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::Rng;
use tracing::{debug, warn};

use super::model::{Job, Task, TaskStatus, Worker, WorkerStatus};
use super::prompts::PromptPool;
use crate::error::DispatchError;

#[derive(Debug, Default)]
pub struct EntityStore {
    workers: HashMap<String, Worker>,
    tasks: HashMap<String, Task>,
    jobs: HashMap<String, Job>,
    /// Ids of `Pending` tasks, oldest first.
    queue: VecDeque<String>,
    pool: PromptPool,
}

impl EntityStore {
    pub fn new(pool: PromptPool) -> Self {
        Self {
            pool,
            ..Default::default()
        }
    }

    // ── Workers ──────────────────────────────────────────────────────────

    pub fn insert_worker(&mut self, worker: Worker) {
        self.workers.insert(worker.id.clone(), worker);
    }

    pub fn worker(&self, id: &str) -> Option<&Worker> {
        self.workers.get(id)
    }

    /// Record a poll for liveness.
    pub fn touch_worker(&mut self, id: &str, now: DateTime<Utc>) -> Result<(), DispatchError> {
        let worker = self
            .workers
            .get_mut(id)
            .ok_or_else(|| DispatchError::worker_not_found(id))?;
        worker.last_poll_at = now;
        Ok(())
    }

    /// Number of workers that polled within `window` of `now`.
    pub fn alive_workers(&self, now: DateTime<Utc>, window: Duration) -> usize {
        self.workers
            .values()
            .filter(|w| w.is_alive(now, window))
            .count()
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    // ── Tasks ────────────────────────────────────────────────────────────

    /// Create a `Pending` task and append it to the queue.
    pub fn enqueue_task(&mut self, prompt: impl Into<String>, now: DateTime<Utc>) -> String {
        let task = Task::new(prompt, now);
        let id = task.id.clone();
        self.tasks.insert(id.clone(), task);
        self.queue.push_back(id.clone());
        id
    }

    pub fn task(&self, id: &str) -> Option<&Task> {
        self.tasks.get(id)
    }

    /// Pop the oldest pending task and assign it to `worker_id`.
    ///
    /// Returns `Ok(None)` when the queue is empty. The worker is checked
    /// before anything is popped so a failed call never loses a task.
    pub fn assign_next(
        &mut self,
        worker_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Task>, DispatchError> {
        if !self.workers.contains_key(worker_id) {
            return Err(DispatchError::worker_not_found(worker_id));
        }

        while let Some(task_id) = self.queue.pop_front() {
            let Some(task) = self.tasks.get_mut(&task_id) else {
                warn!(task_id = %task_id, "Queued task missing from store, skipping");
                continue;
            };
            if let Err(reason) = task.assign(worker_id, now) {
                warn!(task_id = %task_id, %reason, "Queued task not pending, skipping");
                continue;
            }
            let assigned = task.clone();

            if let Some(worker) = self.workers.get_mut(worker_id) {
                worker.status = WorkerStatus::Active;
            }

            debug!(worker_id = %worker_id, task_id = %task_id, "Task assigned");
            return Ok(Some(assigned));
        }

        Ok(None)
    }

    /// Store a worker's response and return the worker to `Idle`.
    ///
    /// Any worker may complete any assigned task.
    pub fn complete_task(
        &mut self,
        worker_id: &str,
        task_id: &str,
        response: &str,
        now: DateTime<Utc>,
    ) -> Result<(), DispatchError> {
        if !self.workers.contains_key(worker_id) {
            return Err(DispatchError::worker_not_found(worker_id));
        }
        let task = self
            .tasks
            .get_mut(task_id)
            .ok_or_else(|| DispatchError::task_not_found(task_id))?;
        if task.status == TaskStatus::Pending {
            return Err(DispatchError::TaskNotAssigned {
                id: task_id.to_string(),
            });
        }
        task.complete(response, now)
            .map_err(|_| DispatchError::TaskNotAssigned {
                id: task_id.to_string(),
            })?;

        if let Some(worker) = self.workers.get_mut(worker_id) {
            worker.status = WorkerStatus::Idle;
        }
        Ok(())
    }

    pub fn pending_len(&self) -> usize {
        self.queue.len()
    }

    /// Queued task ids, oldest first.
    pub fn pending_ids(&self) -> Vec<String> {
        self.queue.iter().cloned().collect()
    }

    // ── Prompt pool ──────────────────────────────────────────────────────

    pub fn draw_prompt<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Option<String> {
        self.pool.draw(rng)
    }

    pub fn prompts_remaining(&self) -> usize {
        self.pool.len()
    }

    // ── Jobs ─────────────────────────────────────────────────────────────

    pub fn insert_job(&mut self, job: Job) {
        self.jobs.insert(job.id.clone(), job);
    }

    pub fn job(&self, id: &str) -> Option<&Job> {
        self.jobs.get(id)
    }
}
