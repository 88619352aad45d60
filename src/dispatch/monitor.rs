//! Liveness monitor — produces tasks from the prompt pool while at least
//! one worker is polling.
//!
//! Each tick counts workers whose last poll falls within `timeout + grace`.
//! With a live worker and room in the queue, one prompt is drawn and
//! enqueued. Nothing is produced for an empty room, so tasks do not pile up
//! while no one is listening.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use super::dispatcher::Dispatcher;
use crate::clock::Clock;

/// What a single monitor tick did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// A task was created and queued.
    Produced(String),
    /// No worker polled recently.
    NoLiveWorkers,
    /// The pending queue is at capacity.
    QueueFull,
    /// The prompt pool is empty.
    PoolExhausted,
}

impl Dispatcher {
    /// Run one liveness check and produce at most one task.
    pub async fn liveness_tick(&self) -> TickOutcome {
        let now = self.clock.now();
        let window = self.config.liveness_window();

        let task_id = {
            let mut store = self.store.lock().await;

            let alive = store.alive_workers(now, window);
            if alive == 0 {
                return TickOutcome::NoLiveWorkers;
            }
            if store.pending_len() >= self.config.max_pending_tasks {
                return TickOutcome::QueueFull;
            }
            let Some(prompt) = store.draw_prompt(&mut rand::thread_rng()) else {
                return TickOutcome::PoolExhausted;
            };

            let task_id = store.enqueue_task(prompt, now);
            info!(
                task_id = %task_id,
                alive_workers = alive,
                pending = store.pending_len(),
                prompts_left = store.prompts_remaining(),
                "Produced task"
            );
            task_id
        };

        self.task_ready.notify_waiters();
        TickOutcome::Produced(task_id)
    }
}

/// Spawn the background liveness monitor.
pub fn spawn_liveness_monitor(dispatcher: Arc<Dispatcher>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("Liveness monitor started (interval: {}ms)", period.as_millis());

        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut exhausted_logged = false;
        loop {
            ticker.tick().await;
            match dispatcher.liveness_tick().await {
                TickOutcome::PoolExhausted if !exhausted_logged => {
                    info!("Prompt pool exhausted, task production stopped");
                    exhausted_logged = true;
                }
                outcome => debug!(?outcome, "Liveness tick"),
            }
        }
    })
}
