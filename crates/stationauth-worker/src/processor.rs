//! Consumer loop driving [`AuthorizationTask`] invocations from a [`TaskQueue`].

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error, info, warn};

use crate::queue::{Dequeued, TaskQueue};
use crate::task::{AuthorizationTask, TaskSummary};

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Pulls requests off the queue and runs up to `concurrency` tasks at once.
pub struct TaskProcessor {
    queue: Arc<dyn TaskQueue>,
    task: Arc<AuthorizationTask>,
    concurrency: usize,
    poll_interval: Duration,
}

impl TaskProcessor {
    pub fn new(
        queue: Arc<dyn TaskQueue>,
        task: Arc<AuthorizationTask>,
        concurrency: usize,
    ) -> Self {
        Self {
            queue,
            task,
            concurrency: concurrency.max(1),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// How long one dequeue may block. Also bounds shutdown latency.
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Process tasks until `shutdown` resolves or the queue is closed.
    ///
    /// In-flight invocations are always awaited before returning, so every
    /// dequeued request gets its audit record. Returns the number of
    /// invocations that completed.
    ///
    /// A panic inside an invocation is logged and then resumed on the caller.
    pub async fn run_until<F>(&self, shutdown: F) -> usize
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        let permits = Arc::new(Semaphore::new(self.concurrency));
        let mut in_flight: JoinSet<TaskSummary> = JoinSet::new();
        let mut completed = 0usize;

        info!(concurrency = self.concurrency, "Task processor started");

        loop {
            while let Some(joined) = in_flight.try_join_next() {
                completed += reap(joined);
            }

            let permit = tokio::select! {
                biased;
                _ = &mut shutdown => break,
                permit = permits.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            // Not raced against shutdown: a popped message must not be dropped.
            match self.queue.dequeue(self.poll_interval).await {
                Ok(Dequeued::Task(request)) => {
                    debug!(station_id = %request.station_id, "Task dequeued");
                    let task = self.task.clone();
                    in_flight.spawn(async move {
                        let summary = task.run(request).await;
                        drop(permit);
                        summary
                    });
                }
                Ok(Dequeued::Empty) => {}
                Ok(Dequeued::Closed) => {
                    info!("Task queue closed");
                    break;
                }
                Err(e) => {
                    error!(error = %e, "Error dequeuing task");
                    drop(permit);
                    tokio::select! {
                        _ = &mut shutdown => break,
                        _ = tokio::time::sleep(self.poll_interval) => {}
                    }
                }
            }
        }

        if !in_flight.is_empty() {
            info!(in_flight = in_flight.len(), "Waiting for in-flight tasks");
        }
        while let Some(joined) = in_flight.join_next().await {
            completed += reap(joined);
        }

        info!(completed, "Task processor stopped");
        completed
    }
}

fn reap(joined: Result<TaskSummary, JoinError>) -> usize {
    match joined {
        Ok(summary) => {
            debug!(
                outcome = %summary.outcome,
                callback_status = %summary.receipt,
                "Task completed"
            );
            1
        }
        Err(e) if e.is_panic() => {
            error!("Authorization task panicked");
            std::panic::resume_unwind(e.into_panic())
        }
        Err(e) => {
            warn!(error = %e, "Authorization task was cancelled");
            0
        }
    }
}
