//! Polling of submitted export tasks until every one settles.

use futures::future::join_all;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use catalog::{ExportTask, TaskState};
use imagery_common::{ImageryError, ImageryResult};

/// Polling cadence.
#[derive(Debug, Clone, Copy)]
pub struct MonitorOptions {
    pub poll_interval: Duration,
    /// How often a progress line is logged.
    pub progress_interval: Duration,
}

impl Default for MonitorOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(3),
            progress_interval: Duration::from_secs(5 * 60),
        }
    }
}

/// A task that ended failed or cancelled.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskFailure {
    pub task_id: String,
    pub description: String,
    pub state: TaskState,
}

/// Outcome of monitoring a batch of tasks.
#[derive(Debug, Clone)]
pub struct ExportReport {
    pub total: usize,
    pub completed: usize,
    pub failures: Vec<TaskFailure>,
    pub elapsed: Duration,
}

impl ExportReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// `Err(RemoteTaskFailure)` listing every failed task, if any.
    pub fn into_result(self) -> ImageryResult<Self> {
        if self.failures.is_empty() {
            return Ok(self);
        }
        Err(ImageryError::RemoteTaskFailure {
            failed: self.failures.len(),
            total: self.total,
            tasks: self
                .failures
                .iter()
                .map(|f| format!("{} ({})", f.description, f.state))
                .collect(),
        })
    }
}

/// Poll `tasks` until all are terminal. Each round polls every unsettled
/// task concurrently.
///
/// Failures are recorded once and never stop the other tasks from being
/// followed. A failed status poll is logged and retried next round.
pub async fn monitor_tasks(tasks: &[Box<dyn ExportTask>], options: MonitorOptions) -> ExportReport {
    let started = Instant::now();
    let mut last_progress = started;
    let mut pending: Vec<&dyn ExportTask> = tasks.iter().map(|t| t.as_ref()).collect();
    let mut completed = 0;
    let mut failures = Vec::new();

    info!(tasks = tasks.len(), "Monitoring export tasks");

    loop {
        let statuses = join_all(pending.iter().map(|task| task.status())).await;
        let mut still_pending = Vec::with_capacity(pending.len());

        for (task, status) in pending.into_iter().zip(statuses) {
            match status {
                Ok(TaskState::Completed) => {
                    completed += 1;
                    debug!(task_id = %task.id(), description = %task.description(), "Export completed");
                }
                Ok(state) if state.is_failure() => {
                    warn!(
                        task_id = %task.id(),
                        description = %task.description(),
                        state = %state,
                        "Export task failed"
                    );
                    failures.push(TaskFailure {
                        task_id: task.id().to_string(),
                        description: task.description().to_string(),
                        state,
                    });
                }
                Ok(_) => still_pending.push(task),
                Err(e) => {
                    warn!(
                        task_id = %task.id(),
                        error = %e,
                        "Failed to poll export task status; retrying"
                    );
                    still_pending.push(task);
                }
            }
        }

        pending = still_pending;
        if pending.is_empty() {
            break;
        }

        if last_progress.elapsed() >= options.progress_interval {
            info!(
                remaining = pending.len(),
                completed,
                failed = failures.len(),
                elapsed_secs = started.elapsed().as_secs(),
                "Export tasks still running"
            );
            last_progress = Instant::now();
        }

        sleep(options.poll_interval).await;
    }

    let report = ExportReport {
        total: tasks.len(),
        completed,
        failures,
        elapsed: started.elapsed(),
    };

    info!(
        total = report.total,
        completed = report.completed,
        failed = report.failures.len(),
        elapsed_secs = report.elapsed.as_secs_f64(),
        "Export monitoring finished"
    );
    report
}
