//! Analysis task polling
//!
//! One `TaskTracker` runs per accepted submission. It polls `GET /tasks/{id}`
//! immediately, then once per interval, strictly sequentially, until the task
//! reaches a terminal status, the attempt budget runs out, or the owning queue
//! row is removed.

use super::queue::{FileId, UploadQueue};
use crate::api::TaskApi;
use crate::notifications::NotificationCenter;
use chrono::Utc;
use mpol_common::api::TaskStatus;
use mpol_common::config::TuningConfig;
use mpol_common::events::{DashEvent, EventBus, TaskOutcome, UploadStatus};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Poll spacing, attempt budget and completion grace delay
#[derive(Debug, Clone)]
pub struct TrackerPolicy {
    pub poll_interval: Duration,
    pub max_attempts: u32,
    pub completion_grace: Duration,
}

impl Default for TrackerPolicy {
    fn default() -> Self {
        Self::from(&TuningConfig::default())
    }
}

impl From<&TuningConfig> for TrackerPolicy {
    fn from(tuning: &TuningConfig) -> Self {
        Self {
            poll_interval: tuning.poll_interval(),
            max_attempts: tuning.max_poll_attempts.max(1),
            completion_grace: tuning.completion_grace(),
        }
    }
}

/// Backend task attached to a queue row
#[derive(Debug, Clone)]
pub struct TaskHandle {
    pub task_id: String,
    pub attempt_count: u32,
    pub owner_file: FileId,
    cancel: CancellationToken,
}

impl TaskHandle {
    pub fn new(task_id: String, owner_file: FileId, cancel: CancellationToken) -> Self {
        Self {
            task_id,
            attempt_count: 0,
            owner_file,
            cancel,
        }
    }

    /// Stop the tracker driving this task
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// Polling state machine for one task
pub struct TaskTracker {
    queue: UploadQueue,
    api: Arc<dyn TaskApi>,
    notifications: NotificationCenter,
    events: EventBus,
    policy: TrackerPolicy,
    file_id: FileId,
    display_name: String,
    task_id: String,
    cancel: CancellationToken,
}

enum Step {
    Continue,
    Done(TaskOutcome),
}

impl TaskTracker {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        queue: UploadQueue,
        api: Arc<dyn TaskApi>,
        notifications: NotificationCenter,
        events: EventBus,
        policy: TrackerPolicy,
        file_id: FileId,
        display_name: String,
        task_id: String,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            queue,
            api,
            notifications,
            events,
            policy,
            file_id,
            display_name,
            task_id,
            cancel,
        }
    }

    /// Drive the task to a terminal outcome
    pub async fn run(self) -> TaskOutcome {
        let outcome = self.poll_until_terminal().await;
        self.finish(outcome)
    }

    async fn poll_until_terminal(&self) -> TaskOutcome {
        if !self.queue.update_status(self.file_id, UploadStatus::Processing) {
            return TaskOutcome::Cancelled;
        }

        let mut polls: u32 = 0;
        let mut attempts: u32 = 0;

        loop {
            let response = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return TaskOutcome::Cancelled,
                response = self.api.task_status(&self.task_id) => response,
            };
            polls += 1;

            let status = match response {
                Ok(status) => status,
                Err(e) => {
                    warn!(task_id = %self.task_id, error = %e, "Task status check failed");
                    return TaskOutcome::Errored {
                        reason: e.to_string(),
                    };
                }
            };

            self.events.emit_lossy(DashEvent::TaskPolled {
                file_id: self.file_id,
                task_id: self.task_id.clone(),
                attempt: polls,
                status: status.status,
                timestamp: Utc::now(),
            });

            match self.step(status.status, status.error, &mut attempts) {
                Step::Done(outcome) => return outcome,
                Step::Continue => {}
            }

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return TaskOutcome::Cancelled,
                _ = tokio::time::sleep(self.policy.poll_interval) => {}
            }
        }
    }

    fn step(&self, status: TaskStatus, error: Option<String>, attempts: &mut u32) -> Step {
        match status {
            TaskStatus::Completed => Step::Done(TaskOutcome::Completed),
            TaskStatus::Failed => Step::Done(TaskOutcome::Failed {
                reason: error.filter(|e| !e.trim().is_empty()),
            }),
            TaskStatus::Queued | TaskStatus::Running | TaskStatus::Processing => {
                *attempts += 1;
                if !self.queue.record_attempt(self.file_id, *attempts) {
                    return Step::Done(TaskOutcome::Cancelled);
                }
                debug!(task_id = %self.task_id, attempt = *attempts, ?status, "Task still pending");
                if *attempts >= self.policy.max_attempts {
                    Step::Done(TaskOutcome::TimedOut {
                        attempts: *attempts,
                    })
                } else {
                    Step::Continue
                }
            }
        }
    }

    /// Apply the terminal status, emit the single notification and release the handle
    ///
    /// Returns `Cancelled` when the row was gone and nothing was applied.
    fn finish(&self, outcome: TaskOutcome) -> TaskOutcome {
        let applied = match outcome.upload_status() {
            Some(status) => self.queue.update_status(self.file_id, status),
            None => false,
        };

        if applied {
            let name = &self.display_name;
            match &outcome {
                TaskOutcome::Completed => {
                    info!(task_id = %self.task_id, file = %name, "Analysis completed");
                    self.notifications
                        .success(format!("Analysis completed for {name}"));
                    self.queue
                        .schedule_auto_clear(self.file_id, self.policy.completion_grace);
                }
                TaskOutcome::Failed { reason } => {
                    warn!(task_id = %self.task_id, file = %name, ?reason, "Analysis failed");
                    let message = match reason {
                        Some(reason) => format!("Analysis failed for {name}: {reason}"),
                        None => format!("Analysis failed for {name}"),
                    };
                    self.notifications.error(message);
                }
                TaskOutcome::TimedOut { attempts } => {
                    warn!(
                        task_id = %self.task_id,
                        file = %name,
                        attempts,
                        "Analysis polling timed out"
                    );
                    self.notifications.error(format!(
                        "Analysis of {name} is taking too long; check the analyses list later"
                    ));
                }
                TaskOutcome::Errored { reason } => {
                    self.notifications
                        .error(format!("Lost track of analysis for {name}: {reason}"));
                }
                TaskOutcome::Cancelled => {}
            }
            self.queue.detach_task(self.file_id);
        } else {
            debug!(task_id = %self.task_id, "Tracker stopped for removed upload");
        }

        let outcome = if applied { outcome } else { TaskOutcome::Cancelled };
        self.events.emit_lossy(DashEvent::TaskFinished {
            file_id: self.file_id,
            task_id: self.task_id.clone(),
            outcome: outcome.clone(),
            timestamp: Utc::now(),
        });
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_defaults() {
        let policy = TrackerPolicy::default();
        assert_eq!(policy.poll_interval, Duration::from_secs(1));
        assert_eq!(policy.max_attempts, 30);
        assert_eq!(policy.completion_grace, Duration::from_secs(2));
    }

    #[test]
    fn test_policy_never_zero_attempts() {
        let tuning = TuningConfig {
            max_poll_attempts: 0,
            ..TuningConfig::default()
        };
        assert_eq!(TrackerPolicy::from(&tuning).max_attempts, 1);
    }

    #[test]
    fn test_handle_cancel() {
        let token = CancellationToken::new();
        let handle = TaskHandle::new("t1".to_string(), uuid::Uuid::new_v4(), token.clone());
        assert!(!handle.is_cancelled());
        handle.cancel();
        assert!(token.is_cancelled());
    }
}
