//! Error types for mpol-dash
//!
//! Every variant is recovered at a component boundary: the component that
//! detects it sets a concrete terminal status and emits one notification.

use crate::playback::MediaErrorKind;
use mpol_common::events::TaskOutcome;
use thiserror::Error;

/// Main error type for the dashboard control layer
#[derive(Error, Debug)]
pub enum Error {
    /// Rejected file type or similar local validation failure
    #[error("Validation error: {0}")]
    Validation(String),

    /// `submit_all` was called with nothing queued
    #[error("No files queued for upload")]
    NoFilesQueued,

    /// Network, HTTP status or response parse failure
    #[error("Transport error: {0}")]
    Transport(String),

    /// Backend returned a non-success HTTP status
    #[error("Backend returned HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// Backend reported the analysis task as failed
    #[error(
        "Task {task_id} failed{}",
        .reason.as_deref().map(|r| format!(": {r}")).unwrap_or_default()
    )]
    TaskFailure { task_id: String, reason: Option<String> },

    /// Polling budget exhausted while the task was still running
    #[error("Task {task_id} timed out after {attempts} status checks")]
    TaskTimeout { task_id: String, attempts: u32 },

    /// Media could not be loaded, decoded or played
    #[error("Playback error: {0}")]
    Playback(MediaErrorKind),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding or decoding errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// mpol-common error
    #[error(transparent)]
    Common(#[from] mpol_common::Error),
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Transport(e.to_string())
    }
}

impl Error {
    /// Whether the error came from the network boundary (eligible for fallback data)
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Transport(_) | Error::Http { .. })
    }

    /// Error for a tracked task that ended without completing
    ///
    /// `None` for completed tasks and for trackers stopped by a queue removal.
    pub fn from_task_outcome(task_id: &str, outcome: &TaskOutcome) -> Option<Error> {
        match outcome {
            TaskOutcome::Completed | TaskOutcome::Cancelled => None,
            TaskOutcome::Failed { reason } => Some(Error::TaskFailure {
                task_id: task_id.to_string(),
                reason: reason.clone(),
            }),
            TaskOutcome::TimedOut { attempts } => Some(Error::TaskTimeout {
                task_id: task_id.to_string(),
                attempts: *attempts,
            }),
            TaskOutcome::Errored { reason } => Some(Error::Transport(reason.clone())),
        }
    }
}

/// Convenience Result type using mpol-dash Error
pub type Result<T> = std::result::Result<T, Error>;
