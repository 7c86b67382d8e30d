//! Event types and EventBus for the dashboard
//!
//! Components publish state transitions here; front ends (the CLI renderer,
//! the dashboard's refresh loop, tests) subscribe instead of being called
//! back directly.

use crate::api::{AnalysisId, TaskStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Severity of a user-visible notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    Info,
    Success,
    Warning,
    Error,
}

impl std::fmt::Display for NotificationLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotificationLevel::Info => write!(f, "info"),
            NotificationLevel::Success => write!(f, "success"),
            NotificationLevel::Warning => write!(f, "warning"),
            NotificationLevel::Error => write!(f, "error"),
        }
    }
}

/// Lifecycle status of one queued upload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadStatus {
    Queued,
    Submitting,
    Processing,
    Completed,
    Failed,
    TimedOut,
    Errored,
}

impl UploadStatus {
    /// No automatic transition leaves a terminal status
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            UploadStatus::Completed
                | UploadStatus::Failed
                | UploadStatus::TimedOut
                | UploadStatus::Errored
        )
    }

    pub fn label(&self) -> &'static str {
        match self {
            UploadStatus::Queued => "Queued",
            UploadStatus::Submitting => "Uploading...",
            UploadStatus::Processing => "Processing...",
            UploadStatus::Completed => "Completed",
            UploadStatus::Failed => "Failed",
            UploadStatus::TimedOut => "Timed out",
            UploadStatus::Errored => "Error",
        }
    }
}

/// Terminal outcome of a task tracker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskOutcome {
    Completed,
    Failed { reason: Option<String> },
    TimedOut { attempts: u32 },
    Errored { reason: String },
    /// Owning queue item was removed before a terminal status was reached
    Cancelled,
}

impl TaskOutcome {
    pub fn upload_status(&self) -> Option<UploadStatus> {
        match self {
            TaskOutcome::Completed => Some(UploadStatus::Completed),
            TaskOutcome::Failed { .. } => Some(UploadStatus::Failed),
            TaskOutcome::TimedOut { .. } => Some(UploadStatus::TimedOut),
            TaskOutcome::Errored { .. } => Some(UploadStatus::Errored),
            TaskOutcome::Cancelled => None,
        }
    }
}

/// Playback session state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    Loading,
    Ready,
    Playing,
    Paused,
    Stopped,
    Errored,
}

impl PlaybackState {
    /// Session still holds a media resource
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            PlaybackState::Loading
                | PlaybackState::Ready
                | PlaybackState::Playing
                | PlaybackState::Paused
        )
    }
}

impl std::fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlaybackState::Loading => write!(f, "loading"),
            PlaybackState::Ready => write!(f, "ready"),
            PlaybackState::Playing => write!(f, "playing"),
            PlaybackState::Paused => write!(f, "paused"),
            PlaybackState::Stopped => write!(f, "stopped"),
            PlaybackState::Errored => write!(f, "errored"),
        }
    }
}

/// Dashboard event types
///
/// Serialized with an internal `type` tag so they can be logged or streamed as JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DashEvent {
    /// A notification became visible
    NotificationShown {
        id: Uuid,
        level: NotificationLevel,
        message: String,
        timestamp: DateTime<Utc>,
    },

    /// A notification was dismissed (timer or user)
    NotificationDismissed { id: Uuid, timestamp: DateTime<Utc> },

    /// A validated file entered the upload queue
    QueueItemAdded {
        file_id: Uuid,
        display_name: String,
        size_bytes: u64,
        timestamp: DateTime<Utc>,
    },

    /// A queued file changed status
    QueueItemStatusChanged {
        file_id: Uuid,
        display_name: String,
        old_status: UploadStatus,
        new_status: UploadStatus,
        timestamp: DateTime<Utc>,
    },

    /// A queued file was removed (explicitly or by auto-clear)
    QueueItemRemoved { file_id: Uuid, timestamp: DateTime<Utc> },

    /// The whole queue was cleared and its container hidden
    QueueCleared { removed: usize, timestamp: DateTime<Utc> },

    /// A completed upload will be cleared after the grace delay
    AutoClearScheduled {
        file_id: Uuid,
        delay_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// One status poll for a task was answered
    TaskPolled {
        file_id: Uuid,
        task_id: String,
        attempt: u32,
        status: TaskStatus,
        timestamp: DateTime<Utc>,
    },

    /// A task tracker stopped
    TaskFinished {
        file_id: Uuid,
        task_id: String,
        outcome: TaskOutcome,
        timestamp: DateTime<Utc>,
    },

    /// Playback session state changed
    PlaybackStateChanged {
        analysis_id: AnalysisId,
        old_state: PlaybackState,
        new_state: PlaybackState,
        timestamp: DateTime<Utc>,
    },

    /// Playback position update while playing
    PlaybackProgress {
        analysis_id: AnalysisId,
        position_seconds: f64,
        duration_seconds: f64,
        timestamp: DateTime<Utc>,
    },

    /// The "now playing" indicator moved (None = cleared)
    NowPlayingChanged {
        analysis_id: Option<AnalysisId>,
        timestamp: DateTime<Utc>,
    },

    /// The result list produced a new view
    ListRendered {
        revision: u64,
        shown: usize,
        filtered: usize,
        total: usize,
        timestamp: DateTime<Utc>,
    },
}

impl DashEvent {
    /// Event type name (matches the serde tag)
    pub fn event_type(&self) -> &'static str {
        match self {
            DashEvent::NotificationShown { .. } => "NotificationShown",
            DashEvent::NotificationDismissed { .. } => "NotificationDismissed",
            DashEvent::QueueItemAdded { .. } => "QueueItemAdded",
            DashEvent::QueueItemStatusChanged { .. } => "QueueItemStatusChanged",
            DashEvent::QueueItemRemoved { .. } => "QueueItemRemoved",
            DashEvent::QueueCleared { .. } => "QueueCleared",
            DashEvent::AutoClearScheduled { .. } => "AutoClearScheduled",
            DashEvent::TaskPolled { .. } => "TaskPolled",
            DashEvent::TaskFinished { .. } => "TaskFinished",
            DashEvent::PlaybackStateChanged { .. } => "PlaybackStateChanged",
            DashEvent::PlaybackProgress { .. } => "PlaybackProgress",
            DashEvent::NowPlayingChanged { .. } => "NowPlayingChanged",
            DashEvent::ListRendered { .. } => "ListRendered",
        }
    }
}

/// Central event distribution bus
///
/// Backed by `tokio::sync::broadcast`:
/// - Non-blocking publish (slow subscribers don't block producers)
/// - Multiple concurrent subscribers
/// - Lagged message detection for slow subscribers
///
/// # Examples
///
/// ```
/// use mpol_common::events::{DashEvent, EventBus};
///
/// let bus = EventBus::new(100);
/// let mut rx = bus.subscribe();
///
/// bus.emit_lossy(DashEvent::QueueCleared {
///     removed: 2,
///     timestamp: chrono::Utc::now(),
/// });
///
/// assert!(matches!(rx.try_recv(), Ok(DashEvent::QueueCleared { removed: 2, .. })));
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<DashEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus buffering up to `capacity` events per subscriber
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DashEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Err` if no subscriber is listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(&self, event: DashEvent) -> Result<usize, broadcast::error::SendError<DashEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: DashEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_without_subscribers_is_err() {
        let bus = EventBus::new(10);
        let result = bus.emit(DashEvent::QueueCleared {
            removed: 0,
            timestamp: Utc::now(),
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_event_serializes_with_type_tag() {
        let event = DashEvent::TaskFinished {
            file_id: Uuid::nil(),
            task_id: "t1".to_string(),
            outcome: TaskOutcome::TimedOut { attempts: 30 },
            timestamp: Utc::now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "TaskFinished");
        assert_eq!(json["outcome"]["timed_out"]["attempts"], 30);
        assert_eq!(event.event_type(), "TaskFinished");
    }

    #[test]
    fn test_upload_status_terminal() {
        assert!(!UploadStatus::Queued.is_terminal());
        assert!(!UploadStatus::Processing.is_terminal());
        assert!(UploadStatus::TimedOut.is_terminal());
        assert!(UploadStatus::Errored.is_terminal());
    }

    #[test]
    fn test_outcome_maps_to_upload_status() {
        assert_eq!(TaskOutcome::Completed.upload_status(), Some(UploadStatus::Completed));
        assert_eq!(TaskOutcome::Cancelled.upload_status(), None);
    }

    #[tokio::test]
    async fn test_multiple_subscribers_receive() {
        let bus = EventBus::new(10);
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        bus.emit_lossy(DashEvent::NowPlayingChanged {
            analysis_id: Some(AnalysisId(3)),
            timestamp: Utc::now(),
        });

        assert_eq!(a.recv().await.unwrap().event_type(), "NowPlayingChanged");
        assert_eq!(b.recv().await.unwrap().event_type(), "NowPlayingChanged");
    }
}
