//! Client-side upload queue
//!
//! Holds validated files in arrival order and owns the task handle of every
//! file that has been submitted. Removing a file (individually or by
//! clearing) cancels its tracker, so no timer outlives its queue row.

use super::tracker::{TaskHandle, TaskTracker, TrackerPolicy};
use crate::api::{TaskApi, UploadRequest};
use crate::error::{Error, Result};
use crate::notifications::NotificationCenter;
use chrono::Utc;
use mpol_common::api::Priority;
use mpol_common::events::{DashEvent, EventBus, TaskOutcome, UploadStatus};
use mpol_common::human_time::format_file_size;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Accepted audio file extensions (compared case-insensitively)
pub const ALLOWED_EXTENSIONS: [&str; 5] = ["mp3", "wav", "flac", "m4a", "ogg"];

/// Stable identifier of one queue row
pub type FileId = Uuid;

/// Where the file's bytes live
#[derive(Debug, Clone)]
pub enum FileSource {
    Path(PathBuf),
    Memory(Arc<Vec<u8>>),
}

/// How the user selected the file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionOrigin {
    Picker,
    DragDrop,
}

/// A file chosen by the user, before validation
#[derive(Debug, Clone)]
pub struct SelectedFile {
    pub name: String,
    pub size_bytes: u64,
    pub source: FileSource,
}

impl SelectedFile {
    pub fn from_bytes(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            size_bytes: bytes.len() as u64,
            source: FileSource::Memory(Arc::new(bytes)),
        }
    }

    /// Describe a file on disk (size read from metadata; bytes read at submission)
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let metadata = tokio::fs::metadata(path).await?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self {
            name,
            size_bytes: metadata.len(),
            source: FileSource::Path(path.to_path_buf()),
        })
    }

    async fn read(&self) -> Result<Vec<u8>> {
        match &self.source {
            FileSource::Path(path) => Ok(tokio::fs::read(path).await?),
            FileSource::Memory(bytes) => Ok(bytes.as_ref().clone()),
        }
    }
}

/// Whether a filename carries an allowed audio extension
pub fn has_allowed_extension(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ALLOWED_EXTENSIONS.iter().any(|a| a.eq_ignore_ascii_case(ext)))
        .unwrap_or(false)
}

/// Snapshot of one queue row
#[derive(Debug, Clone)]
pub struct QueuedFile {
    pub id: FileId,
    pub file: SelectedFile,
    pub display_name: String,
    pub size_bytes: u64,
    pub status: UploadStatus,
    pub origin: SelectionOrigin,
    pub task_id: Option<String>,
    pub attempt_count: u32,
}

/// Result of `add`
#[derive(Debug, Default)]
pub struct AddReport {
    pub accepted: Vec<FileId>,
    pub rejected: Vec<String>,
}

/// Options sent with every file of one submission
#[derive(Debug, Clone, Default)]
pub struct SubmitOptions {
    pub lyrics: Option<String>,
    pub priority: Priority,
}

/// A tracker spawned by `submit_all`
#[derive(Debug)]
pub struct StartedTask {
    pub file_id: FileId,
    pub task_id: String,
    pub join: JoinHandle<TaskOutcome>,
}

/// Result of `submit_all`
#[derive(Debug, Default)]
pub struct SubmitReport {
    pub started: Vec<StartedTask>,
    pub failed: Vec<(FileId, String)>,
}

impl SubmitReport {
    /// Wait for every spawned tracker to stop
    pub async fn wait_all(self) -> Vec<(FileId, TaskOutcome)> {
        let (file_ids, joins): (Vec<_>, Vec<_>) = self
            .started
            .into_iter()
            .map(|task| (task.file_id, task.join))
            .unzip();

        let results = futures::future::join_all(joins).await;
        file_ids
            .into_iter()
            .zip(results)
            .map(|(file_id, result)| {
                let outcome = result.unwrap_or_else(|e| TaskOutcome::Errored {
                    reason: format!("tracker aborted: {e}"),
                });
                (file_id, outcome)
            })
            .collect()
    }
}

/// One rendered queue row
#[derive(Debug, Clone, PartialEq)]
pub struct QueueRow {
    pub file_id: FileId,
    pub name: String,
    pub size: String,
    pub status: UploadStatus,
    pub status_label: &'static str,
}

/// Rendered queue container
#[derive(Debug, Clone, PartialEq)]
pub struct QueueView {
    pub visible: bool,
    pub rows: Vec<QueueRow>,
}

struct QueueEntry {
    item: QueuedFile,
    handle: Option<TaskHandle>,
}

#[derive(Default)]
struct QueueInner {
    entries: Vec<QueueEntry>,
    visible: bool,
}

/// Upload queue shared by the UI and the task trackers
///
/// Cheap to clone; all clones share the same rows.
#[derive(Clone)]
pub struct UploadQueue {
    inner: Arc<Mutex<QueueInner>>,
    api: Arc<dyn TaskApi>,
    notifications: NotificationCenter,
    events: EventBus,
    policy: TrackerPolicy,
}

impl UploadQueue {
    pub fn new(
        api: Arc<dyn TaskApi>,
        notifications: NotificationCenter,
        events: EventBus,
        policy: TrackerPolicy,
    ) -> Self {
        Self {
            inner: Arc::new(Mutex::new(QueueInner::default())),
            api,
            notifications,
            events,
            policy,
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Validate and append files in arrival order
    ///
    /// Each rejected file produces exactly one error notification.
    pub fn add(&self, files: Vec<SelectedFile>, origin: SelectionOrigin) -> AddReport {
        let mut report = AddReport::default();
        let mut added = Vec::new();

        for file in files {
            if !has_allowed_extension(&file.name) {
                self.notifications.error(format!(
                    "{}: unsupported file type. Allowed: {}",
                    file.name,
                    ALLOWED_EXTENSIONS
                        .iter()
                        .map(|e| format!(".{e}"))
                        .collect::<Vec<_>>()
                        .join(", ")
                ));
                report.rejected.push(file.name);
                continue;
            }

            let item = QueuedFile {
                id: Uuid::new_v4(),
                display_name: file.name.clone(),
                size_bytes: file.size_bytes,
                status: UploadStatus::Queued,
                origin,
                task_id: None,
                attempt_count: 0,
                file,
            };
            report.accepted.push(item.id);
            added.push(item);
        }

        if !added.is_empty() {
            let mut inner = self.lock();
            for item in &added {
                inner.entries.push(QueueEntry {
                    item: item.clone(),
                    handle: None,
                });
            }
            inner.visible = true;
        }

        for item in added {
            debug!(file = %item.display_name, ?origin, "Queued file");
            self.events.emit_lossy(DashEvent::QueueItemAdded {
                file_id: item.id,
                display_name: item.display_name,
                size_bytes: item.size_bytes,
                timestamp: Utc::now(),
            });
        }
        report
    }

    /// Empty the queue, hide the container and stop every attached tracker
    pub fn clear(&self) -> usize {
        let removed = {
            let mut inner = self.lock();
            inner.visible = false;
            std::mem::take(&mut inner.entries)
        };

        for entry in &removed {
            if let Some(handle) = &entry.handle {
                handle.cancel();
            }
        }

        let count = removed.len();
        info!(removed = count, "Upload queue cleared");
        self.events.emit_lossy(DashEvent::QueueCleared {
            removed: count,
            timestamp: Utc::now(),
        });
        count
    }

    /// Remove one row, stopping its tracker; returns false if it was already gone
    pub fn remove(&self, file_id: FileId) -> bool {
        let removed = {
            let mut inner = self.lock();
            let Some(pos) = inner.entries.iter().position(|e| e.item.id == file_id) else {
                return false;
            };
            let entry = inner.entries.remove(pos);
            if inner.entries.is_empty() {
                inner.visible = false;
            }
            entry
        };

        if let Some(handle) = &removed.handle {
            handle.cancel();
        }
        self.events.emit_lossy(DashEvent::QueueItemRemoved {
            file_id,
            timestamp: Utc::now(),
        });
        true
    }

    pub fn items(&self) -> Vec<QueuedFile> {
        self.lock().entries.iter().map(|e| e.item.clone()).collect()
    }

    pub fn get(&self, file_id: FileId) -> Option<QueuedFile> {
        self.lock()
            .entries
            .iter()
            .find(|e| e.item.id == file_id)
            .map(|e| e.item.clone())
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the queue container is shown
    pub fn is_visible(&self) -> bool {
        self.lock().visible
    }

    pub fn view(&self) -> QueueView {
        let inner = self.lock();
        QueueView {
            visible: inner.visible,
            rows: inner
                .entries
                .iter()
                .map(|e| QueueRow {
                    file_id: e.item.id,
                    name: e.item.display_name.clone(),
                    size: format_file_size(e.item.size_bytes),
                    status: e.item.status,
                    status_label: e.item.status.label(),
                })
                .collect(),
        }
    }

    /// Submit every `queued` file and start one tracker per accepted submission
    ///
    /// A failure on one file marks that file `failed` and moves on to the next.
    pub async fn submit_all(&self, options: SubmitOptions) -> Result<SubmitReport> {
        // Claim every queued row under one lock so an overlapping call
        // finds nothing left to submit.
        let targets: Vec<(FileId, SelectedFile, String)> = {
            let mut inner = self.lock();
            inner
                .entries
                .iter_mut()
                .filter(|e| e.item.status == UploadStatus::Queued)
                .map(|e| {
                    e.item.status = UploadStatus::Submitting;
                    (e.item.id, e.item.file.clone(), e.item.display_name.clone())
                })
                .collect()
        };

        if targets.is_empty() {
            self.notifications.warning("Please select audio files to upload");
            return Err(Error::NoFilesQueued);
        }

        for (file_id, _, name) in &targets {
            self.events.emit_lossy(DashEvent::QueueItemStatusChanged {
                file_id: *file_id,
                display_name: name.clone(),
                old_status: UploadStatus::Queued,
                new_status: UploadStatus::Submitting,
                timestamp: Utc::now(),
            });
        }

        info!(files = targets.len(), priority = options.priority.as_str(), "Submitting uploads");
        let mut report = SubmitReport::default();

        for (file_id, file, name) in targets {
            if self.get(file_id).is_none() {
                debug!(file = %name, "Removed before submission");
                continue;
            }

            let submission = match file.read().await {
                Ok(bytes) => {
                    self.api
                        .submit_analysis(UploadRequest {
                            filename: name.clone(),
                            bytes,
                            lyrics: options.lyrics.clone(),
                            priority: options.priority,
                        })
                        .await
                }
                Err(e) => Err(e),
            };

            match submission {
                Ok(submitted) => {
                    let cancel = CancellationToken::new();
                    let handle =
                        TaskHandle::new(submitted.task_id.clone(), file_id, cancel.clone());
                    if !self.attach_task(file_id, handle) {
                        debug!(file = %name, "Removed during submission; tracker not started");
                        continue;
                    }

                    let tracker = TaskTracker::new(
                        self.clone(),
                        self.api.clone(),
                        self.notifications.clone(),
                        self.events.clone(),
                        self.policy.clone(),
                        file_id,
                        name,
                        submitted.task_id.clone(),
                        cancel,
                    );
                    report.started.push(StartedTask {
                        file_id,
                        task_id: submitted.task_id,
                        join: tokio::spawn(tracker.run()),
                    });
                }
                Err(e) => {
                    warn!(file = %name, error = %e, "Upload failed");
                    if self.update_status(file_id, UploadStatus::Failed) {
                        self.notifications.error(format!("Upload failed for {name}: {e}"));
                    }
                    report.failed.push((file_id, e.to_string()));
                }
            }
        }

        Ok(report)
    }

    // ------------------------------------------------------------------
    // Tracker-facing updates. Each returns false when the row is gone so
    // a detached tracker never mutates anything.
    // ------------------------------------------------------------------

    pub(crate) fn update_status(&self, file_id: FileId, status: UploadStatus) -> bool {
        let change = {
            let mut inner = self.lock();
            let Some(entry) = inner.entries.iter_mut().find(|e| e.item.id == file_id) else {
                return false;
            };
            let old = entry.item.status;
            entry.item.status = status;
            (old, entry.item.display_name.clone())
        };

        let (old_status, display_name) = change;
        if old_status != status {
            self.events.emit_lossy(DashEvent::QueueItemStatusChanged {
                file_id,
                display_name,
                old_status,
                new_status: status,
                timestamp: Utc::now(),
            });
        }
        true
    }

    fn attach_task(&self, file_id: FileId, handle: TaskHandle) -> bool {
        let mut inner = self.lock();
        let Some(entry) = inner.entries.iter_mut().find(|e| e.item.id == file_id) else {
            return false;
        };
        entry.item.task_id = Some(handle.task_id.clone());
        entry.item.attempt_count = 0;
        entry.handle = Some(handle);
        true
    }

    pub(crate) fn record_attempt(&self, file_id: FileId, attempt_count: u32) -> bool {
        let mut inner = self.lock();
        let Some(entry) = inner.entries.iter_mut().find(|e| e.item.id == file_id) else {
            return false;
        };
        entry.item.attempt_count = attempt_count;
        if let Some(handle) = entry.handle.as_mut() {
            handle.attempt_count = attempt_count;
        }
        true
    }

    /// Drop the task handle once its tracker has stopped
    pub(crate) fn detach_task(&self, file_id: FileId) {
        let mut inner = self.lock();
        if let Some(entry) = inner.entries.iter_mut().find(|e| e.item.id == file_id) {
            entry.handle = None;
        }
    }

    /// Remove a completed row after `delay`, unless it was removed or changed first
    pub(crate) fn schedule_auto_clear(&self, file_id: FileId, delay: Duration) {
        self.events.emit_lossy(DashEvent::AutoClearScheduled {
            file_id,
            delay_ms: delay.as_millis() as u64,
            timestamp: Utc::now(),
        });

        let queue = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let still_completed = queue
                .get(file_id)
                .map(|item| item.status == UploadStatus::Completed)
                .unwrap_or(false);
            if still_completed {
                debug!(%file_id, "Auto-clearing completed upload");
                queue.remove(file_id);
            }
        });
    }
}
