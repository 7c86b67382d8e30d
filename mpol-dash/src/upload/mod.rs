//! Upload queue and async task tracking
//!
//! Files are validated into the [`UploadQueue`]; `submit_all` posts each one
//! to the backend and hands the returned task id to a [`TaskTracker`], which
//! polls until the task reaches a terminal status.

pub mod queue;
pub mod tracker;

pub use queue::{
    AddReport, FileId, FileSource, QueueRow, QueueView, QueuedFile, SelectedFile, SelectionOrigin,
    StartedTask, SubmitOptions, SubmitReport, UploadQueue, ALLOWED_EXTENSIONS,
};
pub use tracker::{TaskHandle, TaskTracker, TrackerPolicy};
