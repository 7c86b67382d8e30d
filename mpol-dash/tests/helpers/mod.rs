//! Test helpers for mpol-dash
//!
//! In-memory backends with scripted responses, plus small constructors for
//! the components under test.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use mpol_common::api::{
    AnalysesPage, AnalysisId, AnalysisRecord, ComplianceRules, DashboardStats, ExportRequest,
    ExportResponse, LyricsResponse, MessageResponse, ReportFilter, SystemSettings,
    TaskStatus, TaskStatusResponse, TaskSubmitted, TrendReport,
};
use mpol_common::events::{DashEvent, EventBus, NotificationLevel};
use mpol_dash::api::{DashboardApi, TaskApi, UploadRequest};
use mpol_dash::notifications::{NotificationCenter, NotificationConfig};
use mpol_dash::playback::{media_channel, MediaBackend, MediaEndpoint, MediaHandle};
use mpol_dash::upload::{SelectedFile, TrackerPolicy, UploadQueue};
use mpol_dash::{Error, Result};
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, oneshot};

// ========================================
// Records
// ========================================

pub fn record(id: i64, filename: &str) -> AnalysisRecord {
    AnalysisRecord {
        id: AnalysisId(id),
        filename: filename.to_string(),
        compliance_score: 0.85,
        issues_count: 0,
        created_at: Utc
            .with_ymd_and_hms(2024, 5, 1, 10, 0, 0)
            .single()
            .unwrap(),
    }
}

pub fn records(count: i64) -> Vec<AnalysisRecord> {
    (1..=count).map(|i| record(i, &format!("track_{i:02}.mp3"))).collect()
}

pub fn audio(name: &str) -> SelectedFile {
    SelectedFile::from_bytes(name, vec![0u8; 64])
}

// ========================================
// Notifications
// ========================================

/// Notification center that keeps every message visible for the whole test
pub fn notification_center(bus: &EventBus) -> NotificationCenter {
    NotificationCenter::new(
        bus.clone(),
        NotificationConfig {
            max_visible: 100,
            lifetime: Duration::from_secs(3600),
            error_lifetime: Duration::from_secs(3600),
        },
    )
}

/// All messages currently visible or waiting, at `level`
pub fn messages(center: &NotificationCenter, level: NotificationLevel) -> Vec<String> {
    center
        .visible()
        .into_iter()
        .chain(center.pending())
        .filter(|n| n.level == level)
        .map(|n| n.message)
        .collect()
}

/// Drain every event received so far
pub fn drain(rx: &mut broadcast::Receiver<DashEvent>) -> Vec<DashEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

// ========================================
// Task API
// ========================================

/// Scripted `TaskApi`
///
/// Each task id answers from its own script; the last entry repeats once the
/// script runs out. Submissions are accepted unless the filename was marked
/// to fail.
#[derive(Default)]
pub struct ScriptedTaskApi {
    scripts: Mutex<HashMap<String, VecDeque<std::result::Result<TaskStatus, String>>>>,
    polls: Mutex<HashMap<String, u32>>,
    failing_uploads: Mutex<Vec<String>>,
    submitted: Mutex<Vec<(String, Option<String>, String)>>,
    submit_delay: Mutex<Option<Duration>>,
}

impl ScriptedTaskApi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Task id assigned to an uploaded filename
    pub fn task_id_for(filename: &str) -> String {
        format!("task_{filename}")
    }

    pub fn script(&self, task_id: &str, statuses: &[TaskStatus]) {
        self.scripts.lock().unwrap().insert(
            task_id.to_string(),
            statuses.iter().copied().map(Ok).collect(),
        );
    }

    /// Script a transport failure after the given statuses
    pub fn script_then_error(&self, task_id: &str, statuses: &[TaskStatus], error: &str) {
        let mut script: VecDeque<_> = statuses.iter().copied().map(Ok).collect();
        script.push_back(Err(error.to_string()));
        self.scripts.lock().unwrap().insert(task_id.to_string(), script);
    }

    pub fn fail_upload(&self, filename: &str) {
        self.failing_uploads.lock().unwrap().push(filename.to_string());
    }

    /// Make every upload take `delay` before the backend answers
    pub fn slow_uploads(&self, delay: Duration) {
        *self.submit_delay.lock().unwrap() = Some(delay);
    }

    pub fn polls(&self, task_id: &str) -> u32 {
        self.polls.lock().unwrap().get(task_id).copied().unwrap_or(0)
    }

    /// `(filename, lyrics, priority)` of every accepted upload, in order
    pub fn submitted(&self) -> Vec<(String, Option<String>, String)> {
        self.submitted.lock().unwrap().clone()
    }
}

#[async_trait]
impl TaskApi for ScriptedTaskApi {
    async fn submit_analysis(&self, upload: UploadRequest) -> Result<TaskSubmitted> {
        let delay = *self.submit_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing_uploads.lock().unwrap().contains(&upload.filename) {
            return Err(Error::Http {
                status: 500,
                message: "Analysis failed".to_string(),
            });
        }
        self.submitted.lock().unwrap().push((
            upload.filename.clone(),
            upload.lyrics.clone(),
            upload.priority.as_str().to_string(),
        ));
        Ok(TaskSubmitted {
            task_id: Self::task_id_for(&upload.filename),
            status: Some("started".to_string()),
            message: None,
        })
    }

    async fn task_status(&self, task_id: &str) -> Result<TaskStatusResponse> {
        *self.polls.lock().unwrap().entry(task_id.to_string()).or_insert(0) += 1;

        let next = {
            let mut scripts = self.scripts.lock().unwrap();
            let script = scripts.entry(task_id.to_string()).or_default();
            if script.len() > 1 {
                script.pop_front()
            } else {
                script.front().cloned()
            }
        };

        match next.unwrap_or(Ok(TaskStatus::Running)) {
            Ok(status) => Ok(TaskStatusResponse {
                status,
                filename: None,
                error: (status == TaskStatus::Failed).then(|| "Analysis crashed".to_string()),
            }),
            Err(message) => Err(Error::Transport(message)),
        }
    }
}

pub fn upload_queue(
    api: Arc<ScriptedTaskApi>,
    bus: &EventBus,
) -> (UploadQueue, NotificationCenter) {
    let notifications = notification_center(bus);
    let queue = UploadQueue::new(api, notifications.clone(), bus.clone(), TrackerPolicy::default());
    (queue, notifications)
}

// ========================================
// Dashboard API
// ========================================

type Gate = Option<oneshot::Receiver<()>>;

/// Scripted `DashboardApi`
///
/// Every read succeeds with canned data unless `offline` is set. List loads
/// can be queued with a gate so a test controls the order responses arrive.
#[derive(Default)]
pub struct MockDashboardApi {
    pub offline: Mutex<bool>,
    pub analyses: Mutex<Vec<AnalysisRecord>>,
    list_queue: Mutex<VecDeque<(Gate, Vec<AnalysisRecord>)>>,
    pub stats: Mutex<DashboardStats>,
    pub rules: Mutex<ComplianceRules>,
    pub saved_rules: Mutex<Vec<ComplianceRules>>,
    pub settings: Mutex<SystemSettings>,
    pub saved_settings: Mutex<Vec<SystemSettings>>,
    pub lyrics: Mutex<HashMap<i64, String>>,
    pub reject_writes: Mutex<bool>,
    pub list_calls: Mutex<u32>,
}

impl MockDashboardApi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_offline(&self, offline: bool) {
        *self.offline.lock().unwrap() = offline;
    }

    pub fn set_analyses(&self, records: Vec<AnalysisRecord>) {
        *self.analyses.lock().unwrap() = records;
    }

    /// Queue one list response that is held until the returned sender fires
    pub fn queue_gated_list(&self, records: Vec<AnalysisRecord>) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.list_queue.lock().unwrap().push_back((Some(rx), records));
        tx
    }

    /// Queue one list response answered immediately
    pub fn queue_list(&self, records: Vec<AnalysisRecord>) {
        self.list_queue.lock().unwrap().push_back((None, records));
    }

    fn check_online(&self) -> Result<()> {
        if *self.offline.lock().unwrap() {
            Err(Error::Transport("connection refused".to_string()))
        } else {
            Ok(())
        }
    }

    fn check_write(&self) -> Result<()> {
        self.check_online()?;
        if *self.reject_writes.lock().unwrap() {
            Err(Error::Http {
                status: 500,
                message: "write rejected".to_string(),
            })
        } else {
            Ok(())
        }
    }

    fn ok() -> MessageResponse {
        MessageResponse {
            message: "ok".to_string(),
            status: Some("success".to_string()),
        }
    }
}

#[async_trait]
impl DashboardApi for MockDashboardApi {
    async fn dashboard_stats(&self) -> Result<DashboardStats> {
        self.check_online()?;
        Ok(self.stats.lock().unwrap().clone())
    }

    async fn list_analyses(&self, limit: u32, offset: u32) -> Result<AnalysesPage> {
        *self.list_calls.lock().unwrap() += 1;
        let queued = self.list_queue.lock().unwrap().pop_front();
        let analyses = match queued {
            Some((gate, records)) => {
                if let Some(gate) = gate {
                    let _ = gate.await;
                }
                records
            }
            None => {
                self.check_online()?;
                self.analyses.lock().unwrap().clone()
            }
        };
        Ok(AnalysesPage {
            total: Some(analyses.len() as u64),
            analyses,
            limit: Some(limit as u64),
            offset: Some(offset as u64),
        })
    }

    async fn analysis_details(&self, id: AnalysisId) -> Result<Value> {
        self.check_online()?;
        Ok(json!({ "id": id.0, "filename": "details.mp3" }))
    }

    async fn get_lyrics(&self, id: AnalysisId) -> Result<LyricsResponse> {
        self.check_online()?;
        let lyrics = self.lyrics.lock().unwrap().get(&id.0).cloned();
        match lyrics {
            Some(lyrics) => Ok(LyricsResponse {
                analysis_id: Some(id),
                lyrics,
                source: Some("provided".to_string()),
            }),
            None => Err(Error::Http {
                status: 404,
                message: "Analysis not found".to_string(),
            }),
        }
    }

    async fn update_lyrics(&self, id: AnalysisId, lyrics: &str) -> Result<MessageResponse> {
        self.check_write()?;
        self.lyrics.lock().unwrap().insert(id.0, lyrics.to_string());
        Ok(Self::ok())
    }

    async fn bias_details(&self, id: AnalysisId) -> Result<Value> {
        self.check_online()?;
        Ok(json!({ "analysis_id": id.0, "bias_score": 0.1 }))
    }

    async fn similarity_details(&self, id: AnalysisId) -> Result<Value> {
        self.check_online()?;
        Ok(json!({ "analysis_id": id.0, "matches": [] }))
    }

    async fn get_rules(&self) -> Result<ComplianceRules> {
        self.check_online()?;
        Ok(self.rules.lock().unwrap().clone())
    }

    async fn save_rules(&self, rules: &ComplianceRules) -> Result<MessageResponse> {
        self.check_write()?;
        self.saved_rules.lock().unwrap().push(rules.clone());
        Ok(Self::ok())
    }

    async fn get_settings(&self) -> Result<SystemSettings> {
        self.check_online()?;
        Ok(self.settings.lock().unwrap().clone())
    }

    async fn save_settings(&self, settings: &SystemSettings) -> Result<MessageResponse> {
        self.check_write()?;
        self.saved_settings.lock().unwrap().push(settings.clone());
        Ok(Self::ok())
    }

    async fn report_summary(&self, _filter: &ReportFilter) -> Result<Value> {
        self.check_online()?;
        Ok(json!({ "total_analyses": 3 }))
    }

    async fn report_trends(&self, days: u32, _analysis_type: Option<&str>) -> Result<TrendReport> {
        self.check_online()?;
        Ok(TrendReport {
            labels: vec!["2024-05-01".to_string()],
            analysis_counts: vec![3],
            average_scores: vec![0.8],
            issue_counts: vec![1],
            period: Some(format!("last_{days}_days")),
        })
    }

    async fn export_report(&self, request: &ExportRequest) -> Result<ExportResponse> {
        self.check_write()?;
        Ok(ExportResponse {
            report_type: request.report_type.clone(),
            format: request.format.clone(),
            download_url: Some(format!("/api/reports/download/report.{}", request.format)),
            ..ExportResponse::default()
        })
    }
}

// ========================================
// Media backend
// ========================================

/// Media backend whose resources are driven by the test
#[derive(Default)]
pub struct ScriptedMedia {
    endpoints: Mutex<Vec<(AnalysisId, MediaEndpoint)>>,
}

impl ScriptedMedia {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn loads(&self) -> Vec<AnalysisId> {
        self.endpoints.lock().unwrap().iter().map(|(id, _)| *id).collect()
    }

    /// Take the endpoint of the most recent load of `id`
    pub fn take(&self, id: AnalysisId) -> MediaEndpoint {
        let mut endpoints = self.endpoints.lock().unwrap();
        let pos = endpoints
            .iter()
            .rposition(|(loaded, _)| *loaded == id)
            .expect("media was never loaded");
        endpoints.remove(pos).1
    }
}

impl MediaBackend for ScriptedMedia {
    fn load(&self, analysis_id: AnalysisId) -> MediaHandle {
        let (handle, endpoint) = media_channel();
        self.endpoints.lock().unwrap().push((analysis_id, endpoint));
        handle
    }
}

/// Let spawned tasks run until they block
pub async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}
