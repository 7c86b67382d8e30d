//! Backend API boundary
//!
//! The analysis backend is reached only through these traits. `HttpBackend`
//! implements them over HTTP+JSON; tests substitute scripted in-memory
//! implementations.

pub mod client;
pub mod fallback;

pub use client::HttpBackend;

use crate::error::Result;
use async_trait::async_trait;
use mpol_common::api::{
    AnalysesPage, AnalysisId, ComplianceRules, DashboardStats, ExportRequest, ExportResponse,
    LyricsResponse, MessageResponse, Priority, ReportFilter, SystemSettings, TaskStatusResponse,
    TaskSubmitted, TrendReport,
};
use serde_json::Value;

/// One file upload for `POST /analyze/async`
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub filename: String,
    pub bytes: Vec<u8>,
    pub lyrics: Option<String>,
    pub priority: Priority,
}

/// Async analysis task endpoints used by the upload pipeline
#[async_trait]
pub trait TaskApi: Send + Sync {
    /// `POST /analyze/async`
    async fn submit_analysis(&self, upload: UploadRequest) -> Result<TaskSubmitted>;

    /// `GET /tasks/{task_id}`
    async fn task_status(&self, task_id: &str) -> Result<TaskStatusResponse>;
}

/// Read and write endpoints used by the dashboard views
#[async_trait]
pub trait DashboardApi: Send + Sync {
    /// `GET /dashboard-stats`
    async fn dashboard_stats(&self) -> Result<DashboardStats>;

    /// `GET /analyses?limit&offset`
    async fn list_analyses(&self, limit: u32, offset: u32) -> Result<AnalysesPage>;

    /// `GET /analyses/{id}`
    async fn analysis_details(&self, id: AnalysisId) -> Result<Value>;

    /// `GET /analyses/{id}/lyrics`
    async fn get_lyrics(&self, id: AnalysisId) -> Result<LyricsResponse>;

    /// `PUT /analyses/{id}/lyrics`
    async fn update_lyrics(&self, id: AnalysisId, lyrics: &str) -> Result<MessageResponse>;

    /// `GET /analyses/{id}/bias-details`
    async fn bias_details(&self, id: AnalysisId) -> Result<Value>;

    /// `GET /analyses/{id}/similarity-details`
    async fn similarity_details(&self, id: AnalysisId) -> Result<Value>;

    /// `GET /rules`
    async fn get_rules(&self) -> Result<ComplianceRules>;

    /// `POST /rules`
    async fn save_rules(&self, rules: &ComplianceRules) -> Result<MessageResponse>;

    /// `GET /settings`
    async fn get_settings(&self) -> Result<SystemSettings>;

    /// `POST /settings`
    async fn save_settings(&self, settings: &SystemSettings) -> Result<MessageResponse>;

    /// `GET /reports/summary`
    async fn report_summary(&self, filter: &ReportFilter) -> Result<Value>;

    /// `GET /reports/trends`
    async fn report_trends(&self, days: u32, analysis_type: Option<&str>) -> Result<TrendReport>;

    /// `POST /reports/export`
    async fn export_report(&self, request: &ExportRequest) -> Result<ExportResponse>;
}
