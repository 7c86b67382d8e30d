//! HTTP+JSON implementation of the backend API

use super::{DashboardApi, TaskApi, UploadRequest};
use crate::error::{Error, Result};
use async_trait::async_trait;
use mpol_common::api::{
    AnalysesPage, AnalysisId, ComplianceRules, DashboardStats, ExportRequest, ExportResponse,
    LyricsResponse, MessageResponse, ReportFilter, SystemSettings, TaskStatusResponse,
    TaskSubmitted, TrendReport,
};
use mpol_common::config::normalize_base_url;
use reqwest::multipart::{Form, Part};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::time::Duration;

const USER_AGENT: &str = concat!("mpol-dash/", env!("CARGO_PKG_VERSION"));

/// Backend client over reqwest
#[derive(Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Transport(format!("HTTP client setup failed: {e}")))?;
        Ok(Self::with_client(client, base_url))
    }

    pub fn with_client(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: normalize_base_url(base_url),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn http_client(&self) -> &reqwest::Client {
        &self.client
    }

    /// Absolute URL for an endpoint path beginning with `/`
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.send_json(self.client.get(self.url(path))).await
    }

    async fn send_json<T: DeserializeOwned>(&self, request: reqwest::RequestBuilder) -> Result<T> {
        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Http {
                status: status.as_u16(),
                message: error_detail(&body),
            });
        }

        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes)
            .map_err(|e| Error::Transport(format!("Invalid response body: {e}")))
    }
}

/// Extract `detail` from a JSON error body, else return the raw text
fn error_detail(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("detail").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}

#[async_trait]
impl TaskApi for HttpBackend {
    async fn submit_analysis(&self, upload: UploadRequest) -> Result<TaskSubmitted> {
        let size = upload.bytes.len();
        let part = Part::bytes(upload.bytes).file_name(upload.filename.clone());
        let mut form = Form::new()
            .part("file", part)
            .text("priority", upload.priority.as_str());
        if let Some(lyrics) = upload.lyrics.filter(|l| !l.trim().is_empty()) {
            form = form.text("lyrics", lyrics);
        }

        tracing::debug!(filename = %upload.filename, size, "Submitting analysis");
        let submitted: TaskSubmitted = self
            .send_json(self.client.post(self.url("/analyze/async")).multipart(form))
            .await?;
        tracing::info!(
            filename = %upload.filename,
            task_id = %submitted.task_id,
            "Analysis task started"
        );
        Ok(submitted)
    }

    async fn task_status(&self, task_id: &str) -> Result<TaskStatusResponse> {
        // Task ids embed the uploaded filename, so push as an encoded segment
        let mut url = reqwest::Url::parse(&self.url("/tasks"))
            .map_err(|e| Error::Transport(format!("Invalid backend URL: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| Error::Transport("Backend URL cannot carry a path".to_string()))?
            .push(task_id);
        self.send_json(self.client.get(url)).await
    }
}

#[async_trait]
impl DashboardApi for HttpBackend {
    async fn dashboard_stats(&self) -> Result<DashboardStats> {
        self.get_json("/dashboard-stats").await
    }

    async fn list_analyses(&self, limit: u32, offset: u32) -> Result<AnalysesPage> {
        self.send_json(
            self.client
                .get(self.url("/analyses"))
                .query(&[("limit", limit), ("offset", offset)]),
        )
        .await
    }

    async fn analysis_details(&self, id: AnalysisId) -> Result<Value> {
        self.get_json(&format!("/analyses/{id}")).await
    }

    async fn get_lyrics(&self, id: AnalysisId) -> Result<LyricsResponse> {
        self.get_json(&format!("/analyses/{id}/lyrics")).await
    }

    async fn update_lyrics(&self, id: AnalysisId, lyrics: &str) -> Result<MessageResponse> {
        self.send_json(
            self.client
                .put(self.url(&format!("/analyses/{id}/lyrics")))
                .json(&json!({ "lyrics": lyrics })),
        )
        .await
    }

    async fn bias_details(&self, id: AnalysisId) -> Result<Value> {
        self.get_json(&format!("/analyses/{id}/bias-details")).await
    }

    async fn similarity_details(&self, id: AnalysisId) -> Result<Value> {
        self.get_json(&format!("/analyses/{id}/similarity-details")).await
    }

    async fn get_rules(&self) -> Result<ComplianceRules> {
        self.get_json("/rules").await
    }

    async fn save_rules(&self, rules: &ComplianceRules) -> Result<MessageResponse> {
        self.send_json(self.client.post(self.url("/rules")).json(rules))
            .await
    }

    async fn get_settings(&self) -> Result<SystemSettings> {
        self.get_json("/settings").await
    }

    async fn save_settings(&self, settings: &SystemSettings) -> Result<MessageResponse> {
        self.send_json(
            self.client
                .post(self.url("/settings"))
                .json(&settings.to_form_payload()),
        )
        .await
    }

    async fn report_summary(&self, filter: &ReportFilter) -> Result<Value> {
        self.send_json(self.client.get(self.url("/reports/summary")).query(filter))
            .await
    }

    async fn report_trends(&self, days: u32, analysis_type: Option<&str>) -> Result<TrendReport> {
        let mut request = self
            .client
            .get(self.url("/reports/trends"))
            .query(&[("days", days)]);
        if let Some(kind) = analysis_type {
            request = request.query(&[("analysis_type", kind)]);
        }
        self.send_json(request).await
    }

    async fn export_report(&self, request: &ExportRequest) -> Result<ExportResponse> {
        self.send_json(self.client.post(self.url("/reports/export")).json(request))
            .await
    }
}
