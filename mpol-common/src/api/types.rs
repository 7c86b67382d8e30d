//! Shared API request/response types
//!
//! Every response type tolerates missing fields (`#[serde(default)]`) so a
//! partially populated backend answer degrades to zero/empty values instead
//! of failing the whole read.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

// ========================================
// Analyses
// ========================================

/// Backend identifier of one analysis result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnalysisId(pub i64);

impl fmt::Display for AnalysisId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for AnalysisId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// One analysis result as listed by `GET /analyses`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRecord {
    pub id: AnalysisId,
    pub filename: String,
    /// Overall compliance score (0.0 to 1.0)
    #[serde(default)]
    pub compliance_score: f64,
    #[serde(default)]
    pub issues_count: u32,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub created_at: DateTime<Utc>,
}

/// `GET /analyses?limit&offset` response
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysesPage {
    #[serde(default)]
    pub analyses: Vec<AnalysisRecord>,
    #[serde(default)]
    pub total: Option<u64>,
    #[serde(default)]
    pub limit: Option<u64>,
    #[serde(default)]
    pub offset: Option<u64>,
}

/// `GET /analyses/{id}/lyrics` response, also the `PUT` body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LyricsResponse {
    #[serde(default)]
    pub analysis_id: Option<AnalysisId>,
    #[serde(default)]
    pub lyrics: String,
    /// "provided", "transcribed" or "edited"
    #[serde(default)]
    pub source: Option<String>,
}

/// Generic `{ message, status }` acknowledgement
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessageResponse {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub status: Option<String>,
}

/// Backend timestamps arrive either as RFC 3339 or as naive ISO 8601 (implicitly UTC)
fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {raw}")))
}

/// Parse an RFC 3339 or naive ISO 8601 timestamp
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
        .map(|naive| naive.and_utc())
}

// ========================================
// Async analysis tasks
// ========================================

/// Analysis priority sent with an upload
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Normal => "normal",
            Priority::High => "high",
        }
    }
}

impl std::str::FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "normal" => Ok(Priority::Normal),
            "high" => Ok(Priority::High),
            other => Err(format!("unknown priority '{other}' (expected low, normal or high)")),
        }
    }
}

/// `POST /analyze/async` response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSubmitted {
    pub task_id: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Backend task status values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Queued,
    Running,
    Processing,
    Completed,
    Failed,
}

impl TaskStatus {
    /// Whether the backend is still working on the task
    pub fn is_pending(&self) -> bool {
        matches!(self, TaskStatus::Queued | TaskStatus::Running | TaskStatus::Processing)
    }
}

/// `GET /tasks/{task_id}` response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskStatusResponse {
    pub status: TaskStatus,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

// ========================================
// Dashboard statistics
// ========================================

/// Average compliance per analysis category, in percent
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComplianceScores {
    pub copyright: f64,
    pub bias: f64,
    pub content_filter: f64,
}

/// Chart series: one label per value
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrendSeries {
    pub labels: Vec<String>,
    pub values: Vec<u64>,
}

/// `GET /dashboard-stats` response
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardStats {
    pub total_analyses: u64,
    pub compliance_scores: ComplianceScores,
    pub trend_data: TrendSeries,
    pub recent_analyses: u64,
    pub period: Option<String>,
}

// ========================================
// Compliance rules
// ========================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CopyrightRules {
    pub enabled: bool,
    pub similarity_threshold: f64,
}

impl Default for CopyrightRules {
    fn default() -> Self {
        Self {
            enabled: false,
            similarity_threshold: 0.7,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BiasDetection {
    pub enabled: bool,
    pub toxicity_threshold: f64,
    pub categories: Vec<String>,
}

impl Default for BiasDetection {
    fn default() -> Self {
        Self {
            enabled: false,
            toxicity_threshold: 0.4,
            categories: vec!["gender".to_string(), "race".to_string(), "age".to_string()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentFiltering {
    pub explicit_content: bool,
    pub explicit_content_threshold: f64,
    pub hate_speech: bool,
}

impl Default for ContentFiltering {
    fn default() -> Self {
        Self {
            explicit_content: false,
            explicit_content_threshold: 0.6,
            hate_speech: true,
        }
    }
}

/// `GET /rules` response and `POST /rules` body
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComplianceRules {
    pub copyright_rules: CopyrightRules,
    pub bias_detection: BiasDetection,
    pub content_filtering: ContentFiltering,
}

// ========================================
// System settings
// ========================================

/// `GET /settings` response (backend keys)
///
/// Unknown keys are preserved in `extra` so a round trip never drops data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemSettings {
    pub default_priority: Priority,
    pub auto_delete_days: u32,
    pub email_notifications: bool,
    pub api_rate_limit: u32,
    pub max_file_size_mb: u32,
    pub api_logging: bool,
    pub require_auth: bool,
    pub encrypt_files: bool,
    pub session_timeout_minutes: u32,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Default for SystemSettings {
    fn default() -> Self {
        Self {
            default_priority: Priority::Normal,
            auto_delete_days: 7,
            email_notifications: true,
            api_rate_limit: 100,
            max_file_size_mb: 100,
            api_logging: true,
            require_auth: true,
            encrypt_files: true,
            session_timeout_minutes: 60,
            extra: BTreeMap::new(),
        }
    }
}

impl SystemSettings {
    /// Body for `POST /settings`, which expects the form field names
    pub fn to_form_payload(&self) -> BTreeMap<&'static str, Value> {
        BTreeMap::from([
            ("default-priority", Value::from(self.default_priority.as_str())),
            ("auto-delete", Value::from(self.auto_delete_days)),
            ("email-notifications", Value::from(self.email_notifications)),
            ("rate-limit", Value::from(self.api_rate_limit)),
            ("max-file-size", Value::from(self.max_file_size_mb)),
            ("api-logging", Value::from(self.api_logging)),
            ("require-auth", Value::from(self.require_auth)),
            ("encrypt-files", Value::from(self.encrypt_files)),
            ("session-timeout", Value::from(self.session_timeout_minutes)),
        ])
    }
}

// ========================================
// Reports
// ========================================

/// Query parameters for `GET /reports/summary`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

/// `GET /reports/trends` response
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrendReport {
    pub labels: Vec<String>,
    pub analysis_counts: Vec<u64>,
    pub average_scores: Vec<f64>,
    pub issue_counts: Vec<u64>,
    pub period: Option<String>,
}

/// `POST /reports/export` body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportRequest {
    pub report_type: String,
    pub format: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis_type: Option<String>,
}

impl Default for ExportRequest {
    fn default() -> Self {
        Self {
            report_type: "compliance_summary".to_string(),
            format: "pdf".to_string(),
            start_date: None,
            end_date: None,
            analysis_type: None,
        }
    }
}

/// `POST /reports/export` response
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportResponse {
    pub report_type: String,
    pub format: String,
    pub download_url: Option<String>,
    pub exported_at: Option<String>,
    pub summary: Value,
    pub trends: Value,
}
