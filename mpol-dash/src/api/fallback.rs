//! Local defaults used when a backend read fails
//!
//! Everything returned here is tagged `DataOrigin::Fallback` by the caller
//! so views can mark it as sample data.

use chrono::{Duration, TimeZone, Utc};
use mpol_common::api::{AnalysisId, AnalysisRecord, DashboardStats, TrendReport};
use serde::Serialize;

/// Where a rendered dataset came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DataOrigin {
    #[default]
    Backend,
    Fallback,
}

impl DataOrigin {
    pub fn is_fallback(&self) -> bool {
        matches!(self, DataOrigin::Fallback)
    }
}

/// Banner text shown above views rendered from fallback data
pub const FALLBACK_BANNER: &str = "Backend unavailable - showing sample data";

/// Sample analyses shown when `GET /analyses` fails
pub fn sample_analyses() -> Vec<AnalysisRecord> {
    let base = Utc
        .with_ymd_and_hms(2024, 1, 15, 9, 30, 0)
        .single()
        .unwrap_or_else(Utc::now);

    [
        ("sample_pop_single.mp3", 0.92, 0),
        ("sample_hiphop_demo.wav", 0.64, 2),
        ("sample_rock_live.flac", 0.41, 4),
    ]
    .into_iter()
    .enumerate()
    .map(|(i, (filename, score, issues))| AnalysisRecord {
        id: AnalysisId(-(i as i64 + 1)),
        filename: filename.to_string(),
        compliance_score: score,
        issues_count: issues,
        created_at: base - Duration::hours(i as i64 * 6),
    })
    .collect()
}

/// Stats shown when `GET /dashboard-stats` fails (renders the empty state)
pub fn empty_stats() -> DashboardStats {
    DashboardStats::default()
}

/// Zero-filled trend series for the given window
pub fn empty_trends(days: u32) -> TrendReport {
    let today = Utc::now().date_naive();
    let labels: Vec<String> = (0..days)
        .rev()
        .map(|offset| (today - Duration::days(offset as i64)).format("%Y-%m-%d").to_string())
        .collect();
    let len = labels.len();

    TrendReport {
        labels,
        analysis_counts: vec![0; len],
        average_scores: vec![0.0; len],
        issue_counts: vec![0; len],
        period: Some(format!("last_{days}_days")),
    }
}
