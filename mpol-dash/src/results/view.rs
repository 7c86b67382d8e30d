//! Render model for the analysis result list

use super::pagination::Pagination;
use crate::api::fallback::{DataOrigin, FALLBACK_BANNER};
use mpol_common::api::{AnalysisId, AnalysisRecord};
use serde::Serialize;

/// Which slice of the filtered set is shown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ListMode {
    /// First few rows, no pagination controls (dashboard overview)
    #[default]
    Recent,
    /// Page-sized window with controls (analyses section)
    Paginated,
}

/// Score band used for row styling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoreBand {
    Good,
    Fair,
    Poor,
}

impl ScoreBand {
    pub fn from_score(score: f64) -> Self {
        if score >= 0.8 {
            ScoreBand::Good
        } else if score >= 0.5 {
            ScoreBand::Fair
        } else {
            ScoreBand::Poor
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultRow {
    pub id: AnalysisId,
    pub filename: String,
    pub score_label: String,
    pub band: ScoreBand,
    pub issues_count: u32,
    pub created_at: String,
    pub now_playing: bool,
}

impl ResultRow {
    pub fn from_record(record: &AnalysisRecord, now_playing: Option<AnalysisId>) -> Self {
        let score = if record.compliance_score.is_finite() {
            record.compliance_score.clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self {
            id: record.id,
            filename: record.filename.clone(),
            score_label: format!("{:.0}%", score * 100.0),
            band: ScoreBand::from_score(score),
            issues_count: record.issues_count,
            created_at: record.created_at.format("%Y-%m-%d %H:%M").to_string(),
            now_playing: now_playing == Some(record.id),
        }
    }
}

/// Previous/next controls, present only when there is more than one page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PaginationControls {
    pub page: usize,
    pub total_pages: usize,
    pub has_previous: bool,
    pub has_next: bool,
}

impl PaginationControls {
    pub fn for_pagination(p: &Pagination) -> Option<Self> {
        (p.total_pages > 1).then(|| Self {
            page: p.page,
            total_pages: p.total_pages,
            has_previous: p.page > 1,
            has_next: p.page < p.total_pages,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ListBody {
    Rows { rows: Vec<ResultRow> },
    Empty { message: String },
}

/// One rendering of the result list
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListView {
    pub revision: u64,
    pub mode: ListMode,
    pub body: ListBody,
    pub count_label: String,
    pub pagination: Option<PaginationControls>,
    pub banner: Option<&'static str>,
}

impl ListView {
    pub fn rows(&self) -> &[ResultRow] {
        match &self.body {
            ListBody::Rows { rows } => rows,
            ListBody::Empty { .. } => &[],
        }
    }

    pub fn row_ids(&self) -> Vec<AnalysisId> {
        self.rows().iter().map(|r| r.id).collect()
    }

    pub fn is_empty(&self) -> bool {
        matches!(self.body, ListBody::Empty { .. })
    }

    pub(crate) fn banner_for(origin: DataOrigin) -> Option<&'static str> {
        origin.is_fallback().then_some(FALLBACK_BANNER)
    }
}

/// `"{n} of {total} analyses"` while searching, `"{total} analyses"` otherwise
pub fn count_label(filtered: usize, total: usize, searching: bool) -> String {
    let noun = if total == 1 { "analysis" } else { "analyses" };
    if searching {
        format!("{filtered} of {total} {noun}")
    } else {
        format!("{total} {noun}")
    }
}

pub(crate) fn empty_message(term: &str) -> String {
    if term.is_empty() {
        "No analyses yet. Upload an audio file to get started.".to_string()
    } else {
        format!("No analyses match \"{term}\"")
    }
}
