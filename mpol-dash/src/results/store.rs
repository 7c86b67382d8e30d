//! Search and pagination state for the analysis list
//!
//! The store keeps the full record set, the filtered set derived from the
//! search term, the display mode and the current page. Every mutation
//! re-renders and bumps the view revision.
//!
//! Loads race: a list request issued earlier can answer after a later one.
//! `begin_load` hands out a ticket and `hydrate_if_current` only applies a
//! response whose ticket is still the newest.

use super::pagination::{calculate_pagination, RECENT_PREVIEW};
use super::view::{
    count_label, empty_message, ListBody, ListMode, ListView, PaginationControls, ResultRow,
};
use crate::api::fallback::DataOrigin;
use crate::notifications::NotificationCenter;
use chrono::Utc;
use mpol_common::api::{AnalysisId, AnalysisRecord};
use mpol_common::events::{DashEvent, EventBus};
use tracing::debug;

/// Token for one in-flight list load
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadTicket(u64);

pub struct ResultListStore {
    full: Vec<AnalysisRecord>,
    filtered: Vec<AnalysisRecord>,
    term: String,
    mode: ListMode,
    page: usize,
    origin: DataOrigin,
    now_playing: Option<AnalysisId>,
    revision: u64,
    load_epoch: u64,
    view: ListView,
    notifications: NotificationCenter,
    events: EventBus,
}

impl ResultListStore {
    pub fn new(notifications: NotificationCenter, events: EventBus) -> Self {
        let mut store = Self {
            full: Vec::new(),
            filtered: Vec::new(),
            term: String::new(),
            mode: ListMode::default(),
            page: 1,
            origin: DataOrigin::Backend,
            now_playing: None,
            revision: 0,
            load_epoch: 0,
            view: ListView {
                revision: 0,
                mode: ListMode::default(),
                body: ListBody::Empty {
                    message: empty_message(""),
                },
                count_label: count_label(0, 0, false),
                pagination: None,
                banner: None,
            },
            notifications,
            events,
        };
        store.render();
        store
    }

    /// Replace the record set with backend data
    pub fn hydrate(&mut self, records: Vec<AnalysisRecord>) -> &ListView {
        self.hydrate_from(records, DataOrigin::Backend)
    }

    /// Replace the record set, marking where it came from
    ///
    /// Invalidates every outstanding load ticket. The active search term is
    /// re-applied and the page resets to 1.
    pub fn hydrate_from(&mut self, records: Vec<AnalysisRecord>, origin: DataOrigin) -> &ListView {
        self.load_epoch += 1;
        self.filtered = filter_records(&records, &self.term);
        self.full = records;
        self.origin = origin;
        self.page = 1;
        self.render()
    }

    /// Start a list load; only the newest ticket may hydrate
    pub fn begin_load(&mut self) -> LoadTicket {
        self.load_epoch += 1;
        LoadTicket(self.load_epoch)
    }

    /// Apply a load response if no newer load or hydrate happened since
    pub fn hydrate_if_current(
        &mut self,
        ticket: LoadTicket,
        records: Vec<AnalysisRecord>,
        origin: DataOrigin,
    ) -> Option<&ListView> {
        if ticket.0 != self.load_epoch {
            debug!(ticket = ticket.0, current = self.load_epoch, "Discarding stale list response");
            return None;
        }
        Some(self.hydrate_from(records, origin))
    }

    /// Filter by case-insensitive filename substring or id substring
    pub fn search(&mut self, term: &str) -> &ListView {
        self.term = term.trim().to_string();
        self.filtered = filter_records(&self.full, &self.term);
        self.page = 1;

        if !self.term.is_empty() && self.filtered.is_empty() {
            self.notifications
                .info(format!("No analyses match \"{}\"", self.term));
        }
        self.render()
    }

    pub fn set_mode(&mut self, mode: ListMode) -> &ListView {
        self.mode = mode;
        self.page = 1;
        self.render()
    }

    /// Move by `delta` pages; false (and no re-render) when out of range or in recent mode
    pub fn change_page(&mut self, delta: i64) -> bool {
        if self.mode != ListMode::Paginated {
            return false;
        }
        let pagination = calculate_pagination(self.filtered.len(), self.page);
        match pagination.accepts(delta) {
            Some(page) => {
                self.page = page;
                self.render();
                true
            }
            None => false,
        }
    }

    /// Mark the row of the playing analysis
    pub fn set_now_playing(&mut self, analysis_id: Option<AnalysisId>) -> &ListView {
        self.now_playing = analysis_id;
        self.render()
    }

    pub fn view(&self) -> &ListView {
        &self.view
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn total_pages(&self) -> usize {
        calculate_pagination(self.filtered.len(), self.page).total_pages
    }

    pub fn mode(&self) -> ListMode {
        self.mode
    }

    pub fn term(&self) -> &str {
        &self.term
    }

    pub fn origin(&self) -> DataOrigin {
        self.origin
    }

    pub fn full(&self) -> &[AnalysisRecord] {
        &self.full
    }

    pub fn filtered(&self) -> &[AnalysisRecord] {
        &self.filtered
    }

    fn render(&mut self) -> &ListView {
        self.revision += 1;
        let searching = !self.term.is_empty();

        let (window, pagination) = match self.mode {
            ListMode::Recent => {
                let end = self.filtered.len().min(RECENT_PREVIEW);
                (&self.filtered[..end], None)
            }
            ListMode::Paginated => {
                let p = calculate_pagination(self.filtered.len(), self.page);
                self.page = p.page;
                (
                    &self.filtered[p.range(self.filtered.len())],
                    PaginationControls::for_pagination(&p),
                )
            }
        };

        let body = if self.filtered.is_empty() {
            ListBody::Empty {
                message: empty_message(&self.term),
            }
        } else {
            ListBody::Rows {
                rows: window
                    .iter()
                    .map(|r| ResultRow::from_record(r, self.now_playing))
                    .collect(),
            }
        };
        let shown = match &body {
            ListBody::Rows { rows } => rows.len(),
            ListBody::Empty { .. } => 0,
        };

        self.view = ListView {
            revision: self.revision,
            mode: self.mode,
            body,
            count_label: count_label(self.filtered.len(), self.full.len(), searching),
            pagination,
            banner: ListView::banner_for(self.origin),
        };

        self.events.emit_lossy(DashEvent::ListRendered {
            revision: self.revision,
            shown,
            filtered: self.filtered.len(),
            total: self.full.len(),
            timestamp: Utc::now(),
        });
        &self.view
    }
}

fn filter_records(records: &[AnalysisRecord], term: &str) -> Vec<AnalysisRecord> {
    if term.is_empty() {
        return records.to_vec();
    }
    let needle = term.to_lowercase();
    records
        .iter()
        .filter(|r| r.filename.to_lowercase().contains(&needle) || r.id.to_string().contains(term))
        .cloned()
        .collect()
}
