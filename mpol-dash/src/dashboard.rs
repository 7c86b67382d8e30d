//! Dashboard controller
//!
//! Routes section navigation to backend reads and owns the long-lived
//! components: notifications, upload queue, playback controller and result
//! list store. Reads that fail fall back to marked local data with a warning;
//! writes that fail surface an error notification and are not retried.

use crate::api::fallback::{self, DataOrigin, FALLBACK_BANNER};
use crate::api::{DashboardApi, TaskApi};
use crate::error::{Error, Result};
use crate::notifications::{NotificationCenter, NotificationConfig};
use crate::playback::{AudioSessionController, MediaBackend};
use crate::results::{ListMode, ListView, ResultListStore};
use crate::rules::RulesForm;
use crate::settings_cache::SettingsCache;
use crate::upload::{
    AddReport, QueueView, SelectedFile, SelectionOrigin, SubmitOptions, SubmitReport,
    TrackerPolicy, UploadQueue,
};
use mpol_common::api::{
    AnalysisId, ComplianceRules, ComplianceScores, DashboardStats, ExportRequest, ExportResponse,
    LyricsResponse, ReportFilter, SystemSettings, TrendReport, TrendSeries,
};
use mpol_common::config::TuningConfig;
use mpol_common::events::{DashEvent, EventBus, PlaybackState, TaskOutcome};
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Records requested per analyses load
pub const ANALYSES_FETCH_LIMIT: u32 = 100;

/// Trend window used by the reports section
pub const REPORT_TREND_DAYS: u32 = 30;

/// Top-level dashboard sections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Section {
    #[default]
    Dashboard,
    Upload,
    Analyses,
    Rules,
    Settings,
    Reports,
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Section::Dashboard => "dashboard",
            Section::Upload => "upload",
            Section::Analyses => "analyses",
            Section::Rules => "rules",
            Section::Settings => "settings",
            Section::Reports => "reports",
        };
        f.write_str(name)
    }
}

impl FromStr for Section {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "dashboard" => Ok(Section::Dashboard),
            "upload" => Ok(Section::Upload),
            "analyses" => Ok(Section::Analyses),
            "rules" => Ok(Section::Rules),
            "settings" => Ok(Section::Settings),
            "reports" => Ok(Section::Reports),
            other => Err(Error::Validation(format!("Unknown section: {other}"))),
        }
    }
}

/// Dashboard statistics ready for display
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatsView {
    pub total_analyses: u64,
    pub recent_analyses: u64,
    pub scores: ComplianceScores,
    pub trend: TrendSeries,
    /// Nothing analysed yet; render the explicit empty state
    pub empty: bool,
    pub origin: DataOrigin,
    pub banner: Option<&'static str>,
}

impl StatsView {
    pub fn new(stats: DashboardStats, origin: DataOrigin) -> Self {
        Self {
            empty: stats.total_analyses == 0,
            total_analyses: stats.total_analyses,
            recent_analyses: stats.recent_analyses,
            scores: stats.compliance_scores,
            trend: stats.trend_data,
            origin,
            banner: origin.is_fallback().then_some(FALLBACK_BANNER),
        }
    }
}

/// Where displayed settings came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SettingsOrigin {
    Backend,
    Cache,
    Defaults,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SettingsView {
    pub settings: SystemSettings,
    pub origin: SettingsOrigin,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RulesView {
    pub form: RulesForm,
    pub origin: DataOrigin,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReportsView {
    pub summary: Value,
    pub trends: TrendReport,
    pub origin: DataOrigin,
}

/// Content of the section just navigated to
#[derive(Debug, Clone, PartialEq)]
pub enum SectionView {
    Dashboard { stats: StatsView, recent: ListView },
    Upload { queue: QueueView },
    Analyses { list: ListView },
    Rules(RulesView),
    Settings(SettingsView),
    Reports(ReportsView),
}

/// Backend seams the dashboard is built on
#[derive(Clone)]
pub struct Backends {
    pub dashboard: Arc<dyn DashboardApi>,
    pub tasks: Arc<dyn TaskApi>,
    pub media: Arc<dyn MediaBackend>,
}

/// Owner of all dashboard state
#[derive(Clone)]
pub struct DashboardController {
    api: Arc<dyn DashboardApi>,
    notifications: NotificationCenter,
    queue: UploadQueue,
    player: AudioSessionController,
    results: Arc<Mutex<ResultListStore>>,
    settings_cache: SettingsCache,
    section: Arc<Mutex<Section>>,
    events: EventBus,
    shutdown: CancellationToken,
}

impl DashboardController {
    pub fn new(
        backends: Backends,
        tuning: &TuningConfig,
        settings_cache: SettingsCache,
        events: EventBus,
    ) -> Self {
        let notifications =
            NotificationCenter::new(events.clone(), NotificationConfig::from(tuning));
        let queue = UploadQueue::new(
            backends.tasks,
            notifications.clone(),
            events.clone(),
            TrackerPolicy::from(tuning),
        );
        let player = AudioSessionController::new(
            backends.media,
            notifications.clone(),
            events.clone(),
            tuning.load_timeout(),
        );
        let results = ResultListStore::new(notifications.clone(), events.clone());

        Self {
            api: backends.dashboard,
            notifications,
            queue,
            player,
            results: Arc::new(Mutex::new(results)),
            settings_cache,
            section: Arc::new(Mutex::new(Section::default())),
            events,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn notifications(&self) -> &NotificationCenter {
        &self.notifications
    }

    pub fn queue(&self) -> &UploadQueue {
        &self.queue
    }

    pub fn player(&self) -> &AudioSessionController {
        &self.player
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn section(&self) -> Section {
        *self.section.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn results(&self) -> MutexGuard<'_, ResultListStore> {
        self.results.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Current result list rendering
    pub fn list_view(&self) -> ListView {
        self.results().view().clone()
    }

    /// Switch section and perform its reads
    pub async fn navigate(&self, section: Section) -> SectionView {
        *self.section.lock().unwrap_or_else(|p| p.into_inner()) = section;
        info!(%section, "Navigating");

        match section {
            Section::Dashboard => {
                self.results().set_mode(ListMode::Recent);
                let (stats, recent) = tokio::join!(self.load_stats(), self.reload_analyses());
                SectionView::Dashboard { stats, recent }
            }
            Section::Upload => SectionView::Upload {
                queue: self.queue.view(),
            },
            Section::Analyses => {
                self.results().set_mode(ListMode::Paginated);
                SectionView::Analyses {
                    list: self.reload_analyses().await,
                }
            }
            Section::Rules => SectionView::Rules(self.load_rules().await),
            Section::Settings => SectionView::Settings(self.load_settings().await),
            Section::Reports => {
                SectionView::Reports(self.load_reports(&ReportFilter::default()).await)
            }
        }
    }

    /// Fetch analyses into the result list, discarding superseded responses
    pub async fn reload_analyses(&self) -> ListView {
        let ticket = self.results().begin_load();

        let (records, origin) = match self.api.list_analyses(ANALYSES_FETCH_LIMIT, 0).await {
            Ok(page) => (page.analyses, DataOrigin::Backend),
            Err(e) => {
                self.fallback_warning("analyses", &e);
                (fallback::sample_analyses(), DataOrigin::Fallback)
            }
        };

        let mut store = self.results();
        if store.hydrate_if_current(ticket, records, origin).is_none() {
            debug!("Newer analyses load in flight; keeping current list");
        }
        store.view().clone()
    }

    pub async fn load_stats(&self) -> StatsView {
        match self.api.dashboard_stats().await {
            Ok(stats) => StatsView::new(stats, DataOrigin::Backend),
            Err(e) => {
                self.fallback_warning("dashboard statistics", &e);
                StatsView::new(fallback::empty_stats(), DataOrigin::Fallback)
            }
        }
    }

    // ------------------------------------------------------------------
    // Result list
    // ------------------------------------------------------------------

    pub fn search(&self, term: &str) -> ListView {
        self.results().search(term).clone()
    }

    pub fn set_list_mode(&self, mode: ListMode) -> ListView {
        self.results().set_mode(mode).clone()
    }

    /// Returns the new view, or None when the page change was out of range
    pub fn change_page(&self, delta: i64) -> Option<ListView> {
        let mut store = self.results();
        store.change_page(delta).then(|| store.view().clone())
    }

    // ------------------------------------------------------------------
    // Uploads
    // ------------------------------------------------------------------

    pub fn add_files(&self, files: Vec<SelectedFile>, origin: SelectionOrigin) -> AddReport {
        self.queue.add(files, origin)
    }

    pub async fn submit_uploads(&self, options: SubmitOptions) -> Result<SubmitReport> {
        self.queue.submit_all(options).await
    }

    // ------------------------------------------------------------------
    // Playback
    // ------------------------------------------------------------------

    pub fn play(&self, analysis_id: AnalysisId) -> PlaybackState {
        let state = self.player.play(analysis_id);
        self.results().set_now_playing(self.player.now_playing());
        state
    }

    pub fn stop_playback(&self) -> bool {
        let stopped = self.player.stop();
        self.results().set_now_playing(None);
        stopped
    }

    // ------------------------------------------------------------------
    // Rules and settings
    // ------------------------------------------------------------------

    pub async fn load_rules(&self) -> RulesView {
        match self.api.get_rules().await {
            Ok(rules) => RulesView {
                form: RulesForm::from_rules(&rules),
                origin: DataOrigin::Backend,
            },
            Err(e) => {
                self.fallback_warning("compliance rules", &e);
                RulesView {
                    form: RulesForm::from_rules(&ComplianceRules::default()),
                    origin: DataOrigin::Fallback,
                }
            }
        }
    }

    /// Persist the enabled categories of `form`
    pub async fn save_rules(&self, form: &RulesForm) -> Result<ComplianceRules> {
        let rules = form.to_rules();
        match self.api.save_rules(&rules).await {
            Ok(_) => {
                info!(enabled = form.enabled_categories().len(), "Compliance rules saved");
                self.notifications.success("Compliance rules saved");
                Ok(rules)
            }
            Err(e) => Err(self.write_failed("save compliance rules", e)),
        }
    }

    /// Backend settings, else the local cache, else built-in defaults
    pub async fn load_settings(&self) -> SettingsView {
        match self.api.get_settings().await {
            Ok(settings) => {
                if let Err(e) = self.settings_cache.store(&settings).await {
                    warn!(error = %e, "Could not update settings cache");
                }
                SettingsView {
                    settings,
                    origin: SettingsOrigin::Backend,
                }
            }
            Err(e) => {
                warn!(error = %e, "Settings unavailable from backend");
                match self.settings_cache.load().await {
                    Some(settings) => {
                        self.notifications
                            .warning("Backend unavailable - showing cached settings");
                        SettingsView {
                            settings,
                            origin: SettingsOrigin::Cache,
                        }
                    }
                    None => {
                        self.notifications
                            .warning("Backend unavailable - showing default settings");
                        SettingsView {
                            settings: SystemSettings::default(),
                            origin: SettingsOrigin::Defaults,
                        }
                    }
                }
            }
        }
    }

    pub async fn save_settings(&self, settings: &SystemSettings) -> Result<()> {
        match self.api.save_settings(settings).await {
            Ok(_) => {
                if let Err(e) = self.settings_cache.store(settings).await {
                    warn!(error = %e, "Could not update settings cache");
                }
                self.notifications.success("Settings saved");
                Ok(())
            }
            Err(e) => Err(self.write_failed("save settings", e)),
        }
    }

    // ------------------------------------------------------------------
    // Analysis details
    // ------------------------------------------------------------------

    pub async fn analysis_details(&self, id: AnalysisId) -> Result<Value> {
        self.api
            .analysis_details(id)
            .await
            .map_err(|e| self.read_failed("analysis details", e))
    }

    pub async fn lyrics(&self, id: AnalysisId) -> Result<LyricsResponse> {
        self.api
            .get_lyrics(id)
            .await
            .map_err(|e| self.read_failed("lyrics", e))
    }

    pub async fn update_lyrics(&self, id: AnalysisId, lyrics: &str) -> Result<()> {
        match self.api.update_lyrics(id, lyrics).await {
            Ok(_) => {
                self.notifications.success("Lyrics updated");
                Ok(())
            }
            Err(e) => Err(self.write_failed("update lyrics", e)),
        }
    }

    pub async fn bias_details(&self, id: AnalysisId) -> Result<Value> {
        self.api
            .bias_details(id)
            .await
            .map_err(|e| self.read_failed("bias details", e))
    }

    pub async fn similarity_details(&self, id: AnalysisId) -> Result<Value> {
        self.api
            .similarity_details(id)
            .await
            .map_err(|e| self.read_failed("similarity details", e))
    }

    // ------------------------------------------------------------------
    // Reports
    // ------------------------------------------------------------------

    pub async fn load_reports(&self, filter: &ReportFilter) -> ReportsView {
        let (summary, trends) = tokio::join!(
            self.api.report_summary(filter),
            self.api
                .report_trends(REPORT_TREND_DAYS, filter.analysis_type.as_deref())
        );

        match (summary, trends) {
            (Ok(summary), Ok(trends)) => ReportsView {
                summary,
                trends,
                origin: DataOrigin::Backend,
            },
            (summary, trends) => {
                if let Some(e) = summary.as_ref().err().or(trends.as_ref().err()) {
                    self.fallback_warning("reports", e);
                }
                ReportsView {
                    summary: summary.unwrap_or_else(|_| Value::Object(Default::default())),
                    trends: trends.unwrap_or_else(|_| fallback::empty_trends(REPORT_TREND_DAYS)),
                    origin: DataOrigin::Fallback,
                }
            }
        }
    }

    pub async fn export_report(&self, request: &ExportRequest) -> Result<ExportResponse> {
        match self.api.export_report(request).await {
            Ok(response) => {
                let message = match &response.download_url {
                    Some(url) => format!("Report exported: {url}"),
                    None => "Report exported".to_string(),
                };
                self.notifications.success(message);
                Ok(response)
            }
            Err(e) => Err(self.write_failed("export report", e)),
        }
    }

    // ------------------------------------------------------------------
    // Event wiring
    // ------------------------------------------------------------------

    /// Keep the result list in step with playback and completed uploads
    ///
    /// Runs until [`shutdown`](Self::shutdown) is called.
    pub fn spawn_event_pump(&self) -> JoinHandle<()> {
        let mut rx = self.events.subscribe();
        let this = self.clone();

        tokio::spawn(async move {
            loop {
                let event = tokio::select! {
                    _ = this.shutdown.cancelled() => break,
                    event = rx.recv() => event,
                };
                match event {
                    Ok(DashEvent::NowPlayingChanged { analysis_id, .. }) => {
                        this.results().set_now_playing(analysis_id);
                    }
                    Ok(DashEvent::TaskFinished {
                        outcome: TaskOutcome::Completed,
                        task_id,
                        ..
                    }) => {
                        debug!(%task_id, "Refreshing analyses after completed task");
                        this.reload_analyses().await;
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Dashboard event pump lagged");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            debug!("Dashboard event pump stopped");
        })
    }

    /// Stop background work: event pump, upload trackers and playback
    pub fn shutdown(&self) {
        self.shutdown.cancel();
        self.queue.clear();
        self.player.stop();
    }

    fn fallback_warning(&self, what: &str, error: &Error) {
        warn!(error = %error, "Falling back to local {what}");
        self.notifications
            .warning(format!("Could not load {what} ({error}); showing sample data"));
    }

    fn read_failed(&self, what: &str, error: Error) -> Error {
        warn!(error = %error, "Failed to load {what}");
        self.notifications
            .error(format!("Could not load {what}: {error}"));
        error
    }

    fn write_failed(&self, action: &str, error: Error) -> Error {
        warn!(error = %error, "Failed to {action}");
        self.notifications
            .error(format!("Failed to {action}: {error}"));
        error
    }
}
