//! mpol-dash library - Music Police dashboard control layer
//!
//! Client-side orchestration for the compliance dashboard: the upload queue
//! and its task trackers, single-session audio playback, the searchable
//! analysis list and user notifications, all driven by a
//! [`DashboardController`] over the analysis backend's HTTP API.

pub mod api;
pub mod dashboard;
pub mod error;
pub mod notifications;
pub mod playback;
pub mod results;
pub mod rules;
pub mod settings_cache;
pub mod upload;

pub use dashboard::{Backends, DashboardController, Section, SectionView};
pub use error::{Error, Result};

use api::HttpBackend;
use mpol_common::config::ResolvedConfig;
use mpol_common::events::EventBus;
use playback::HttpMediaBackend;
use settings_cache::SettingsCache;
use std::sync::Arc;

/// Build a dashboard talking to the configured backend over HTTP
pub fn connect(config: &ResolvedConfig, events: EventBus) -> Result<DashboardController> {
    let http = Arc::new(HttpBackend::new(&config.backend_url, config.tuning.http_timeout())?);
    let media = Arc::new(HttpMediaBackend::new(
        http.http_client().clone(),
        &config.backend_url,
    ));

    let backends = Backends {
        dashboard: http.clone(),
        tasks: http,
        media,
    };
    Ok(DashboardController::new(
        backends,
        &config.tuning,
        SettingsCache::new(&config.settings_cache_path),
        events,
    ))
}
