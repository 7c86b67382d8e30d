//! Playback session state and progress rendering

use super::media::MediaControl;
use mpol_common::api::AnalysisId;
use mpol_common::events::PlaybackState;
use mpol_common::human_time::format_clock;
use tokio_util::sync::CancellationToken;

/// The one live playback session
#[derive(Debug)]
pub struct PlaybackSession {
    pub analysis_id: AnalysisId,
    pub state: PlaybackState,
    pub position: f64,
    /// Known once the media reported it can play
    pub duration: Option<f64>,
    pub(crate) generation: u64,
    pub(crate) control: MediaControl,
    pub(crate) driver: CancellationToken,
}

impl PlaybackSession {
    pub(crate) fn new(
        analysis_id: AnalysisId,
        generation: u64,
        control: MediaControl,
        driver: CancellationToken,
    ) -> Self {
        Self {
            analysis_id,
            state: PlaybackState::Loading,
            position: 0.0,
            duration: None,
            generation,
            control,
            driver,
        }
    }

    /// Release the media and stop the event driver
    pub(crate) fn release(&self) {
        self.control.release();
        self.driver.cancel();
    }

    pub fn progress(&self) -> Option<ProgressView> {
        self.duration
            .map(|duration| ProgressView::new(self.position, duration))
    }
}

/// Progress bar model
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressView {
    /// Played fraction in [0, 1]
    pub fraction: f64,
    pub elapsed: String,
    pub total: String,
    pub position_seconds: f64,
    pub duration_seconds: f64,
}

impl ProgressView {
    pub fn new(position: f64, duration: f64) -> Self {
        let fraction = if duration.is_finite() && duration > 0.0 && position.is_finite() {
            (position / duration).clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self {
            fraction,
            elapsed: format_clock(position),
            total: format_clock(duration),
            position_seconds: position,
            duration_seconds: duration,
        }
    }
}
