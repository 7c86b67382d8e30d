//! Audio session controller
//!
//! Owns the single [`PlaybackSession`]. Each session gets a generation number
//! and a driver task that forwards media events back into the controller;
//! events carrying an old generation are dropped, so a torn-down session can
//! never move the state of its successor.

use super::media::{MediaBackend, MediaEvent};
use super::session::{PlaybackSession, ProgressView};
use super::MediaErrorKind;
use crate::notifications::NotificationCenter;
use chrono::Utc;
use mpol_common::api::AnalysisId;
use mpol_common::events::{DashEvent, EventBus, PlaybackState};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Default)]
struct ControllerInner {
    session: Option<PlaybackSession>,
    generation: u64,
    last_failure: Option<MediaErrorKind>,
}

/// Singleton playback controller
///
/// Cheap to clone; all clones control the same session.
#[derive(Clone)]
pub struct AudioSessionController {
    inner: Arc<Mutex<ControllerInner>>,
    backend: Arc<dyn MediaBackend>,
    notifications: NotificationCenter,
    events: EventBus,
    load_timeout: Duration,
}

impl AudioSessionController {
    pub fn new(
        backend: Arc<dyn MediaBackend>,
        notifications: NotificationCenter,
        events: EventBus,
        load_timeout: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ControllerInner::default())),
            backend,
            notifications,
            events,
            load_timeout,
        }
    }

    fn lock(&self) -> MutexGuard<'_, ControllerInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Start playing `analysis_id`, replacing any other session
    ///
    /// Calling `play` for the id already playing or paused toggles pause;
    /// for the id still loading it does nothing. Returns the resulting state.
    pub fn play(&self, analysis_id: AnalysisId) -> PlaybackState {
        let (generation, token, media_events) = {
            let mut inner = self.lock();

            let current = inner
                .session
                .as_ref()
                .filter(|s| s.analysis_id == analysis_id)
                .map(|s| s.state);
            match current {
                Some(PlaybackState::Playing | PlaybackState::Paused) => {
                    drop(inner);
                    return self.toggle_pause().unwrap_or(PlaybackState::Stopped);
                }
                Some(state @ (PlaybackState::Loading | PlaybackState::Ready)) => return state,
                _ => {}
            }

            self.teardown(&mut inner, PlaybackState::Stopped);

            inner.last_failure = None;
            inner.generation += 1;
            let generation = inner.generation;
            let token = CancellationToken::new();
            let handle = self.backend.load(analysis_id);

            inner.session = Some(PlaybackSession::new(
                analysis_id,
                generation,
                handle.control,
                token.clone(),
            ));
            info!(%analysis_id, generation, "Loading audio");
            self.emit_state(analysis_id, PlaybackState::Stopped, PlaybackState::Loading);
            self.emit_now_playing(Some(analysis_id));

            (generation, token, handle.events)
        };

        tokio::spawn(self.clone().drive(generation, token, media_events));
        PlaybackState::Loading
    }

    /// Pause if playing, resume if paused; None in any other state
    pub fn toggle_pause(&self) -> Option<PlaybackState> {
        let mut inner = self.lock();
        let session = inner.session.as_mut()?;

        let next = match session.state {
            PlaybackState::Playing => {
                session.control.pause();
                PlaybackState::Paused
            }
            PlaybackState::Paused => {
                session.control.play();
                PlaybackState::Playing
            }
            _ => return None,
        };

        let old = session.state;
        session.state = next;
        self.emit_state(session.analysis_id, old, next);
        Some(next)
    }

    /// Stop and release the current session; false if nothing was active
    pub fn stop(&self) -> bool {
        let mut inner = self.lock();
        self.teardown(&mut inner, PlaybackState::Stopped)
    }

    /// Seek to `fraction` of the duration
    ///
    /// Ignored before the duration is known and for non-finite input.
    /// Returns the new position in seconds.
    pub fn seek(&self, fraction: f64) -> Option<f64> {
        if !fraction.is_finite() {
            return None;
        }

        let mut inner = self.lock();
        let session = inner.session.as_mut()?;
        if !matches!(
            session.state,
            PlaybackState::Ready | PlaybackState::Playing | PlaybackState::Paused
        ) {
            return None;
        }
        let duration = session.duration?;

        let position = fraction.clamp(0.0, 1.0) * duration;
        session.position = position;
        session.control.seek(position);
        self.emit_progress(session.analysis_id, position, duration);
        Some(position)
    }

    pub fn state(&self) -> PlaybackState {
        self.lock()
            .session
            .as_ref()
            .map(|s| s.state)
            .unwrap_or(PlaybackState::Stopped)
    }

    /// Analysis marked "now playing" in result lists
    pub fn now_playing(&self) -> Option<AnalysisId> {
        self.lock().session.as_ref().map(|s| s.analysis_id)
    }

    pub fn progress(&self) -> Option<ProgressView> {
        self.lock().session.as_ref().and_then(|s| s.progress())
    }

    /// Why the most recent session ended in error; cleared by the next `play`
    pub fn last_failure(&self) -> Option<MediaErrorKind> {
        self.lock().last_failure
    }

    /// Release the session and move to `final_state`
    fn teardown(&self, inner: &mut ControllerInner, final_state: PlaybackState) -> bool {
        let Some(session) = inner.session.take() else {
            return false;
        };

        session.release();
        debug!(
            analysis_id = %session.analysis_id,
            generation = session.generation,
            "Released audio session"
        );
        if session.state != final_state {
            self.emit_state(session.analysis_id, session.state, final_state);
        }
        if final_state == PlaybackState::Errored {
            self.emit_state(session.analysis_id, PlaybackState::Errored, PlaybackState::Stopped);
        }
        self.emit_now_playing(None);
        true
    }

    /// Forward media events for one session generation until it ends
    async fn drive(
        self,
        generation: u64,
        token: CancellationToken,
        mut media_events: mpsc::UnboundedReceiver<MediaEvent>,
    ) {
        let watchdog = tokio::time::sleep(self.load_timeout);
        tokio::pin!(watchdog);
        let mut playable = false;

        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                _ = &mut watchdog, if !playable => {
                    warn!(
                        generation,
                        timeout_ms = self.load_timeout.as_millis() as u64,
                        "Audio load timed out"
                    );
                    self.fail(generation, MediaErrorKind::TimedOut);
                    break;
                }
                event = media_events.recv() => {
                    let Some(event) = event else {
                        self.fail(generation, MediaErrorKind::Aborted);
                        break;
                    };
                    if matches!(event, MediaEvent::CanPlay { .. }) {
                        playable = true;
                    }
                    if !self.apply(generation, event) {
                        break;
                    }
                }
            }
        }
    }

    /// Apply one media event; false when the session is finished
    fn apply(&self, generation: u64, event: MediaEvent) -> bool {
        let mut inner = self.lock();
        let Some(session) = inner.session.as_mut() else {
            return false;
        };
        if session.generation != generation {
            debug!(generation, current = session.generation, "Dropping stale media event");
            return false;
        }

        match event {
            MediaEvent::CanPlay { duration } => {
                if session.state != PlaybackState::Loading {
                    return true;
                }
                let duration = if duration.is_finite() && duration >= 0.0 {
                    duration
                } else {
                    0.0
                };
                session.duration = Some(duration);
                session.state = PlaybackState::Ready;
                self.emit_state(session.analysis_id, PlaybackState::Loading, PlaybackState::Ready);

                session.control.play();
                session.state = PlaybackState::Playing;
                self.emit_state(session.analysis_id, PlaybackState::Ready, PlaybackState::Playing);
                self.emit_progress(session.analysis_id, session.position, duration);
                true
            }
            MediaEvent::TimeUpdate { position } => {
                if session.state == PlaybackState::Playing && position.is_finite() {
                    let duration = session.duration.unwrap_or(0.0);
                    session.position = if duration > 0.0 {
                        position.clamp(0.0, duration)
                    } else {
                        position.max(0.0)
                    };
                    self.emit_progress(session.analysis_id, session.position, duration);
                }
                true
            }
            MediaEvent::Ended => {
                info!(analysis_id = %session.analysis_id, "Playback ended");
                self.teardown(&mut inner, PlaybackState::Stopped);
                false
            }
            MediaEvent::Error(kind) => {
                drop(inner);
                self.fail(generation, kind);
                false
            }
        }
    }

    fn fail(&self, generation: u64, kind: MediaErrorKind) {
        let mut inner = self.lock();
        let current = inner
            .session
            .as_ref()
            .map(|s| s.generation == generation)
            .unwrap_or(false);
        if !current {
            return;
        }

        warn!(generation, error = ?kind, "Playback failed");
        inner.last_failure = Some(kind);
        self.teardown(&mut inner, PlaybackState::Errored);
        drop(inner);
        self.notifications.error(kind.user_message());
    }

    fn emit_state(
        &self,
        analysis_id: AnalysisId,
        old_state: PlaybackState,
        new_state: PlaybackState,
    ) {
        self.events.emit_lossy(DashEvent::PlaybackStateChanged {
            analysis_id,
            old_state,
            new_state,
            timestamp: Utc::now(),
        });
    }

    fn emit_progress(&self, analysis_id: AnalysisId, position_seconds: f64, duration_seconds: f64) {
        self.events.emit_lossy(DashEvent::PlaybackProgress {
            analysis_id,
            position_seconds,
            duration_seconds,
            timestamp: Utc::now(),
        });
    }

    fn emit_now_playing(&self, analysis_id: Option<AnalysisId>) {
        self.events.emit_lossy(DashEvent::NowPlayingChanged {
            analysis_id,
            timestamp: Utc::now(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifications::NotificationConfig;
    use crate::playback::media::{media_channel, MediaEndpoint, MediaHandle};

    /// Backend that hands every endpoint to the test
    struct ChannelBackend {
        endpoints: Mutex<Vec<(AnalysisId, MediaEndpoint)>>,
    }

    impl MediaBackend for ChannelBackend {
        fn load(&self, analysis_id: AnalysisId) -> MediaHandle {
            let (handle, endpoint) = media_channel();
            self.endpoints.lock().unwrap().push((analysis_id, endpoint));
            handle
        }
    }

    fn controller() -> (AudioSessionController, Arc<ChannelBackend>) {
        let backend = Arc::new(ChannelBackend {
            endpoints: Mutex::new(Vec::new()),
        });
        let bus = EventBus::new(100);
        let notifications = NotificationCenter::new(bus.clone(), NotificationConfig::default());
        let controller = AudioSessionController::new(
            backend.clone(),
            notifications,
            bus,
            Duration::from_secs(10),
        );
        (controller, backend)
    }

    #[tokio::test]
    async fn test_toggle_and_seek_before_ready_are_ignored() {
        let (controller, _backend) = controller();
        assert_eq!(controller.toggle_pause(), None);

        controller.play(AnalysisId(1));
        assert_eq!(controller.state(), PlaybackState::Loading);
        assert_eq!(controller.toggle_pause(), None);
        assert_eq!(controller.seek(0.5), None);
    }

    #[tokio::test]
    async fn test_play_same_loading_id_is_noop() {
        let (controller, backend) = controller();
        controller.play(AnalysisId(1));
        assert_eq!(controller.play(AnalysisId(1)), PlaybackState::Loading);
        assert_eq!(backend.endpoints.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_stale_generation_events_dropped() {
        let (controller, _backend) = controller();
        controller.play(AnalysisId(1));
        controller.play(AnalysisId(2));

        assert!(!controller.apply(1, MediaEvent::CanPlay { duration: 10.0 }));
        assert_eq!(controller.state(), PlaybackState::Loading);
        assert_eq!(controller.now_playing(), Some(AnalysisId(2)));
    }

    #[tokio::test]
    async fn test_stop_without_session() {
        let (controller, _backend) = controller();
        assert!(!controller.stop());
        assert_eq!(controller.state(), PlaybackState::Stopped);
    }
}
