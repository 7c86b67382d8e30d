//! Audio session controller integration tests

mod helpers;

use helpers::{drain, messages, notification_center, settle, ScriptedMedia};
use mpol_common::api::AnalysisId;
use mpol_common::events::{DashEvent, EventBus, NotificationLevel, PlaybackState};
use mpol_dash::playback::{AudioSessionController, MediaCommand, MediaErrorKind, MediaEvent};
use mpol_dash::notifications::NotificationCenter;
use std::sync::Arc;
use std::time::Duration;

fn controller(bus: &EventBus) -> (AudioSessionController, Arc<ScriptedMedia>, NotificationCenter) {
    let media = ScriptedMedia::new();
    let notifications = notification_center(bus);
    let controller = AudioSessionController::new(
        media.clone(),
        notifications.clone(),
        bus.clone(),
        Duration::from_secs(10),
    );
    (controller, media, notifications)
}

fn commands(endpoint: &mut mpol_dash::playback::MediaEndpoint) -> Vec<MediaCommand> {
    let mut out = Vec::new();
    while let Ok(command) = endpoint.commands.try_recv() {
        out.push(command);
    }
    out
}

#[tokio::test(start_paused = true)]
async fn test_play_starts_once_media_can_play() {
    let bus = EventBus::new(1000);
    let mut rx = bus.subscribe();
    let (controller, media, _) = controller(&bus);

    assert_eq!(controller.play(AnalysisId(3)), PlaybackState::Loading);
    assert_eq!(controller.now_playing(), Some(AnalysisId(3)));

    let mut endpoint = media.take(AnalysisId(3));
    endpoint.emit(MediaEvent::CanPlay { duration: 120.0 });
    settle().await;

    assert_eq!(controller.state(), PlaybackState::Playing);
    assert_eq!(commands(&mut endpoint), vec![MediaCommand::Play]);

    let states: Vec<_> = drain(&mut rx)
        .into_iter()
        .filter_map(|e| match e {
            DashEvent::PlaybackStateChanged { new_state, .. } => Some(new_state),
            _ => None,
        })
        .collect();
    assert_eq!(
        states,
        vec![PlaybackState::Loading, PlaybackState::Ready, PlaybackState::Playing]
    );
}

#[tokio::test(start_paused = true)]
async fn test_playing_another_analysis_tears_down_the_first() {
    // Given: analysis 3 is playing
    let bus = EventBus::new(1000);
    let (controller, media, _) = controller(&bus);
    controller.play(AnalysisId(3));
    let mut first = media.take(AnalysisId(3));
    first.emit(MediaEvent::CanPlay { duration: 60.0 });
    settle().await;
    commands(&mut first);

    // When: analysis 5 is played
    let state = controller.play(AnalysisId(5));
    settle().await;

    // Then: 3 is released, 5 is the only session and is loading
    assert_eq!(state, PlaybackState::Loading);
    assert_eq!(commands(&mut first), vec![MediaCommand::Release]);
    assert_eq!(controller.now_playing(), Some(AnalysisId(5)));
    assert_eq!(controller.state(), PlaybackState::Loading);
    assert_eq!(media.loads(), vec![AnalysisId(5)]);

    // Late events from the released media change nothing
    first.emit(MediaEvent::CanPlay { duration: 60.0 });
    first.emit(MediaEvent::Ended);
    settle().await;
    assert_eq!(controller.state(), PlaybackState::Loading);
    assert_eq!(controller.now_playing(), Some(AnalysisId(5)));
}

#[tokio::test(start_paused = true)]
async fn test_load_watchdog_errors_after_ten_seconds() {
    let bus = EventBus::new(1000);
    let (controller, media, notifications) = controller(&bus);
    controller.play(AnalysisId(9));
    let mut endpoint = media.take(AnalysisId(9));

    tokio::time::sleep(Duration::from_millis(9_900)).await;
    assert_eq!(controller.state(), PlaybackState::Loading);

    tokio::time::sleep(Duration::from_millis(200)).await;
    settle().await;
    assert_eq!(controller.state(), PlaybackState::Stopped);
    assert_eq!(controller.now_playing(), None);
    assert_eq!(commands(&mut endpoint), vec![MediaCommand::Release]);
    assert_eq!(
        messages(&notifications, NotificationLevel::Error),
        vec![MediaErrorKind::TimedOut.user_message()]
    );
}

#[tokio::test(start_paused = true)]
async fn test_media_errors_have_distinct_messages_and_recover() {
    let bus = EventBus::new(1000);
    let (controller, media, notifications) = controller(&bus);
    let kinds = [
        MediaErrorKind::Aborted,
        MediaErrorKind::Network,
        MediaErrorKind::Unsupported,
        MediaErrorKind::NotFound,
    ];

    for (i, kind) in kinds.iter().enumerate() {
        let id = AnalysisId(i as i64 + 1);
        controller.play(id);
        let endpoint = media.take(id);
        endpoint.emit(MediaEvent::Error(*kind));
        settle().await;
        assert_eq!(controller.state(), PlaybackState::Stopped);
        assert_eq!(controller.now_playing(), None);
        assert_eq!(controller.last_failure(), Some(*kind));
    }

    // A fresh session forgets the previous failure
    controller.play(AnalysisId(99));
    assert_eq!(controller.last_failure(), None);

    let mut errors = messages(&notifications, NotificationLevel::Error);
    assert_eq!(errors.len(), 4);
    errors.sort();
    errors.dedup();
    assert_eq!(errors.len(), 4, "each error kind has its own message");
}

#[tokio::test(start_paused = true)]
async fn test_toggle_pause_and_replay_same_id() {
    let bus = EventBus::new(1000);
    let (controller, media, _) = controller(&bus);
    controller.play(AnalysisId(2));
    let mut endpoint = media.take(AnalysisId(2));
    endpoint.emit(MediaEvent::CanPlay { duration: 30.0 });
    settle().await;
    commands(&mut endpoint);

    assert_eq!(controller.toggle_pause(), Some(PlaybackState::Paused));
    assert_eq!(controller.play(AnalysisId(2)), PlaybackState::Playing);
    assert_eq!(
        commands(&mut endpoint),
        vec![MediaCommand::Pause, MediaCommand::Play]
    );
    assert!(media.loads().is_empty(), "replaying the same id must not reload");
}

#[tokio::test(start_paused = true)]
async fn test_seek_clamps_and_ignores_non_finite() {
    let bus = EventBus::new(1000);
    let (controller, media, _) = controller(&bus);
    controller.play(AnalysisId(4));
    let mut endpoint = media.take(AnalysisId(4));
    endpoint.emit(MediaEvent::CanPlay { duration: 200.0 });
    settle().await;
    commands(&mut endpoint);

    assert_eq!(controller.seek(0.5), Some(100.0));
    assert_eq!(controller.seek(1.7), Some(200.0));
    assert_eq!(controller.seek(-3.0), Some(0.0));
    assert_eq!(controller.seek(f64::NAN), None);
    assert_eq!(controller.seek(f64::INFINITY), None);
    assert_eq!(
        commands(&mut endpoint),
        vec![MediaCommand::Seek(100.0), MediaCommand::Seek(200.0), MediaCommand::Seek(0.0)]
    );
}

#[tokio::test(start_paused = true)]
async fn test_progress_updates_while_playing() {
    let bus = EventBus::new(1000);
    let (controller, media, _) = controller(&bus);
    controller.play(AnalysisId(6));
    let endpoint = media.take(AnalysisId(6));
    endpoint.emit(MediaEvent::CanPlay { duration: 120.0 });
    endpoint.emit(MediaEvent::TimeUpdate { position: 30.0 });
    settle().await;

    let progress = controller.progress().unwrap();
    assert_eq!(progress.fraction, 0.25);
    assert_eq!(progress.elapsed, "0:30");
    assert_eq!(progress.total, "2:00");

    // Paused sessions ignore clock updates
    controller.toggle_pause();
    endpoint.emit(MediaEvent::TimeUpdate { position: 90.0 });
    settle().await;
    assert_eq!(controller.progress().unwrap().elapsed, "0:30");
}

#[tokio::test(start_paused = true)]
async fn test_ended_and_stop_clear_now_playing() {
    let bus = EventBus::new(1000);
    let mut rx = bus.subscribe();
    let (controller, media, _) = controller(&bus);

    controller.play(AnalysisId(7));
    let endpoint = media.take(AnalysisId(7));
    endpoint.emit(MediaEvent::CanPlay { duration: 5.0 });
    endpoint.emit(MediaEvent::Ended);
    settle().await;
    assert_eq!(controller.state(), PlaybackState::Stopped);
    assert_eq!(controller.now_playing(), None);

    controller.play(AnalysisId(8));
    assert!(controller.stop());
    assert!(!controller.stop());
    assert_eq!(controller.progress(), None);

    let now_playing: Vec<_> = drain(&mut rx)
        .into_iter()
        .filter_map(|e| match e {
            DashEvent::NowPlayingChanged { analysis_id, .. } => Some(analysis_id),
            _ => None,
        })
        .collect();
    assert_eq!(
        now_playing,
        vec![Some(AnalysisId(7)), None, Some(AnalysisId(8)), None]
    );
}
