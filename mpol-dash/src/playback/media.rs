//! Media backend seam
//!
//! A backend turns an analysis id into a [`MediaHandle`]: a command side the
//! controller drives and an event side the backend reports on. Both sides are
//! plain tokio channels, so tests can script a backend by holding the
//! [`MediaEndpoint`].

use super::MediaErrorKind;
use mpol_common::api::AnalysisId;
use tokio::sync::mpsc;

/// Commands sent to a loaded media resource
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MediaCommand {
    Play,
    Pause,
    /// Absolute position in seconds
    Seek(f64),
    Release,
}

/// Events reported by a media resource
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MediaEvent {
    /// Playable; total duration in seconds
    CanPlay { duration: f64 },
    TimeUpdate { position: f64 },
    Ended,
    Error(MediaErrorKind),
}

/// Command side of a media resource
#[derive(Debug, Clone)]
pub struct MediaControl {
    commands: mpsc::UnboundedSender<MediaCommand>,
}

impl MediaControl {
    pub fn play(&self) {
        self.send(MediaCommand::Play);
    }

    pub fn pause(&self) {
        self.send(MediaCommand::Pause);
    }

    pub fn seek(&self, position: f64) {
        self.send(MediaCommand::Seek(position));
    }

    pub fn release(&self) {
        self.send(MediaCommand::Release);
    }

    fn send(&self, command: MediaCommand) {
        // Closed channel means the resource already shut down
        let _ = self.commands.send(command);
    }
}

/// Controller's view of one loaded resource
#[derive(Debug)]
pub struct MediaHandle {
    pub control: MediaControl,
    pub events: mpsc::UnboundedReceiver<MediaEvent>,
}

/// Backend's view of one loaded resource
#[derive(Debug)]
pub struct MediaEndpoint {
    pub commands: mpsc::UnboundedReceiver<MediaCommand>,
    pub events: mpsc::UnboundedSender<MediaEvent>,
}

impl MediaEndpoint {
    /// Report an event; false once the controller stopped listening
    pub fn emit(&self, event: MediaEvent) -> bool {
        self.events.send(event).is_ok()
    }
}

/// Connected handle/endpoint pair
pub fn media_channel() -> (MediaHandle, MediaEndpoint) {
    let (command_tx, command_rx) = mpsc::unbounded_channel();
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    (
        MediaHandle {
            control: MediaControl {
                commands: command_tx,
            },
            events: event_rx,
        },
        MediaEndpoint {
            commands: command_rx,
            events: event_tx,
        },
    )
}

/// Source of playable media for analyses
pub trait MediaBackend: Send + Sync {
    /// Begin acquiring the audio for `analysis_id`
    ///
    /// Must return immediately; readiness and failures arrive as events.
    fn load(&self, analysis_id: AnalysisId) -> MediaHandle;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_channel_pair_is_connected() {
        let (mut handle, mut endpoint) = media_channel();

        handle.control.seek(12.5);
        assert_eq!(endpoint.commands.recv().await, Some(MediaCommand::Seek(12.5)));

        assert!(endpoint.emit(MediaEvent::Ended));
        assert_eq!(handle.events.recv().await, Some(MediaEvent::Ended));
    }

    #[test]
    fn test_emit_after_handle_dropped() {
        let (handle, endpoint) = media_channel();
        drop(handle);
        assert!(!endpoint.emit(MediaEvent::TimeUpdate { position: 1.0 }));
    }
}
