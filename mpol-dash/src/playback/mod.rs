//! Single-session audio playback
//!
//! At most one analysis plays at a time. [`AudioSessionController`] owns the
//! session and drives it from the events of a [`MediaBackend`]; starting a new
//! session always tears the previous one down first.

pub mod controller;
pub mod media;
pub mod session;
pub mod stream;

pub use controller::AudioSessionController;
pub use media::{
    media_channel, MediaBackend, MediaCommand, MediaControl, MediaEndpoint, MediaEvent,
    MediaHandle,
};
pub use session::{PlaybackSession, ProgressView};
pub use stream::HttpMediaBackend;

use std::fmt;

/// Why a media resource could not be played
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaErrorKind {
    /// Loading was interrupted
    Aborted,
    /// The audio could not be fetched
    Network,
    /// Container or codec not supported
    Unsupported,
    /// No audio stored for this analysis
    NotFound,
    /// Never became playable within the load timeout
    TimedOut,
}

impl MediaErrorKind {
    /// Message shown to the user
    pub fn user_message(&self) -> &'static str {
        match self {
            MediaErrorKind::Aborted => "Audio playback was aborted",
            MediaErrorKind::Network => "Network error while loading audio",
            MediaErrorKind::Unsupported => "Audio format not supported",
            MediaErrorKind::NotFound => "Audio file not found for this analysis",
            MediaErrorKind::TimedOut => "Audio took too long to load",
        }
    }
}

impl fmt::Display for MediaErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.user_message())
    }
}
