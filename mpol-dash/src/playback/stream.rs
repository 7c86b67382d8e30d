//! Headless HTTP media backend
//!
//! Fetches `GET /analyses/{id}/audio`, probes the bytes with symphonia to
//! learn the duration and confirm a decoder exists, then runs a playback
//! clock that reports position while playing. No audio device is opened.

use super::media::{
    media_channel, MediaBackend, MediaCommand, MediaEndpoint, MediaEvent, MediaHandle,
};
use super::MediaErrorKind;
use mpol_common::api::AnalysisId;
use mpol_common::config::normalize_base_url;
use std::io::Cursor;
use std::time::Duration;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Clock tick while playing
const TICK: Duration = Duration::from_millis(250);

/// Media backend over the analysis audio endpoint
#[derive(Clone)]
pub struct HttpMediaBackend {
    client: reqwest::Client,
    base_url: String,
}

impl HttpMediaBackend {
    pub fn new(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: normalize_base_url(base_url),
        }
    }

    fn audio_url(&self, analysis_id: AnalysisId) -> String {
        format!("{}/analyses/{}/audio", self.base_url, analysis_id)
    }
}

impl MediaBackend for HttpMediaBackend {
    fn load(&self, analysis_id: AnalysisId) -> MediaHandle {
        let (handle, endpoint) = media_channel();
        let request = self.client.get(self.audio_url(analysis_id));
        tokio::spawn(run_stream(analysis_id, request, endpoint));
        handle
    }
}

async fn run_stream(
    analysis_id: AnalysisId,
    request: reqwest::RequestBuilder,
    mut endpoint: MediaEndpoint,
) {
    let loaded = tokio::select! {
        result = fetch_and_probe(request) => result,
        command = endpoint.commands.recv() => {
            // Released (or dropped) before the audio arrived
            debug!(%analysis_id, ?command, "Audio load abandoned");
            return;
        }
    };

    let duration = match loaded {
        Ok(duration) => duration,
        Err(kind) => {
            warn!(%analysis_id, error = ?kind, "Audio load failed");
            endpoint.emit(MediaEvent::Error(kind));
            return;
        }
    };

    debug!(%analysis_id, duration, "Audio ready");
    if !endpoint.emit(MediaEvent::CanPlay { duration }) {
        return;
    }
    run_clock(duration, endpoint).await;
}

async fn fetch_and_probe(request: reqwest::RequestBuilder) -> Result<f64, MediaErrorKind> {
    let response = request.send().await.map_err(|_| MediaErrorKind::Network)?;
    match response.status() {
        s if s.is_success() => {}
        reqwest::StatusCode::NOT_FOUND => return Err(MediaErrorKind::NotFound),
        reqwest::StatusCode::UNSUPPORTED_MEDIA_TYPE => return Err(MediaErrorKind::Unsupported),
        _ => return Err(MediaErrorKind::Network),
    }

    let hint = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let bytes = response.bytes().await.map_err(|_| MediaErrorKind::Network)?;

    tokio::task::spawn_blocking(move || probe_duration(bytes.to_vec(), hint.as_deref()))
        .await
        .map_err(|_| MediaErrorKind::Aborted)?
}

/// Duration in seconds of an in-memory audio file
pub fn probe_duration(bytes: Vec<u8>, mime_type: Option<&str>) -> Result<f64, MediaErrorKind> {
    let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());

    let mut hint = Hint::new();
    if let Some(mime) = mime_type {
        hint.mime_type(mime);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|_| MediaErrorKind::Unsupported)?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or(MediaErrorKind::Unsupported)?;
    let track_id = track.id;
    let params = track.codec_params.clone();

    symphonia::default::get_codecs()
        .make(&params, &DecoderOptions::default())
        .map_err(|_| MediaErrorKind::Unsupported)?;

    if let (Some(frames), Some(rate)) = (params.n_frames, params.sample_rate) {
        if rate > 0 {
            return Ok(frames as f64 / rate as f64);
        }
    }

    // No frame count in the header: sum packet durations instead
    let time_base = params.time_base.ok_or(MediaErrorKind::Unsupported)?;
    let mut total_ts: u64 = 0;
    while let Ok(packet) = format.next_packet() {
        if packet.track_id() == track_id {
            total_ts += packet.dur;
        }
    }
    let time = time_base.calc_time(total_ts);
    Ok(time.seconds as f64 + time.frac)
}

/// Advance the playback clock until ended or released
async fn run_clock(duration: f64, mut endpoint: MediaEndpoint) {
    let mut position = 0.0_f64;
    let mut playing_since: Option<Instant> = None;
    let mut ticker = tokio::time::interval(TICK);

    loop {
        tokio::select! {
            command = endpoint.commands.recv() => match command {
                Some(MediaCommand::Play) => {
                    if playing_since.is_none() {
                        playing_since = Some(Instant::now());
                    }
                }
                Some(MediaCommand::Pause) => {
                    if let Some(since) = playing_since.take() {
                        position += since.elapsed().as_secs_f64();
                    }
                }
                Some(MediaCommand::Seek(target)) => {
                    position = target.clamp(0.0, duration);
                    if playing_since.is_some() {
                        playing_since = Some(Instant::now());
                    }
                }
                Some(MediaCommand::Release) | None => return,
            },
            _ = ticker.tick(), if playing_since.is_some() => {
                let current = playing_since
                    .map(|since| position + since.elapsed().as_secs_f64())
                    .unwrap_or(position);
                if current >= duration {
                    endpoint.emit(MediaEvent::TimeUpdate { position: duration });
                    endpoint.emit(MediaEvent::Ended);
                    return;
                }
                if !endpoint.emit(MediaEvent::TimeUpdate { position: current }) {
                    return;
                }
            }
        }
    }
}
