use super::error::PlaybackError;
use super::state::PlaybackBackend;
use crate::domain::audio::LocalTrackHandle;
use crate::domain::narration::JobStatus;

/// Where one playback session gets its audio from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackSource {
    OnDeviceVoice,
    LocalTrack(LocalTrackHandle),
    RemoteTrack(String),
}

impl PlaybackSource {
    pub fn backend(&self) -> PlaybackBackend {
        match self {
            PlaybackSource::OnDeviceVoice => PlaybackBackend::OnDeviceVoice,
            PlaybackSource::LocalTrack(_) => PlaybackBackend::LocalTrack,
            PlaybackSource::RemoteTrack(_) => PlaybackBackend::RemoteTrack,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlayOptions {
    /// Play the synthesized track even when the on-device voice is selected
    pub prefer_durable: bool,
}

impl PlayOptions {
    pub fn durable() -> Self {
        Self {
            prefer_durable: true,
        }
    }
}

/// Everything source selection looks at
#[derive(Debug, Clone, Copy)]
pub struct SourceContext<'a> {
    pub uses_on_device_voice: bool,
    /// Only handles that still resolve
    pub local_track: Option<LocalTrackHandle>,
    pub remote_key: Option<&'a str>,
    pub job_status: JobStatus,
}

impl SourceContext<'_> {
    fn track(&self) -> Option<PlaybackSource> {
        match (self.local_track, self.remote_key) {
            (Some(handle), _) => Some(PlaybackSource::LocalTrack(handle)),
            (None, Some(key)) => Some(PlaybackSource::RemoteTrack(key.to_string())),
            (None, None) => None,
        }
    }
}

/// Pick the backend for a `play()` call.
///
/// A local track always wins over the remote copy of the same audio.
pub fn select_source(
    context: &SourceContext<'_>,
    options: PlayOptions,
) -> Result<PlaybackSource, PlaybackError> {
    if options.prefer_durable {
        if let Some(track) = context.track() {
            return Ok(track);
        }
    }

    if context.uses_on_device_voice && !options.prefer_durable {
        return Ok(PlaybackSource::OnDeviceVoice);
    }

    if context.job_status == JobStatus::Ready {
        if let Some(track) = context.track() {
            return Ok(track);
        }
    }

    Err(PlaybackError::NoSource)
}
