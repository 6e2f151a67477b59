use crate::domain::audio::LocalTrackHandle;
use crate::domain::narration::JobStatus;
use serde::Serialize;

/// Which backend a playback session uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackBackend {
    OnDeviceVoice,
    LocalTrack,
    RemoteTrack,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackStatus {
    #[default]
    Idle,
    Playing,
    Error,
}

/// Snapshot of one narration item, as seen by observers
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NarrationState {
    pub job_status: JobStatus,
    pub is_creating_audio: bool,
    pub playback_status: PlaybackStatus,
    pub is_playing: bool,
    pub backend: Option<PlaybackBackend>,
    pub uses_on_device_voice: bool,
    /// Derived: a local or remote track is known
    pub has_audio_file: bool,
    #[serde(skip)]
    pub local_track: Option<LocalTrackHandle>,
    pub remote_key: Option<String>,
    pub units_total: usize,
    pub units_completed: usize,
    pub units_failed: usize,
    pub is_persisting: bool,
    pub error: Option<String>,
    /// Non-blocking problems, e.g. the track could not be saved
    pub warning: Option<String>,
}

/// Partial update merged into the current state.
///
/// `None` leaves a field untouched; for optional fields `Some(None)` clears.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StateUpdate {
    pub job_status: Option<JobStatus>,
    pub is_creating_audio: Option<bool>,
    pub playback_status: Option<PlaybackStatus>,
    pub is_playing: Option<bool>,
    pub backend: Option<Option<PlaybackBackend>>,
    pub uses_on_device_voice: Option<bool>,
    pub local_track: Option<Option<LocalTrackHandle>>,
    pub remote_key: Option<Option<String>>,
    pub units_total: Option<usize>,
    pub units_completed: Option<usize>,
    pub units_failed: Option<usize>,
    pub is_persisting: Option<bool>,
    pub error: Option<Option<String>>,
    pub warning: Option<Option<String>>,
}

impl StateUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    /// A session started on `backend`
    pub fn playing(backend: PlaybackBackend) -> Self {
        Self {
            playback_status: Some(PlaybackStatus::Playing),
            is_playing: Some(true),
            backend: Some(Some(backend)),
            error: Some(None),
            ..Self::default()
        }
    }

    /// The session ended, was stopped, or was torn down
    pub fn stopped() -> Self {
        Self {
            playback_status: Some(PlaybackStatus::Idle),
            is_playing: Some(false),
            backend: Some(None),
            ..Self::default()
        }
    }

    pub fn playback_failed(message: impl Into<String>) -> Self {
        Self {
            playback_status: Some(PlaybackStatus::Error),
            is_playing: Some(false),
            backend: Some(None),
            error: Some(Some(message.into())),
            ..Self::default()
        }
    }

    pub fn job_status(mut self, status: JobStatus) -> Self {
        self.job_status = Some(status);
        self
    }

    pub fn creating(mut self, creating: bool) -> Self {
        self.is_creating_audio = Some(creating);
        self
    }

    pub fn on_device_voice(mut self, enabled: bool) -> Self {
        self.uses_on_device_voice = Some(enabled);
        self
    }

    pub fn local_track(mut self, handle: Option<LocalTrackHandle>) -> Self {
        self.local_track = Some(handle);
        self
    }

    pub fn remote_key(mut self, key: Option<String>) -> Self {
        self.remote_key = Some(key);
        self
    }

    pub fn progress(mut self, total: usize, completed: usize, failed: usize) -> Self {
        self.units_total = Some(total);
        self.units_completed = Some(completed);
        self.units_failed = Some(failed);
        self
    }

    pub fn persisting(mut self, persisting: bool) -> Self {
        self.is_persisting = Some(persisting);
        self
    }

    pub fn error(mut self, error: Option<String>) -> Self {
        self.error = Some(error);
        self
    }

    pub fn warning(mut self, warning: Option<String>) -> Self {
        self.warning = Some(warning);
        self
    }
}

/// Merge `update` into `current`, returning the new state.
///
/// Pure: derived fields are recomputed and playback fields normalised so
/// that `is_playing` and `playback_status` always agree.
pub fn apply(current: &NarrationState, update: StateUpdate) -> NarrationState {
    let mut next = current.clone();

    if let Some(status) = update.job_status {
        next.job_status = status;
    }
    if let Some(creating) = update.is_creating_audio {
        next.is_creating_audio = creating;
    }
    if let Some(status) = update.playback_status {
        next.playback_status = status;
    }
    if let Some(playing) = update.is_playing {
        next.is_playing = playing;
    }
    if let Some(backend) = update.backend {
        next.backend = backend;
    }
    if let Some(enabled) = update.uses_on_device_voice {
        next.uses_on_device_voice = enabled;
    }
    if let Some(handle) = update.local_track {
        next.local_track = handle;
    }
    if let Some(key) = update.remote_key {
        next.remote_key = key;
    }
    if let Some(total) = update.units_total {
        next.units_total = total;
    }
    if let Some(completed) = update.units_completed {
        next.units_completed = completed;
    }
    if let Some(failed) = update.units_failed {
        next.units_failed = failed;
    }
    if let Some(persisting) = update.is_persisting {
        next.is_persisting = persisting;
    }
    if let Some(error) = update.error {
        next.error = error;
    }
    if let Some(warning) = update.warning {
        next.warning = warning;
    }

    if next.is_playing {
        next.playback_status = PlaybackStatus::Playing;
    } else {
        next.backend = None;
        if next.playback_status == PlaybackStatus::Playing {
            next.playback_status = PlaybackStatus::Idle;
        }
    }
    next.has_audio_file = next.local_track.is_some() || next.remote_key.is_some();

    next
}
