use super::error::PlaybackError;
use super::remote::RemoteTrackLoader;
use super::source::PlaybackSource;
use super::state::{PlaybackBackend, StateUpdate};
use super::store::StateStore;
use crate::domain::audio::{decoded_duration, TrackStore};
use crate::domain::narration::LanguageCode;
use crate::infrastructure::playback::{
    MediaSink, MediaTrack, PlaybackCompletion, PlaybackOutcome, SpeechEngine,
};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Timers governing playback sessions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackTimings {
    /// End events arriving this soon after an explicit stop are ignored
    pub manual_stop_guard: Duration,
    pub reconcile_interval: Duration,
    /// How many times the voice engine is re-checked after speech starts
    pub reconcile_checks: u32,
}

impl Default for PlaybackTimings {
    fn default() -> Self {
        Self {
            manual_stop_guard: Duration::from_millis(300),
            reconcile_interval: Duration::from_millis(500),
            reconcile_checks: 3,
        }
    }
}

#[derive(Default)]
struct SessionState {
    /// Bumped by every `play()`; end events from older sessions are stale
    session_id: u64,
    /// Bumped by `play()` and `stop()`; a start still loading is abandoned
    /// once the epoch moves on
    epoch: u64,
    active: Option<PlaybackBackend>,
    suppress_until: Option<Instant>,
    watcher: Option<JoinHandle<()>>,
    reconciler: Option<JoinHandle<()>>,
}

struct EngineInner {
    speech: Arc<dyn SpeechEngine>,
    media: Arc<dyn MediaSink>,
    tracks: Arc<TrackStore>,
    remote: RemoteTrackLoader,
    store: StateStore,
    timings: PlaybackTimings,
    session: Mutex<SessionState>,
}

/// Owns the three playback backends and keeps at most one of them active.
///
/// Every transition is staged into the [`StateStore`] while the session lock
/// is held and published after it is released.
#[derive(Clone)]
pub struct PlaybackEngine {
    inner: Arc<EngineInner>,
}

impl PlaybackEngine {
    pub fn new(
        speech: Arc<dyn SpeechEngine>,
        media: Arc<dyn MediaSink>,
        tracks: Arc<TrackStore>,
        remote: RemoteTrackLoader,
        store: StateStore,
        timings: PlaybackTimings,
    ) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                speech,
                media,
                tracks,
                remote,
                store,
                timings,
                session: Mutex::new(SessionState::default()),
            }),
        }
    }

    pub fn active_backend(&self) -> Option<PlaybackBackend> {
        self.inner.lock_session().active
    }

    pub fn remote(&self) -> &RemoteTrackLoader {
        &self.inner.remote
    }

    /// Start a new session on `source`, tearing down the current one first.
    ///
    /// Failures are also reported through the state store as a playback
    /// error, unless a newer `play()` or `stop()` has already taken over.
    pub async fn play(
        &self,
        source: PlaybackSource,
        text: &str,
        language: LanguageCode,
    ) -> Result<(), PlaybackError> {
        let backend = source.backend();
        let (session_id, epoch) = self.inner.begin_session();

        tracing::info!(backend = ?backend, session_id = session_id, "Starting playback");

        let result = self
            .start(source, session_id, epoch, text, language)
            .await;

        if let Err(e) = &result {
            tracing::warn!(backend = ?backend, error = %e, "Playback failed to start");
            let current = {
                let session = self.inner.lock_session();
                if session.epoch == epoch {
                    self.inner.store.stage(StateUpdate::playback_failed(e.to_string()));
                    true
                } else {
                    false
                }
            };
            if current {
                self.inner.store.notify();
            }
        }

        result
    }

    /// Stop whatever is playing. Safe to call at any time, any number of times.
    pub fn stop(&self) {
        let was_active = {
            let mut session = self.inner.lock_session();
            let was_active = session.active;
            self.inner.teardown(&mut session, false);
            session.epoch += 1;
            session.suppress_until = Some(Instant::now() + self.inner.timings.manual_stop_guard);
            self.inner.store.stage(StateUpdate::stopped());
            was_active
        };

        tracing::info!(backend = ?was_active, "Playback stopped");
        self.inner.store.notify();
    }

    /// Tear everything down without touching state; used on destroy
    pub fn shutdown(&self) {
        let mut session = self.inner.lock_session();
        self.inner.teardown(&mut session, true);
        session.epoch += 1;
    }

    async fn start(
        &self,
        source: PlaybackSource,
        session_id: u64,
        epoch: u64,
        text: &str,
        language: LanguageCode,
    ) -> Result<(), PlaybackError> {
        match source {
            PlaybackSource::OnDeviceVoice => self.start_speech(session_id, epoch, text, language),
            PlaybackSource::LocalTrack(handle) => {
                let track = self
                    .inner
                    .tracks
                    .get(&handle)
                    .ok_or_else(|| PlaybackError::TrackUnavailable(handle.to_string()))?;

                let media_track = MediaTrack {
                    bytes: track.bytes,
                    content_type: track.content_type.to_string(),
                    duration_hint: Some(track.duration),
                    label: handle.to_string(),
                };
                self.start_media(session_id, epoch, PlaybackBackend::LocalTrack, media_track)
            }
            PlaybackSource::RemoteTrack(key) => {
                let bytes = self.inner.remote.load(&key).await?;
                let duration_hint = measure_duration(&key, Arc::clone(&bytes)).await;
                let media_track = MediaTrack {
                    bytes,
                    content_type: content_type_for_key(&key).to_string(),
                    duration_hint,
                    label: key,
                };
                self.start_media(session_id, epoch, PlaybackBackend::RemoteTrack, media_track)
            }
        }
    }

    fn start_speech(
        &self,
        session_id: u64,
        epoch: u64,
        text: &str,
        language: LanguageCode,
    ) -> Result<(), PlaybackError> {
        let inner = &self.inner;
        if !inner.speech.is_available() {
            return Err(PlaybackError::BackendUnavailable(
                "on-device speech engine is not available".to_string(),
            ));
        }

        {
            let mut session = inner.lock_session();
            if session.epoch != epoch {
                tracing::debug!(session_id = session_id, "Speech start superseded");
                return Ok(());
            }

            let completion = inner.speech.speak(text, language)?;
            session.active = Some(PlaybackBackend::OnDeviceVoice);
            session.watcher = Some(self.watch(session_id, PlaybackBackend::OnDeviceVoice, completion));
            session.reconciler = Some(self.reconcile(session_id));
            inner
                .store
                .stage(StateUpdate::playing(PlaybackBackend::OnDeviceVoice));
        }

        tracing::info!(
            text_length = text.len(),
            language = %language,
            "On-device voice speaking"
        );
        inner.store.notify();
        Ok(())
    }

    fn start_media(
        &self,
        session_id: u64,
        epoch: u64,
        backend: PlaybackBackend,
        track: MediaTrack,
    ) -> Result<(), PlaybackError> {
        let inner = &self.inner;
        let label = track.label.clone();
        let size = track.bytes.len();

        {
            let mut session = inner.lock_session();
            if session.epoch != epoch {
                tracing::debug!(label = %label, "Media start superseded");
                return Ok(());
            }

            inner.media.set_muted(false);
            let completion = inner.media.start(track)?;
            session.active = Some(backend);
            session.watcher = Some(self.watch(session_id, backend, completion));
            inner.store.stage(StateUpdate::playing(backend));
        }

        tracing::info!(
            backend = ?backend,
            label = %label,
            audio_size_bytes = size,
            "Track playing"
        );
        inner.store.notify();
        Ok(())
    }

    fn watch(
        &self,
        session_id: u64,
        backend: PlaybackBackend,
        completion: PlaybackCompletion,
    ) -> JoinHandle<()> {
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            let outcome = completion.await;

            let changed = {
                let mut session = inner.lock_session();
                if session.session_id != session_id {
                    return;
                }
                if session
                    .suppress_until
                    .map_or(false, |until| Instant::now() < until)
                {
                    tracing::debug!(
                        backend = ?backend,
                        "Ignoring end event right after manual stop"
                    );
                    return;
                }

                match outcome {
                    // Cancelled: no event will come
                    Err(_) => return,
                    Ok(PlaybackOutcome::Ended) => {
                        tracing::info!(backend = ?backend, "Playback ended");
                        inner.finish(&mut session, backend);
                        inner.store.stage(StateUpdate::stopped());
                    }
                    Ok(PlaybackOutcome::Failed(message)) => {
                        tracing::error!(backend = ?backend, error = %message, "Playback error");
                        inner.finish(&mut session, backend);
                        inner.store.stage(StateUpdate::playback_failed(message));
                    }
                }
                true
            };

            if changed {
                inner.store.notify();
            }
        })
    }

    /// Periodically compare what the voice engine reports with the tracked
    /// state, correcting the state when its events went missing
    fn reconcile(&self, session_id: u64) -> JoinHandle<()> {
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            let timings = inner.timings;
            for check in 1..=timings.reconcile_checks {
                tokio::time::sleep(timings.reconcile_interval).await;

                let corrected = {
                    let mut session = inner.lock_session();
                    if session.session_id != session_id {
                        return;
                    }

                    let speaking = inner.speech.is_speaking();
                    let tracked = inner.store.snapshot().is_playing;
                    if speaking == tracked {
                        None
                    } else if speaking {
                        session.active = Some(PlaybackBackend::OnDeviceVoice);
                        inner
                            .store
                            .stage(StateUpdate::playing(PlaybackBackend::OnDeviceVoice));
                        Some(true)
                    } else {
                        session.active = None;
                        inner.store.stage(StateUpdate::stopped());
                        Some(false)
                    }
                };

                if let Some(speaking) = corrected {
                    tracing::warn!(
                        check = check,
                        speaking = speaking,
                        "Voice engine state disagreed with tracked state, corrected"
                    );
                    inner.store.notify();
                    if !speaking {
                        return;
                    }
                }
            }
        })
    }
}

impl EngineInner {
    fn lock_session(&self) -> MutexGuard<'_, SessionState> {
        self.session
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Tear down the current session and open a new one
    fn begin_session(&self) -> (u64, u64) {
        let (ids, was_active) = {
            let mut session = self.lock_session();
            let was_active = session.active.is_some();
            self.teardown(&mut session, true);
            session.session_id += 1;
            session.epoch += 1;
            session.suppress_until = None;
            if was_active {
                self.store.stage(StateUpdate::stopped());
            }
            ((session.session_id, session.epoch), was_active)
        };

        if was_active {
            self.store.notify();
        }
        ids
    }

    /// Silence every backend and drop per-session resources.
    ///
    /// Runs synchronously so nothing from the old session is audible once it
    /// returns.
    fn teardown(&self, session: &mut SessionState, abort_watcher: bool) {
        self.speech.cancel();
        self.media.pause_and_rewind();
        self.media.set_muted(true);
        self.media.release();

        if let Some(reconciler) = session.reconciler.take() {
            reconciler.abort();
        }
        if abort_watcher {
            if let Some(watcher) = session.watcher.take() {
                watcher.abort();
            }
        }
        session.active = None;
    }

    fn finish(&self, session: &mut SessionState, backend: PlaybackBackend) {
        session.active = None;
        if let Some(reconciler) = session.reconciler.take() {
            reconciler.abort();
        }
        if backend != PlaybackBackend::OnDeviceVoice {
            self.media.release();
        }
    }
}

/// Decode a downloaded track to learn how long it plays; stored tracks may be
/// MP3, which carries no length header
async fn measure_duration(key: &str, bytes: Arc<Vec<u8>>) -> Option<Duration> {
    match tokio::task::spawn_blocking(move || decoded_duration(&bytes)).await {
        Ok(Ok(duration)) => Some(duration),
        Ok(Err(e)) => {
            tracing::warn!(key = %key, error = %e, "Remote track could not be measured");
            None
        }
        Err(e) => {
            tracing::warn!(key = %key, error = %e, "Remote track measurement task failed");
            None
        }
    }
}

fn content_type_for_key(key: &str) -> &'static str {
    match key.rsplit('.').next().map(str::to_ascii_lowercase).as_deref() {
        Some("mp3") => "audio/mpeg",
        Some("wav") => "audio/wav",
        _ => "application/octet-stream",
    }
}
