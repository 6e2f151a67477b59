use super::{MediaSink, MediaTrack, PlaybackCompletion, PlaybackOutcome, SpeechEngine};
use crate::domain::narration::LanguageCode;
use crate::domain::playback::PlaybackError;
use std::io::Cursor;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::oneshot;

/// Speaking rate used to estimate how long an utterance lasts
pub const CHARACTERS_PER_MINUTE: f32 = 1000.0;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

struct ActiveTrack {
    id: u64,
    label: String,
    // Sending `true` reports an end event for the interrupted track
    interrupt: oneshot::Sender<bool>,
}

#[derive(Default)]
struct SinkState {
    next_id: u64,
    current: Option<ActiveTrack>,
    muted: bool,
}

/// Media sink driven by the runtime clock instead of an audio device.
///
/// A track "plays" for the duration read from its WAV header (or the
/// caller's hint) and then reports `Ended`.
#[derive(Default)]
pub struct HeadlessMediaSink {
    state: Arc<Mutex<SinkState>>,
    ended_on_stop: AtomicBool,
}

impl HeadlessMediaSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report an `Ended` event when a track is paused, like some media
    /// elements do
    pub fn set_ended_on_stop(&self, enabled: bool) {
        self.ended_on_stop.store(enabled, Ordering::SeqCst);
    }

    /// Label of the track currently heard, if any
    pub fn audible(&self) -> Option<String> {
        let state = lock(&self.state);
        if state.muted {
            return None;
        }
        state.current.as_ref().map(|track| track.label.clone())
    }

    pub fn is_muted(&self) -> bool {
        lock(&self.state).muted
    }

    fn interrupt(&self) {
        let current = lock(&self.state).current.take();
        if let Some(track) = current {
            let _ = track
                .interrupt
                .send(self.ended_on_stop.load(Ordering::SeqCst));
        }
    }
}

impl MediaSink for HeadlessMediaSink {
    fn start(&self, track: MediaTrack) -> Result<PlaybackCompletion, PlaybackError> {
        let duration = wav_duration(&track.bytes)
            .or(track.duration_hint)
            .ok_or_else(|| {
                PlaybackError::Sink(format!("cannot determine duration of {}", track.label))
            })?;

        let (done_tx, done_rx) = oneshot::channel();
        let (interrupt_tx, interrupt_rx) = oneshot::channel();

        let id = {
            let mut state = lock(&self.state);
            state.next_id += 1;
            let id = state.next_id;
            // Replacing the source silently drops the previous track
            state.current = Some(ActiveTrack {
                id,
                label: track.label.clone(),
                interrupt: interrupt_tx,
            });
            id
        };

        tracing::debug!(
            label = %track.label,
            content_type = %track.content_type,
            duration_ms = duration.as_millis() as u64,
            "Headless media sink started track"
        );

        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(duration) => {
                    let finished = {
                        let mut state = lock(&state);
                        if state.current.as_ref().map(|t| t.id) == Some(id) {
                            state.current = None;
                            true
                        } else {
                            false
                        }
                    };
                    if finished {
                        let _ = done_tx.send(PlaybackOutcome::Ended);
                    }
                }
                signal = interrupt_rx => {
                    if matches!(signal, Ok(true)) {
                        let _ = done_tx.send(PlaybackOutcome::Ended);
                    }
                }
            }
        });

        Ok(done_rx)
    }

    fn pause_and_rewind(&self) {
        self.interrupt();
    }

    fn set_muted(&self, muted: bool) {
        lock(&self.state).muted = muted;
    }

    fn release(&self) {
        self.interrupt();
    }
}

fn wav_duration(bytes: &[u8]) -> Option<Duration> {
    let reader = hound::WavReader::new(Cursor::new(bytes)).ok()?;
    let sample_rate = reader.spec().sample_rate;
    if sample_rate == 0 {
        return None;
    }
    Some(Duration::from_secs_f64(
        f64::from(reader.duration()) / f64::from(sample_rate),
    ))
}

struct Utterance {
    id: u64,
    text: String,
    _cancel: oneshot::Sender<()>,
}

#[derive(Default)]
struct SpeechState {
    next_id: u64,
    current: Option<Utterance>,
}

/// On-device voice simulated with timers
pub struct HeadlessSpeechEngine {
    state: Arc<Mutex<SpeechState>>,
    available: AtomicBool,
    drop_end_events: Arc<AtomicBool>,
}

impl Default for HeadlessSpeechEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessSpeechEngine {
    pub fn new() -> Self {
        Self {
            state: Arc::default(),
            available: AtomicBool::new(true),
            drop_end_events: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Finish utterances without reporting it, as unreliable engines do
    pub fn set_drop_end_events(&self, drop: bool) {
        self.drop_end_events.store(drop, Ordering::SeqCst);
    }

    /// Text currently being spoken
    pub fn speaking_text(&self) -> Option<String> {
        lock(&self.state).current.as_ref().map(|u| u.text.clone())
    }

    pub fn estimated_duration(&self, text: &str) -> Duration {
        let minutes = text.chars().count() as f32 / CHARACTERS_PER_MINUTE;
        Duration::from_secs_f32(minutes * 60.0).max(Duration::from_millis(1))
    }
}

impl SpeechEngine for HeadlessSpeechEngine {
    fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    fn speak(
        &self,
        text: &str,
        language: LanguageCode,
    ) -> Result<PlaybackCompletion, PlaybackError> {
        if !self.is_available() {
            return Err(PlaybackError::BackendUnavailable(
                "on-device speech engine is not available".to_string(),
            ));
        }

        let duration = self.estimated_duration(text);
        let (done_tx, done_rx) = oneshot::channel();
        let (cancel_tx, cancel_rx) = oneshot::channel::<()>();

        let id = {
            let mut state = lock(&self.state);
            state.next_id += 1;
            let id = state.next_id;
            state.current = Some(Utterance {
                id,
                text: text.to_string(),
                _cancel: cancel_tx,
            });
            id
        };

        tracing::debug!(
            language = %language,
            text_length = text.len(),
            duration_ms = duration.as_millis() as u64,
            "Headless speech engine speaking"
        );

        let state = Arc::clone(&self.state);
        let drop_end_events = Arc::clone(&self.drop_end_events);
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(duration) => {
                    let finished = {
                        let mut state = lock(&state);
                        if state.current.as_ref().map(|u| u.id) == Some(id) {
                            state.current = None;
                            true
                        } else {
                            false
                        }
                    };
                    if finished && !drop_end_events.load(Ordering::SeqCst) {
                        let _ = done_tx.send(PlaybackOutcome::Ended);
                    }
                }
                _ = cancel_rx => {}
            }
        });

        Ok(done_rx)
    }

    fn cancel(&self) {
        let cancelled = lock(&self.state).current.take();
        if cancelled.is_some() {
            tracing::debug!("Headless speech engine cancelled utterance");
        }
    }

    fn is_speaking(&self) -> bool {
        lock(&self.state).current.is_some()
    }
}
