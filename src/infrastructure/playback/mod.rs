pub mod headless;

use crate::domain::narration::LanguageCode;
use crate::domain::playback::PlaybackError;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;

pub use headless::{HeadlessMediaSink, HeadlessSpeechEngine};

/// How a started utterance or track finished
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackOutcome {
    Ended,
    Failed(String),
}

/// Resolves once playback finishes on its own.
///
/// A closed channel means the playback was cancelled and no end event will
/// ever be reported.
pub type PlaybackCompletion = oneshot::Receiver<PlaybackOutcome>;

/// Encoded audio handed to a media sink
#[derive(Debug, Clone)]
pub struct MediaTrack {
    pub bytes: Arc<Vec<u8>>,
    pub content_type: String,
    pub duration_hint: Option<Duration>,
    /// Where the bytes came from, for logs
    pub label: String,
}

/// On-device text-to-speech engine
pub trait SpeechEngine: Send + Sync {
    fn is_available(&self) -> bool;

    /// Queue an utterance, replacing anything currently spoken
    fn speak(&self, text: &str, language: LanguageCode)
        -> Result<PlaybackCompletion, PlaybackError>;

    /// Cancel any queued or in-flight utterance
    fn cancel(&self);

    /// What the engine itself reports; not always in sync with its events
    fn is_speaking(&self) -> bool;
}

/// A single media element playing encoded tracks
pub trait MediaSink: Send + Sync {
    fn start(&self, track: MediaTrack) -> Result<PlaybackCompletion, PlaybackError>;

    fn pause_and_rewind(&self);

    fn set_muted(&self, muted: bool);

    /// Drop the loaded track
    fn release(&self);
}
