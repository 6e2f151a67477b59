use crate::domain::audio::AssemblyError;
use crate::domain::persistence::PersistenceError;
use crate::domain::playback::PlaybackError;
use crate::domain::synthesis::SynthesisError;
use crate::infrastructure::repositories::StorageError;

/// Main narration error type
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Synthesis failed: {0}")]
    Synthesis(#[from] SynthesisError),

    #[error("Assembly failed: {0}")]
    Assembly(#[from] AssemblyError),

    #[error("Playback backend unavailable: {0}")]
    PlaybackBackendUnavailable(String),

    #[error("No audio source available")]
    NoAudioSource,

    #[error("Playback failed: {0}")]
    Playback(String),

    #[error("Persistence failed: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Narration manager has been destroyed")]
    Destroyed,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Whether the error leaves the narration without usable audio.
    ///
    /// A failed upload is not: the local track still plays. Failed units
    /// never surface here on their own, a `Synthesis` error means every
    /// unit failed.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Persistence(_))
    }

    /// Short message suitable for surfacing to the UI layer
    pub fn user_message(&self) -> String {
        match self {
            Self::Assembly(_) | Self::Synthesis(_) => {
                "Audio could not be generated. Please try again.".to_string()
            }
            Self::PlaybackBackendUnavailable(_) => {
                "Speech is not available on this device.".to_string()
            }
            Self::NoAudioSource => "No audio source available.".to_string(),
            Self::Persistence(_) | Self::Storage(_) => {
                "Audio could not be saved, but it can still be played.".to_string()
            }
            Self::Playback(_) | Self::Destroyed | Self::Internal(_) => self.to_string(),
        }
    }
}

impl From<PlaybackError> for AppError {
    fn from(err: PlaybackError) -> Self {
        match err {
            PlaybackError::BackendUnavailable(msg) => AppError::PlaybackBackendUnavailable(msg),
            PlaybackError::NoSource => AppError::NoAudioSource,
            PlaybackError::Storage(e) => AppError::Storage(e),
            other => AppError::Playback(other.to_string()),
        }
    }
}

/// Custom result type for the crate
pub type AppResult<T> = Result<T, AppError>;
