use crate::infrastructure::repositories::StorageError;

#[derive(Debug, thiserror::Error)]
pub enum PlaybackError {
    #[error("playback backend unavailable: {0}")]
    BackendUnavailable(String),
    #[error("no audio source available")]
    NoSource,
    #[error("local track is no longer available: {0}")]
    TrackUnavailable(String),
    #[error("remote track could not be loaded: {0}")]
    Storage(#[from] StorageError),
    #[error("media sink error: {0}")]
    Sink(String),
}
