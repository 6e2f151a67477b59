use crate::infrastructure::repositories::StorageError;

#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("local track {0} is no longer available")]
    TrackMissing(String),
    #[error("upload of {key} failed: {source}")]
    Upload {
        key: String,
        #[source]
        source: StorageError,
    },
    #[error("upload of {key} could not be verified after {attempts} attempts")]
    VerificationFailed { key: String, attempts: u32 },
    #[error("metadata update failed: {0}")]
    Metadata(String),
}
