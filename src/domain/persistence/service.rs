use super::error::PersistenceError;
use super::keys::{audio_filename, audio_key, stories_record_key};
use super::metadata::{default_record, parse_record, patch_record, serialize_record};
use crate::domain::audio::{EncodedTrack, LocalTrackHandle, TrackStore};
use crate::domain::narration::NarrationTarget;
use crate::infrastructure::repositories::ObjectStorage;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Content type used when the first, typed upload is rejected
pub const ALTERNATE_CONTENT_TYPE: &str = "application/octet-stream";

const METADATA_CONTENT_TYPE: &str = "application/json";

/// How long to wait for an upload to become visible
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerificationPolicy {
    pub attempts: u32,
    /// Delay before the first check; doubles after every miss
    pub initial_delay: Duration,
}

impl Default for VerificationPolicy {
    fn default() -> Self {
        Self {
            attempts: 5,
            initial_delay: Duration::from_millis(500),
        }
    }
}

/// Told when a story's audio is durably stored
#[async_trait]
pub trait AudioAssignmentListener: Send + Sync {
    async fn on_audio_assigned(&self, story_index: usize, filename: &str);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedTrack {
    pub key: String,
    pub filename: String,
    /// False when the side-record could not be updated
    pub metadata_updated: bool,
}

/// Uploads assembled tracks and keeps the artifact's side-record in sync.
///
/// Share one coordinator between narrations of the same artifact: side-record
/// updates are serialised through it.
pub struct PersistenceCoordinator {
    storage: Arc<dyn ObjectStorage>,
    tracks: Arc<TrackStore>,
    verification: VerificationPolicy,
    metadata_lock: Mutex<()>,
}

impl PersistenceCoordinator {
    pub fn new(
        storage: Arc<dyn ObjectStorage>,
        tracks: Arc<TrackStore>,
        verification: VerificationPolicy,
    ) -> Self {
        Self {
            storage,
            tracks,
            verification,
            metadata_lock: Mutex::new(()),
        }
    }

    pub fn storage(&self) -> &Arc<dyn ObjectStorage> {
        &self.storage
    }

    /// Store holding the local tracks this coordinator uploads
    pub fn tracks(&self) -> &Arc<TrackStore> {
        &self.tracks
    }

    /// Take a copy of a local track for upload; the copy outlives the handle
    pub fn checkout(&self, handle: &LocalTrackHandle) -> Result<EncodedTrack, PersistenceError> {
        self.tracks
            .get(handle)
            .ok_or_else(|| PersistenceError::TrackMissing(handle.to_string()))
    }

    /// Upload, verify, notify the listener, then patch the side-record.
    ///
    /// A failed side-record update does not fail the call; the audio itself
    /// is already durable by then.
    pub async fn persist(
        &self,
        track: EncodedTrack,
        target: &NarrationTarget,
        listener: Option<&dyn AudioAssignmentListener>,
    ) -> Result<PersistedTrack, PersistenceError> {
        let start_time = Instant::now();
        let key = audio_key(target, track.extension);
        let filename = audio_filename(target.story_index, track.extension);

        tracing::info!(
            key = %key,
            story_index = target.story_index,
            audio_size_bytes = track.bytes.len(),
            "Persisting narration track"
        );

        self.upload(&key, track.bytes.as_ref().clone(), track.content_type)
            .await?;
        self.verify(&key).await?;

        if let Some(listener) = listener {
            listener.on_audio_assigned(target.story_index, &filename).await;
        }

        let metadata_updated = match self.update_metadata(target, &filename).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(
                    key = %stories_record_key(target),
                    error = %e,
                    "Stories record not updated"
                );
                false
            }
        };

        tracing::info!(
            key = %key,
            latency_ms = start_time.elapsed().as_millis() as u64,
            metadata_updated = metadata_updated,
            "Narration track persisted"
        );

        Ok(PersistedTrack {
            key,
            filename,
            metadata_updated,
        })
    }

    /// Upload with the track's own content type, then once more as raw bytes
    async fn upload(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), PersistenceError> {
        let first = self.storage.put(key, bytes.clone(), content_type).await;
        let Err(first_error) = first else {
            return Ok(());
        };

        tracing::warn!(
            key = %key,
            content_type = content_type,
            error = %first_error,
            "Upload failed, retrying with alternate encoding"
        );

        self.storage
            .put(key, bytes, ALTERNATE_CONTENT_TYPE)
            .await
            .map_err(|source| {
                tracing::error!(key = %key, error = %source, "Upload retry failed");
                PersistenceError::Upload {
                    key: key.to_string(),
                    source,
                }
            })
    }

    async fn verify(&self, key: &str) -> Result<(), PersistenceError> {
        let mut delay = self.verification.initial_delay;

        for attempt in 1..=self.verification.attempts {
            tokio::time::sleep(delay).await;

            match self.storage.exists(key).await {
                Ok(true) => {
                    tracing::debug!(key = %key, attempt = attempt, "Upload verified");
                    return Ok(());
                }
                Ok(false) => {
                    tracing::debug!(key = %key, attempt = attempt, "Upload not visible yet");
                }
                Err(e) => {
                    tracing::warn!(key = %key, attempt = attempt, error = %e, "Verification check failed");
                }
            }
            delay = delay.saturating_mul(2);
        }

        tracing::error!(
            key = %key,
            attempts = self.verification.attempts,
            "Upload could not be verified"
        );
        Err(PersistenceError::VerificationFailed {
            key: key.to_string(),
            attempts: self.verification.attempts,
        })
    }

    /// Read-modify-write of the artifact's stories record
    pub async fn update_metadata(
        &self,
        target: &NarrationTarget,
        filename: &str,
    ) -> Result<(), PersistenceError> {
        let record_key = stories_record_key(target);
        let _guard = self.metadata_lock.lock().await;

        let existing = self
            .storage
            .read(&record_key)
            .await
            .map_err(|e| PersistenceError::Metadata(e.to_string()))?;

        let mut entries = match existing {
            Some(bytes) => parse_record(&bytes)?,
            None => {
                tracing::info!(key = %record_key, "No stories record yet, creating one");
                default_record(target.story_index)
            }
        };

        patch_record(&mut entries, target.story_index, filename, chrono::Utc::now());

        self.storage
            .put(&record_key, serialize_record(&entries)?, METADATA_CONTENT_TYPE)
            .await
            .map_err(|e| PersistenceError::Metadata(e.to_string()))?;

        tracing::info!(
            key = %record_key,
            story_index = target.story_index,
            filename = %filename,
            "Stories record updated"
        );
        Ok(())
    }
}
