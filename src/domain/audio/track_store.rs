use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

/// Ephemeral, process-local reference to an assembled track.
///
/// Handles resolve only through the [`TrackStore`] that issued them and stop
/// resolving once revoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LocalTrackHandle(Uuid);

impl LocalTrackHandle {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for LocalTrackHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "blob:narration/{}", self.0)
    }
}

/// Encoded audio held in memory
#[derive(Debug, Clone)]
pub struct EncodedTrack {
    pub bytes: Arc<Vec<u8>>,
    pub content_type: &'static str,
    pub extension: &'static str,
    pub duration: Duration,
}

/// Registry of in-memory tracks, the local analogue of object URLs
#[derive(Debug, Default)]
pub struct TrackStore {
    tracks: Mutex<HashMap<LocalTrackHandle, EncodedTrack>>,
}

impl TrackStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, track: EncodedTrack) -> LocalTrackHandle {
        let handle = LocalTrackHandle::new();
        self.lock().insert(handle, track);
        tracing::debug!(handle = %handle, "Local track registered");
        handle
    }

    pub fn get(&self, handle: &LocalTrackHandle) -> Option<EncodedTrack> {
        self.lock().get(handle).cloned()
    }

    pub fn contains(&self, handle: &LocalTrackHandle) -> bool {
        self.lock().contains_key(handle)
    }

    /// Release the bytes behind a handle; returns whether it was registered
    pub fn revoke(&self, handle: &LocalTrackHandle) -> bool {
        let removed = self.lock().remove(handle).is_some();
        if removed {
            tracing::debug!(handle = %handle, "Local track revoked");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<LocalTrackHandle, EncodedTrack>> {
        // A panic while holding the lock cannot leave the map half-updated
        self.tracks.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
