use super::error::PlaybackError;
use crate::infrastructure::repositories::ObjectStorage;
use moka::future::Cache;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Downloads durable tracks for playback, optionally caching them in memory
#[derive(Clone)]
pub struct RemoteTrackLoader {
    storage: Arc<dyn ObjectStorage>,
    cache: Option<Cache<String, Arc<Vec<u8>>>>,
}

impl RemoteTrackLoader {
    pub fn new(storage: Arc<dyn ObjectStorage>, cache_enabled: bool) -> Self {
        let cache = if cache_enabled {
            Some(
                Cache::builder()
                    .max_capacity(16)
                    .time_to_idle(Duration::from_secs(30 * 60))
                    .build(),
            )
        } else {
            None
        };

        Self { storage, cache }
    }

    /// Resolve the key to a URL, confirm it exists, and download it
    pub async fn load(&self, key: &str) -> Result<Arc<Vec<u8>>, PlaybackError> {
        if let Some(cache) = &self.cache {
            if let Some(bytes) = cache.get(key).await {
                tracing::debug!(
                    key = %key,
                    audio_size_bytes = bytes.len(),
                    "Remote track cache hit"
                );
                return Ok(bytes);
            }
        }

        let start_time = Instant::now();
        let url = self.storage.resolve_url(key).await?;
        let bytes = Arc::new(self.storage.fetch(&url).await?);

        tracing::info!(
            key = %key,
            audio_size_bytes = bytes.len(),
            latency_ms = start_time.elapsed().as_millis() as u64,
            "Remote track downloaded"
        );

        if let Some(cache) = &self.cache {
            cache.insert(key.to_string(), Arc::clone(&bytes)).await;
        }

        Ok(bytes)
    }

    pub async fn forget(&self, key: &str) {
        if let Some(cache) = &self.cache {
            cache.invalidate(key).await;
        }
    }
}
