use super::storage_repository::{ObjectStorage, StorageError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

const URL_SCHEME: &str = "memory://";

#[derive(Debug, Clone)]
struct StoredObject {
    bytes: Vec<u8>,
    content_type: String,
    visible_at: Instant,
}

/// Process-local durable storage, used when no storage endpoint is configured.
///
/// Can simulate failing writes and eventual consistency (objects become
/// visible only after a configurable lag).
#[derive(Debug, Default)]
pub struct MemoryObjectStorage {
    objects: Mutex<HashMap<String, StoredObject>>,
    failing_puts: AtomicUsize,
    visibility_lag: Mutex<Duration>,
    put_log: Mutex<Vec<(String, String)>>,
}

impl MemoryObjectStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject the next `count` writes
    pub fn fail_next_puts(&self, count: usize) {
        self.failing_puts.store(count, Ordering::SeqCst);
    }

    /// Delay visibility of newly written objects
    pub fn set_visibility_lag(&self, lag: Duration) {
        *lock(&self.visibility_lag) = lag;
    }

    /// Store an object immediately visible, bypassing failure simulation
    pub fn insert(&self, key: &str, bytes: Vec<u8>, content_type: &str) {
        lock(&self.objects).insert(
            key.to_string(),
            StoredObject {
                bytes,
                content_type: content_type.to_string(),
                visible_at: Instant::now(),
            },
        );
    }

    /// Raw object bytes regardless of visibility
    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        lock(&self.objects).get(key).map(|object| object.bytes.clone())
    }

    pub fn content_type(&self, key: &str) -> Option<String> {
        lock(&self.objects)
            .get(key)
            .map(|object| object.content_type.clone())
    }

    /// Every attempted write as `(key, content_type)`, failed ones included
    pub fn put_log(&self) -> Vec<(String, String)> {
        lock(&self.put_log).clone()
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = lock(&self.objects).keys().cloned().collect();
        keys.sort();
        keys
    }

    fn visible(&self, key: &str) -> Option<Vec<u8>> {
        lock(&self.objects)
            .get(key)
            .filter(|object| object.visible_at <= Instant::now())
            .map(|object| object.bytes.clone())
    }
}

#[async_trait]
impl ObjectStorage for MemoryObjectStorage {
    async fn resolve_url(&self, key: &str) -> Result<String, StorageError> {
        if self.visible(key).is_some() {
            Ok(format!("{}{}", URL_SCHEME, key))
        } else {
            Err(StorageError::NotFound(key.to_string()))
        }
    }

    async fn fetch(&self, url: &str) -> Result<Vec<u8>, StorageError> {
        let key = url
            .strip_prefix(URL_SCHEME)
            .ok_or_else(|| StorageError::InvalidUrl(url.to_string()))?;
        self.visible(key)
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.visible(key))
    }

    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self.visible(key).is_some())
    }

    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<(), StorageError> {
        lock(&self.put_log).push((key.to_string(), content_type.to_string()));

        let should_fail = self
            .failing_puts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if should_fail {
            tracing::debug!(key = %key, "Simulated storage write failure");
            return Err(StorageError::Status {
                status: 503,
                target: key.to_string(),
            });
        }

        let lag = *lock(&self.visibility_lag);
        lock(&self.objects).insert(
            key.to_string(),
            StoredObject {
                bytes,
                content_type: content_type.to_string(),
                visible_at: Instant::now() + lag,
            },
        );
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
