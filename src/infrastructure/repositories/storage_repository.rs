use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("object not found: {0}")]
    NotFound(String),
    #[error("storage transport error: {0}")]
    Transport(String),
    #[error("storage returned status {status} for {target}")]
    Status { status: u16, target: String },
    #[error("invalid storage url: {0}")]
    InvalidUrl(String),
}

/// Durable object storage that outlives the narration session.
///
/// Existence is always confirmed with a lightweight check; a URL being
/// constructible says nothing about the object behind it.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Resolve a URL the object can be downloaded from, confirming it exists
    async fn resolve_url(&self, key: &str) -> Result<String, StorageError>;

    /// Download the object behind a URL returned by `resolve_url`
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, StorageError>;

    /// Read an object directly, `None` when it does not exist
    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;

    /// Lightweight existence check against the authoritative store
    async fn exists(&self, key: &str) -> Result<bool, StorageError>;

    /// Write an object, replacing any previous version
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<(), StorageError>;
}
