use super::storage_repository::{ObjectStorage, StorageError};
use async_trait::async_trait;
use reqwest::StatusCode;
use std::time::Duration;

/// Durable storage reached over plain HTTP.
///
/// Objects live at `<storage_base_url>/<key>`. When a CDN base URL is
/// configured, reads resolve through the CDN first and fall back to direct
/// storage if the CDN does not have the object.
pub struct HttpObjectStorage {
    client: reqwest::Client,
    storage_base_url: String,
    cdn_base_url: Option<String>,
}

impl HttpObjectStorage {
    pub fn new(
        storage_base_url: impl Into<String>,
        cdn_base_url: Option<String>,
        timeout: Duration,
    ) -> Result<Self, StorageError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StorageError::Transport(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            storage_base_url: storage_base_url.into(),
            cdn_base_url: cdn_base_url.filter(|url| !url.trim().is_empty()),
        })
    }

    pub fn storage_url(&self, key: &str) -> String {
        object_url(&self.storage_base_url, key)
    }

    pub fn cdn_url(&self, key: &str) -> Option<String> {
        self.cdn_base_url.as_deref().map(|base| object_url(base, key))
    }

    async fn head(&self, url: &str) -> Result<StatusCode, StorageError> {
        let response = self
            .client
            .head(url)
            .send()
            .await
            .map_err(|e| StorageError::Transport(e.to_string()))?;
        Ok(response.status())
    }
}

#[async_trait]
impl ObjectStorage for HttpObjectStorage {
    async fn resolve_url(&self, key: &str) -> Result<String, StorageError> {
        if let Some(cdn_url) = self.cdn_url(key) {
            match self.head(&cdn_url).await {
                Ok(status) if status.is_success() => {
                    tracing::debug!(key = %key, "Resolved object through CDN");
                    return Ok(cdn_url);
                }
                Ok(status) => {
                    tracing::debug!(
                        key = %key,
                        status = status.as_u16(),
                        "CDN miss, falling back to direct storage"
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        key = %key,
                        error = %e,
                        "CDN check failed, falling back to direct storage"
                    );
                }
            }
        }

        let url = self.storage_url(key);
        let status = self.head(&url).await?;
        if status.is_success() {
            Ok(url)
        } else if status == StatusCode::NOT_FOUND {
            Err(StorageError::NotFound(key.to_string()))
        } else {
            Err(StorageError::Status {
                status: status.as_u16(),
                target: key.to_string(),
            })
        }
    }

    async fn fetch(&self, url: &str) -> Result<Vec<u8>, StorageError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| StorageError::Transport(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(StorageError::NotFound(url.to_string()));
        }
        if !status.is_success() {
            return Err(StorageError::Status {
                status: status.as_u16(),
                target: url.to_string(),
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| StorageError::Transport(format!("failed to read body: {}", e)))?;
        Ok(bytes.to_vec())
    }

    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        match self.fetch(&self.storage_url(key)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(StorageError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        let status = self.head(&self.storage_url(key)).await?;
        if status.is_success() {
            Ok(true)
        } else if status == StatusCode::NOT_FOUND {
            Ok(false)
        } else {
            Err(StorageError::Status {
                status: status.as_u16(),
                target: key.to_string(),
            })
        }
    }

    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<(), StorageError> {
        let size = bytes.len();
        let response = self
            .client
            .put(self.storage_url(key))
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes)
            .send()
            .await
            .map_err(|e| StorageError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(StorageError::Status {
                status: status.as_u16(),
                target: key.to_string(),
            });
        }

        tracing::debug!(
            key = %key,
            content_type = content_type,
            size_bytes = size,
            "Object stored"
        );
        Ok(())
    }
}

/// Join a base URL and a storage key, percent-encoding each path segment
fn object_url(base: &str, key: &str) -> String {
    let encoded: Vec<String> = key
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect();
    format!("{}/{}", base.trim_end_matches('/'), encoded.join("/"))
}
