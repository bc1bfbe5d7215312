use std::collections::BTreeMap;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::Mutex;

use super::{BlobError, BlobStore};

/// Process-local store for dry runs and tests.
#[derive(Debug, Default)]
pub struct InMemoryBlobStore {
    objects: Mutex<BTreeMap<String, Bytes>>,
    reject_prefix: Option<String>,
}

impl InMemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose writes under `prefix` fail.
    pub fn rejecting_writes_under(prefix: impl Into<String>) -> Self {
        Self {
            reject_prefix: Some(prefix.into()),
            ..Self::default()
        }
    }

    pub async fn keys(&self) -> Vec<String> {
        self.objects.lock().await.keys().cloned().collect()
    }

    pub async fn get_string(&self, key: &str) -> Option<String> {
        self.objects
            .lock()
            .await
            .get(key)
            .map(|b| String::from_utf8_lossy(b).into_owned())
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn put_object(&self, key: &str, bytes: Bytes, _content_type: &str) -> Result<(), BlobError> {
        if let Some(prefix) = &self.reject_prefix {
            if key.starts_with(prefix.as_str()) {
                return Err(BlobError::Backend(format!("write rejected for {key}")));
            }
        }
        self.objects.lock().await.insert(key.to_string(), bytes);
        Ok(())
    }

    async fn get_object(&self, key: &str) -> Result<Bytes, BlobError> {
        self.objects
            .lock()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| BlobError::NotFound(key.to_string()))
    }
}
