//! Object storage for fetched artifacts and the ingestion checkpoint.

mod fs;
mod memory;
mod s3;

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

pub use fs::FsBlobStore;
pub use memory::InMemoryBlobStore;
pub use s3::{S3BlobStore, S3Config};

use crate::config::{StorageConfig, StorageKind};

#[derive(Debug, thiserror::Error)]
pub enum BlobError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("object not found: {0}")]
    NotFound(String),
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl BlobError {
    pub(crate) fn backend(err: impl std::fmt::Display) -> Self {
        Self::Backend(err.to_string())
    }
}

/// Whole-object reads and writes keyed by `/`-separated names.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put_object(&self, key: &str, bytes: Bytes, content_type: &str)
        -> Result<(), BlobError>;

    /// `BlobError::NotFound` when nothing is stored under `key`.
    async fn get_object(&self, key: &str) -> Result<Bytes, BlobError>;
}

/// Joins `name` under `prefix`, ignoring stray slashes. An empty prefix yields `name` as is.
pub fn namespaced_key(prefix: &str, name: &str) -> String {
    let prefix = prefix.trim_matches('/');
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}/{name}")
    }
}

pub async fn build_store(config: &StorageConfig) -> Result<Arc<dyn BlobStore>, BlobError> {
    match config.kind {
        StorageKind::S3 => {
            let bucket = config.bucket.clone().ok_or_else(|| {
                BlobError::Configuration("storage.bucket is required for s3 storage".into())
            })?;
            let store = S3BlobStore::new(S3Config {
                bucket,
                region: config.region.clone(),
                endpoint: config.endpoint.clone(),
                access_key_id: config.access_key_id.clone(),
                secret_access_key: config.secret_access_key.clone(),
                force_path_style: config.force_path_style,
            })
            .await?;
            Ok(Arc::new(store))
        }
        StorageKind::Fs => {
            let root = config.root_dir.clone().ok_or_else(|| {
                BlobError::Configuration("storage.root_dir is required for fs storage".into())
            })?;
            Ok(Arc::new(FsBlobStore::new(root)))
        }
        StorageKind::Memory => Ok(Arc::new(InMemoryBlobStore::new())),
    }
}
