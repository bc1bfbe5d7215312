use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;

use super::{BlobError, BlobStore};

/// Objects as files under a root directory; key segments become path segments.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, BlobError> {
        let relative = Path::new(key);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if key.is_empty() || escapes {
            return Err(BlobError::Configuration(format!(
                "key {key:?} does not name a file under the storage root"
            )));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn put_object(&self, key: &str, bytes: Bytes, _content_type: &str) -> Result<(), BlobError> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(BlobError::backend)?;
        }
        tokio::fs::write(&path, &bytes)
            .await
            .map_err(|e| BlobError::Backend(format!("{}: {e}", path.display())))
    }

    async fn get_object(&self, key: &str) -> Result<Bytes, BlobError> {
        let path = self.path_for(key)?;
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(BlobError::NotFound(key.to_string())),
            Err(e) => Err(BlobError::Backend(format!("{}: {e}", path.display()))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn writes_nested_keys_as_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::new(dir.path());

        store
            .put_object("solar/energy/1234/a.json", Bytes::from_static(b"{}"), "application/json")
            .await
            .unwrap();

        let on_disk = std::fs::read(dir.path().join("solar/energy/1234/a.json")).unwrap();
        assert_eq!(on_disk, b"{}");
        assert_eq!(
            store.get_object("solar/energy/1234/a.json").await.unwrap(),
            Bytes::from_static(b"{}")
        );
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::new(dir.path());
        assert!(matches!(
            store.get_object("nope").await,
            Err(BlobError::NotFound(key)) if key == "nope"
        ));
    }

    #[tokio::test]
    async fn keys_cannot_escape_the_root() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::new(dir.path());
        for key in ["../outside", "/etc/passwd", ""] {
            let res = store.put_object(key, Bytes::new(), "text/plain").await;
            assert!(matches!(res, Err(BlobError::Configuration(_))), "{key}");
        }
    }
}
