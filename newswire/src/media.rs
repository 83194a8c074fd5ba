//! Blob storage for uploaded images: store bytes, hand back a URL.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::info;

use crate::error::{PortalError, PortalResult};

/// Opaque store-blob-return-URL service backing `POST /api/news/upload`.
#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Persist `bytes` and return the public URL path of the stored blob.
    async fn store(&self, original_name: &str, bytes: &[u8]) -> PortalResult<String>;
}

/// Stores blobs as files under a single uploads directory. File names are
/// generated; only the extension of the original name is kept.
pub struct FileMediaStore {
    dir: PathBuf,
    public_prefix: String,
}

impl FileMediaStore {
    pub fn new<P: AsRef<Path>>(dir: P, public_prefix: impl Into<String>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            public_prefix: public_prefix.into(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl MediaStore for FileMediaStore {
    async fn store(&self, original_name: &str, bytes: &[u8]) -> PortalResult<String> {
        if bytes.is_empty() {
            return Err(PortalError::Validation("uploaded file is empty".to_string()));
        }
        tokio::fs::create_dir_all(&self.dir).await?;
        let extension = Path::new(original_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .filter(|ext| ext.chars().all(|c| c.is_ascii_alphanumeric()))
            .unwrap_or("bin");
        let name = format!("{}.{}", uuid::Uuid::new_v4(), extension);
        tokio::fs::write(self.dir.join(&name), bytes).await?;
        info!(file = %name, size = bytes.len(), "stored uploaded image");
        Ok(format!("{}/{}", self.public_prefix, name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn stores_blob_and_returns_url_under_prefix() {
        let dir = tempdir().unwrap();
        let store = FileMediaStore::new(dir.path(), "/uploads");

        let url = store.store("photo.PNG", b"png-bytes").await.unwrap();
        assert!(url.starts_with("/uploads/"));
        assert!(url.ends_with(".PNG"));

        let name = url.rsplit('/').next().unwrap();
        let written = std::fs::read(dir.path().join(name)).unwrap();
        assert_eq!(written, b"png-bytes");
    }

    #[tokio::test]
    async fn weird_extensions_fall_back_to_bin() {
        let dir = tempdir().unwrap();
        let store = FileMediaStore::new(dir.path(), "/uploads");
        let url = store.store("../../etc/passwd", b"data").await.unwrap();
        assert!(url.ends_with(".bin"));
    }

    #[tokio::test]
    async fn empty_payload_is_a_validation_error() {
        let dir = tempdir().unwrap();
        let store = FileMediaStore::new(dir.path(), "/uploads");
        let denied = store.store("a.png", b"").await;
        assert!(matches!(denied, Err(PortalError::Validation(_))));
    }
}
