use std::path::PathBuf;

use async_trait::async_trait;
use tracing::instrument;

use faas_models::{BlobStore, FaasError};

/// Filesystem-backed Blob Store (§6): archives live at
/// `{root}/{content_hash}.zip`, written by the control plane's upload
/// pipeline (out of scope here — the core only reads through this).
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    fn archive_path(&self, content_hash: &str) -> PathBuf {
        self.root.join(format!("{content_hash}.zip"))
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    #[instrument(skip(self))]
    async fn open_archive(&self, content_hash: &str) -> Result<Vec<u8>, FaasError> {
        tokio::fs::read(self.archive_path(content_hash))
            .await
            .map_err(|e| FaasError::InternalError {
                reason: format!("reading archive {content_hash}: {e}"),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reads_archive_by_content_hash() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("abc123.zip"), b"zip bytes").unwrap();

        let store = FsBlobStore::new(dir.path().to_path_buf());
        let bytes = store.open_archive("abc123").await.unwrap();
        assert_eq!(bytes, b"zip bytes");
    }

    #[tokio::test]
    async fn missing_archive_is_an_internal_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::new(dir.path().to_path_buf());
        let result = store.open_archive("missing").await;
        assert!(matches!(result, Err(FaasError::InternalError { .. })));
    }
}
