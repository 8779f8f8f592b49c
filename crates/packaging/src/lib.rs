pub mod blob_store;
pub mod vfs;
pub mod zip_handler;

use std::sync::Arc;

use dashmap::DashMap;
use tracing::instrument;

use faas_models::{BlobStore, FaasError, FunctionVersion};

pub use blob_store::FsBlobStore;
pub use vfs::VfsView;
pub use zip_handler::ZipHandler;

/// The Package Materializer (§4.3). Materialization is content-addressed
/// and deduplicated: a reference-counted `VfsView` is shared across
/// concurrent invocations of the same version, keyed by content hash rather
/// than version id so two versions that happen to share byte-identical
/// content also share one materialized view.
pub struct PackageMaterializer {
    blob_store: Arc<dyn BlobStore>,
    zip_handler: ZipHandler,
    cache: DashMap<String, Arc<VfsView>>,
}

impl PackageMaterializer {
    pub fn new(blob_store: Arc<dyn BlobStore>, max_archive_size: u64) -> Self {
        Self {
            blob_store,
            zip_handler: ZipHandler::new(max_archive_size),
            cache: DashMap::new(),
        }
    }

    #[instrument(skip(self, version))]
    pub async fn materialize(&self, version: &FunctionVersion) -> Result<Arc<VfsView>, FaasError> {
        if let Some(cached) = self.cache.get(&version.content_hash) {
            return Ok(cached.clone());
        }

        let archive_bytes = self.blob_store.open_archive(&version.content_hash).await?;
        let view = Arc::new(self.zip_handler.materialize(&archive_bytes)?);

        self.cache.insert(version.content_hash.clone(), view.clone());
        Ok(view)
    }

    /// Drop a cached view once nothing else holds a reference to it. Called
    /// opportunistically by the reaper; a view still in use by an in-flight
    /// invocation is simply skipped since `Arc::strong_count` is > 1.
    pub fn evict_unused(&self) {
        self.cache.retain(|_, view| Arc::strong_count(view) > 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::io::Write;
    use uuid::Uuid;

    struct FixedBlobStore(Vec<u8>);

    #[async_trait]
    impl BlobStore for FixedBlobStore {
        async fn open_archive(&self, _content_hash: &str) -> Result<Vec<u8>, FaasError> {
            Ok(self.0.clone())
        }
    }

    fn build_zip() -> Vec<u8> {
        let mut buf = Vec::new();
        {
            let mut writer = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
            writer
                .start_file("index.js", zip::write::FileOptions::default())
                .unwrap();
            writer.write_all(b"module.exports = (req, res) => res.end()").unwrap();
            writer.finish().unwrap();
        }
        buf
    }

    fn sample_version(content_hash: &str) -> FunctionVersion {
        FunctionVersion {
            version_id: Uuid::new_v4(),
            function_id: Uuid::new_v4(),
            sequence: 1,
            content_hash: content_hash.to_string(),
            byte_size: 10,
            creator_id: Uuid::new_v4(),
            created_at: Utc::now(),
            ready: true,
        }
    }

    #[tokio::test]
    async fn materializes_and_caches_by_content_hash() {
        let store = Arc::new(FixedBlobStore(build_zip()));
        let materializer = PackageMaterializer::new(store, 1024 * 1024);
        let version = sample_version("hash-a");

        let first = materializer.materialize(&version).await.unwrap();
        let second = materializer.materialize(&version).await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn evict_unused_drops_views_with_no_remaining_references() {
        let store = Arc::new(FixedBlobStore(build_zip()));
        let materializer = PackageMaterializer::new(store, 1024 * 1024);
        let version = sample_version("hash-b");

        {
            let _view = materializer.materialize(&version).await.unwrap();
        }
        materializer.evict_unused();
        assert_eq!(materializer.cache.len(), 0);
    }
}
