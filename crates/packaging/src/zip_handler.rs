use std::collections::HashMap;
use std::io::Read;
use std::sync::Arc;

use sha2::{Digest, Sha256};
use tracing::{info, instrument};
use zip::ZipArchive;

use faas_models::FaasError;

use crate::vfs::{normalize_path, VfsView};

pub struct ZipHandler {
    max_archive_size: u64,
}

impl ZipHandler {
    pub fn new(max_archive_size: u64) -> Self {
        Self { max_archive_size }
    }

    /// Extracts a ZIP archive's logical contents into a `VfsView` (§4.3).
    /// Entries matching `..`/absolute roots are rejected rather than
    /// silently dropped, since a poisoned archive must not materialize
    /// outside its own tree.
    #[instrument(skip(self, archive_bytes))]
    pub fn materialize(&self, archive_bytes: &[u8]) -> Result<VfsView, FaasError> {
        if archive_bytes.len() as u64 > self.max_archive_size {
            return Err(FaasError::InternalError {
                reason: format!(
                    "archive too large: {} bytes (max {})",
                    archive_bytes.len(),
                    self.max_archive_size
                ),
            });
        }

        let mut hasher = Sha256::new();
        hasher.update(archive_bytes);
        let content_hash = format!("{:x}", hasher.finalize());

        let mut archive = ZipArchive::new(std::io::Cursor::new(archive_bytes))
            .map_err(|e| FaasError::InternalError { reason: e.to_string() })?;

        let mut entries = HashMap::new();
        for i in 0..archive.len() {
            let mut file = archive
                .by_index(i)
                .map_err(|e| FaasError::InternalError { reason: e.to_string() })?;

            if file.is_dir() {
                continue;
            }

            let normalized = normalize_path(file.name())?;
            let mut buf = Vec::with_capacity(file.size() as usize);
            file.read_to_end(&mut buf)
                .map_err(|e| FaasError::InternalError { reason: e.to_string() })?;
            entries.insert(normalized, Arc::from(buf.into_boxed_slice()));
        }

        if !entries.contains_key("index.js") {
            return Err(FaasError::InternalError {
                reason: "archive has no root-level index.js".to_string(),
            });
        }

        info!(%content_hash, file_count = entries.len(), "materialized archive");
        Ok(VfsView::new(content_hash, entries))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn build_zip(files: &[(&str, &str)]) -> Vec<u8> {
        let mut buf = Vec::new();
        {
            let mut writer = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
            for (name, content) in files {
                writer
                    .start_file(*name, zip::write::FileOptions::default())
                    .unwrap();
                writer.write_all(content.as_bytes()).unwrap();
            }
            writer.finish().unwrap();
        }
        buf
    }

    #[test]
    fn materializes_entry_point() {
        let handler = ZipHandler::new(1024 * 1024);
        let zip = build_zip(&[("index.js", "module.exports = (req, res) => res.end()")]);
        let view = handler.materialize(&zip).unwrap();
        assert!(view.entry_point().is_ok());
    }

    #[test]
    fn rejects_archive_without_entry_point() {
        let handler = ZipHandler::new(1024 * 1024);
        let zip = build_zip(&[("lib.js", "module.exports = {}")]);
        assert!(handler.materialize(&zip).is_err());
    }

    #[test]
    fn rejects_oversized_archive() {
        let handler = ZipHandler::new(4);
        let zip = build_zip(&[("index.js", "module.exports = () => {}")]);
        assert!(handler.materialize(&zip).is_err());
    }

    #[test]
    fn content_hash_is_stable_for_identical_bytes() {
        let handler = ZipHandler::new(1024 * 1024);
        let zip = build_zip(&[("index.js", "x")]);
        let a = handler.materialize(&zip).unwrap();
        let b = handler.materialize(&zip).unwrap();
        assert_eq!(a.content_hash, b.content_hash);
    }
}
