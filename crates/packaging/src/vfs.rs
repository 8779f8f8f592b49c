use std::collections::HashMap;
use std::sync::Arc;

use faas_models::FaasError;

/// A read-only view over a version archive's logical contents (§4.3): a
/// normalized-path to byte-blob mapping plus the discovered entry point.
/// Immutable once built, so it can be shared by reference across every
/// concurrent invocation of the same version.
pub struct VfsView {
    pub content_hash: String,
    entries: HashMap<String, Arc<[u8]>>,
}

impl VfsView {
    pub fn new(content_hash: String, entries: HashMap<String, Arc<[u8]>>) -> Self {
        Self { content_hash, entries }
    }

    /// The root-level `index.js`, the only fixed entry point (§3).
    pub fn entry_point(&self) -> Result<&[u8], FaasError> {
        self.read("index.js")
    }

    pub fn read(&self, path: &str) -> Result<&[u8], FaasError> {
        let normalized = normalize_path(path)?;
        self.entries
            .get(&normalized)
            .map(|b| b.as_ref())
            .ok_or_else(|| FaasError::InternalError {
                reason: format!("no such file in archive: {normalized}"),
            })
    }

    pub fn exists(&self, path: &str) -> bool {
        normalize_path(path)
            .map(|p| self.entries.contains_key(&p))
            .unwrap_or(false)
    }

    pub fn stat(&self, path: &str) -> Option<(u64, bool)> {
        let normalized = normalize_path(path).ok()?;
        if let Some(blob) = self.entries.get(&normalized) {
            return Some((blob.len() as u64, false));
        }
        let dir_prefix = format!("{normalized}/");
        if normalized.is_empty() || self.entries.keys().any(|k| k.starts_with(&dir_prefix)) {
            return Some((0, true));
        }
        None
    }

    /// Directory-tree index: entries directly under `dir` (non-recursive),
    /// matching Node's `fs.readdir` contract.
    pub fn read_dir(&self, dir: &str) -> Result<Vec<String>, FaasError> {
        let normalized = normalize_path(dir)?;
        let prefix = if normalized.is_empty() {
            String::new()
        } else {
            format!("{normalized}/")
        };
        let mut seen = std::collections::BTreeSet::new();
        for key in self.entries.keys() {
            if let Some(rest) = key.strip_prefix(&prefix) {
                if rest.is_empty() {
                    continue;
                }
                let child = rest.split('/').next().unwrap_or(rest);
                seen.insert(child.to_string());
            }
        }
        if seen.is_empty() && !normalized.is_empty() {
            return Err(FaasError::InternalError {
                reason: format!("no such directory: {normalized}"),
            });
        }
        Ok(seen.into_iter().collect())
    }
}

/// Forward-slash normalization with `..`/absolute-root rejection (§4.3).
pub fn normalize_path(path: &str) -> Result<String, FaasError> {
    let path = path.replace('\\', "/");
    let mut out_segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => continue,
            ".." => {
                return Err(FaasError::InternalError {
                    reason: "path escapes archive root".to_string(),
                })
            }
            other => out_segments.push(other),
        }
    }
    Ok(out_segments.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_view(files: &[(&str, &str)]) -> VfsView {
        let mut entries = HashMap::new();
        for (path, content) in files {
            entries.insert(path.to_string(), Arc::from(content.as_bytes()));
        }
        VfsView::new("hash".to_string(), entries)
    }

    #[test]
    fn entry_point_reads_root_index() {
        let view = build_view(&[("index.js", "module.exports = () => {}")]);
        assert!(view.entry_point().is_ok());
    }

    #[test]
    fn normalize_rejects_parent_traversal() {
        assert!(normalize_path("../etc/passwd").is_err());
    }

    #[test]
    fn normalize_collapses_dot_segments() {
        assert_eq!(normalize_path("./a/./b/").unwrap(), "a/b");
    }

    #[test]
    fn read_dir_lists_direct_children_only() {
        let view = build_view(&[("index.js", ""), ("lib/a.js", ""), ("lib/nested/b.js", "")]);
        let mut children = view.read_dir("lib").unwrap();
        children.sort();
        assert_eq!(children, vec!["a.js".to_string(), "nested".to_string()]);
    }

    #[test]
    fn missing_file_is_an_error() {
        let view = build_view(&[("index.js", "")]);
        assert!(view.read("missing.js").is_err());
    }
}
