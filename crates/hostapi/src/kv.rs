use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use faas_models::KvEntry;

/// Pluggable KV Driver contract (§4.7/§6): namespaced get/set/has/delete/
/// clear/keys. Namespace defaults to the function id; a shared namespace can
/// additionally be configured by the operator.
#[async_trait]
pub trait KvDriver: Send + Sync {
    async fn get(&self, namespace: &str, key: &str) -> Option<KvEntry>;
    async fn set(&self, namespace: &str, key: &str, entry: KvEntry);
    async fn delete(&self, namespace: &str, key: &str) -> bool;
    async fn clear(&self, namespace: &str);
    /// Insertion order within the namespace, oldest first.
    async fn keys(&self, namespace: &str) -> Vec<String>;
}

fn is_live(entry: &KvEntry) -> bool {
    !entry.is_expired_at(Utc::now())
}

/// In-memory driver, the default for ephemeral deployments. Order within a
/// namespace is tracked with an `IndexMap` so `keys()` reflects insertion
/// order, matching the JSON-file driver's on-disk representation.
#[derive(Default)]
pub struct InMemoryKvDriver {
    namespaces: DashMap<String, IndexMap<String, KvEntry>>,
}

impl InMemoryKvDriver {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KvDriver for InMemoryKvDriver {
    async fn get(&self, namespace: &str, key: &str) -> Option<KvEntry> {
        let map = self.namespaces.get(namespace)?;
        let entry = map.get(key)?;
        if is_live(entry) {
            Some(entry.clone())
        } else {
            None
        }
    }

    async fn set(&self, namespace: &str, key: &str, entry: KvEntry) {
        self.namespaces
            .entry(namespace.to_string())
            .or_default()
            .insert(key.to_string(), entry);
    }

    async fn delete(&self, namespace: &str, key: &str) -> bool {
        self.namespaces
            .get_mut(namespace)
            .map(|mut map| map.shift_remove(key).is_some())
            .unwrap_or(false)
    }

    async fn clear(&self, namespace: &str) {
        self.namespaces.remove(namespace);
    }

    async fn keys(&self, namespace: &str) -> Vec<String> {
        match self.namespaces.get(namespace) {
            Some(map) => map
                .iter()
                .filter(|(_, v)| is_live(v))
                .map(|(k, _)| k.clone())
                .collect(),
            None => Vec::new(),
        }
    }
}

#[derive(Serialize, Deserialize)]
struct PersistedEntry {
    namespace: String,
    key: String,
    value: Vec<u8>,
    json: Option<serde_json::Value>,
    expires_at: Option<DateTime<Utc>>,
}

/// JSON-file-backed driver for the local runner (§4.7, §6). Read once on
/// startup, rewritten in full on every mutating call. Persisted as a JSON
/// array (not an object) of `{namespace, key, value, expires_at}` records so
/// insertion order survives a reload (Open Question E.1).
pub struct JsonFileKvDriver {
    path: PathBuf,
    state: Mutex<IndexMap<(String, String), KvEntry>>,
}

impl JsonFileKvDriver {
    pub async fn open(path: PathBuf) -> anyhow::Result<Self> {
        let state = if path.exists() {
            let raw = tokio::fs::read(&path).await?;
            let records: Vec<PersistedEntry> = serde_json::from_slice(&raw).unwrap_or_default();
            let mut map = IndexMap::new();
            for record in records {
                map.insert(
                    (record.namespace, record.key),
                    KvEntry {
                        value: record.value,
                        json: record.json,
                        expires_at: record.expires_at,
                    },
                );
            }
            map
        } else {
            IndexMap::new()
        };

        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    async fn persist(&self, state: &IndexMap<(String, String), KvEntry>) -> anyhow::Result<()> {
        let records: Vec<PersistedEntry> = state
            .iter()
            .map(|((namespace, key), entry)| PersistedEntry {
                namespace: namespace.clone(),
                key: key.clone(),
                value: entry.value.clone(),
                json: entry.json.clone(),
                expires_at: entry.expires_at,
            })
            .collect();
        let bytes = serde_json::to_vec_pretty(&records)?;
        tokio::fs::write(&self.path, bytes).await?;
        Ok(())
    }
}

#[async_trait]
impl KvDriver for JsonFileKvDriver {
    async fn get(&self, namespace: &str, key: &str) -> Option<KvEntry> {
        let state = self.state.lock().await;
        let entry = state.get(&(namespace.to_string(), key.to_string()))?;
        if is_live(entry) {
            Some(entry.clone())
        } else {
            None
        }
    }

    async fn set(&self, namespace: &str, key: &str, entry: KvEntry) {
        let mut state = self.state.lock().await;
        state.insert((namespace.to_string(), key.to_string()), entry);
        let _ = self.persist(&state).await;
    }

    async fn delete(&self, namespace: &str, key: &str) -> bool {
        let mut state = self.state.lock().await;
        let removed = state
            .shift_remove(&(namespace.to_string(), key.to_string()))
            .is_some();
        if removed {
            let _ = self.persist(&state).await;
        }
        removed
    }

    async fn clear(&self, namespace: &str) {
        let mut state = self.state.lock().await;
        state.retain(|(ns, _), _| ns != namespace);
        let _ = self.persist(&state).await;
    }

    async fn keys(&self, namespace: &str) -> Vec<String> {
        let state = self.state.lock().await;
        state
            .iter()
            .filter(|((ns, _), v)| ns == namespace && is_live(v))
            .map(|((_, k), _)| k.clone())
            .collect()
    }
}

/// Per-invocation handle bound to the function's namespace (plus an
/// optional shared namespace, consulted as a fallback on `get`/`has`).
#[derive(Clone)]
pub struct KvHandle {
    driver: Arc<dyn KvDriver>,
    namespace: String,
    shared_namespace: Option<String>,
}

impl KvHandle {
    pub fn new(driver: Arc<dyn KvDriver>, namespace: String, shared_namespace: Option<String>) -> Self {
        Self {
            driver,
            namespace,
            shared_namespace,
        }
    }

    pub async fn get(&self, key: &str) -> Option<KvEntry> {
        if let Some(entry) = self.driver.get(&self.namespace, key).await {
            return Some(entry);
        }
        if let Some(shared) = &self.shared_namespace {
            return self.driver.get(shared, key).await;
        }
        None
    }

    pub async fn set(&self, key: &str, entry: KvEntry) {
        self.driver.set(&self.namespace, key, entry).await;
    }

    pub async fn has(&self, key: &str) -> bool {
        self.get(key).await.is_some()
    }

    pub async fn delete(&self, key: &str) -> bool {
        self.driver.delete(&self.namespace, key).await
    }

    pub async fn clear(&self) {
        self.driver.clear(&self.namespace).await;
    }

    pub async fn keys(&self) -> Vec<String> {
        self.driver.keys(&self.namespace).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_then_get_roundtrips() {
        let driver = Arc::new(InMemoryKvDriver::new());
        let handle = KvHandle::new(driver, "fn-1".to_string(), None);

        handle
            .set(
                "counter",
                KvEntry {
                    value: b"1".to_vec(),
                    json: Some(serde_json::json!(1)),
                    expires_at: None,
                },
            )
            .await;

        let entry = handle.get("counter").await.unwrap();
        assert_eq!(entry.value, b"1");
        assert!(handle.has("counter").await);
    }

    #[tokio::test]
    async fn expired_entry_is_absent() {
        let driver = Arc::new(InMemoryKvDriver::new());
        let handle = KvHandle::new(driver, "fn-1".to_string(), None);

        handle
            .set(
                "x",
                KvEntry {
                    value: vec![],
                    json: None,
                    expires_at: Some(Utc::now() - chrono::Duration::seconds(1)),
                },
            )
            .await;

        assert!(handle.get("x").await.is_none());
        assert!(!handle.has("x").await);
    }

    #[tokio::test]
    async fn clear_only_affects_its_own_namespace() {
        let driver = Arc::new(InMemoryKvDriver::new());
        let a = KvHandle::new(driver.clone(), "fn-a".to_string(), None);
        let b = KvHandle::new(driver, "fn-b".to_string(), None);

        a.set("k", KvEntry { value: vec![1], json: None, expires_at: None }).await;
        b.set("k", KvEntry { value: vec![2], json: None, expires_at: None }).await;

        a.clear().await;

        assert!(a.get("k").await.is_none());
        assert!(b.get("k").await.is_some());
    }

    #[tokio::test]
    async fn keys_preserve_insertion_order() {
        let driver = Arc::new(InMemoryKvDriver::new());
        let handle = KvHandle::new(driver, "fn-1".to_string(), None);
        for k in ["b", "a", "c"] {
            handle.set(k, KvEntry { value: vec![], json: None, expires_at: None }).await;
        }
        assert_eq!(handle.keys().await, vec!["b", "a", "c"]);
    }

    #[tokio::test]
    async fn json_file_driver_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kv.json");

        {
            let driver = Arc::new(JsonFileKvDriver::open(path.clone()).await.unwrap());
            let handle = KvHandle::new(driver, "fn-1".to_string(), None);
            handle
                .set("a", KvEntry { value: b"1".to_vec(), json: None, expires_at: None })
                .await;
            handle
                .set("b", KvEntry { value: b"2".to_vec(), json: None, expires_at: None })
                .await;
        }

        let driver = Arc::new(JsonFileKvDriver::open(path).await.unwrap());
        let handle = KvHandle::new(driver, "fn-1".to_string(), None);
        assert_eq!(handle.keys().await, vec!["a", "b"]);
    }
}
