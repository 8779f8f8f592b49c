use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;

/// Small cache holding resolved descriptors and version handles (§4.2).
/// Invalidated explicitly by version-switch/update/delete events from the
/// control plane, or by a short TTL fallback when no invalidation event
/// arrives. Generic over the key so the resolver can keep one cache keyed by
/// function id and another keyed by the raw reference string.
pub struct ResolverCache<K: Eq + Hash + Clone, V: Clone> {
    entries: RwLock<HashMap<K, (V, Instant)>>,
    ttl: Duration,
    capacity: usize,
}

impl<K: Eq + Hash + Clone, V: Clone> ResolverCache<K, V> {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
            capacity,
        }
    }

    pub async fn get(&self, key: &K) -> Option<V> {
        let guard = self.entries.read().await;
        let (value, inserted_at) = guard.get(key)?;
        if inserted_at.elapsed() > self.ttl {
            return None;
        }
        Some(value.clone())
    }

    pub async fn put(&self, key: K, value: V) {
        let mut guard = self.entries.write().await;
        if guard.len() >= self.capacity && !guard.contains_key(&key) {
            // Evict the oldest entry to bound memory; this is a small cache
            // so a linear scan is cheap relative to a cache miss's real cost
            // (a metadata-store round trip).
            if let Some(oldest_key) = guard
                .iter()
                .min_by_key(|(_, (_, inserted_at))| *inserted_at)
                .map(|(k, _)| k.clone())
            {
                guard.remove(&oldest_key);
            }
        }
        guard.insert(key, (value, Instant::now()));
    }

    pub async fn invalidate(&self, key: &K) {
        self.entries.write().await.remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use uuid::Uuid;

    #[tokio::test]
    async fn put_then_get_returns_value() {
        let cache: ResolverCache<Uuid, String> = ResolverCache::new(Duration::from_secs(5), 8);
        let id = Uuid::new_v4();
        cache.put(id, "hello".to_string()).await;
        assert_eq!(cache.get(&id).await, Some("hello".to_string()));
    }

    #[tokio::test]
    async fn invalidate_removes_entry() {
        let cache: ResolverCache<Uuid, u32> = ResolverCache::new(Duration::from_secs(5), 8);
        let id = Uuid::new_v4();
        cache.put(id, 1).await;
        cache.invalidate(&id).await;
        assert_eq!(cache.get(&id).await, None);
    }

    #[tokio::test]
    async fn expired_entry_is_not_returned() {
        let cache: ResolverCache<Uuid, u32> = ResolverCache::new(Duration::from_millis(1), 8);
        let id = Uuid::new_v4();
        cache.put(id, 1).await;
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(cache.get(&id).await, None);
    }

    #[tokio::test]
    async fn string_keyed_cache_works_for_name_lookups() {
        let cache: ResolverCache<String, u32> = ResolverCache::new(Duration::from_secs(5), 8);
        cache.put("hello".to_string(), 1).await;
        assert_eq!(cache.get(&"hello".to_string()).await, Some(1));
    }
}
