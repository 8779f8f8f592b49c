use std::sync::Arc;
use std::time::Duration;

use tracing::instrument;
use uuid::Uuid;

use faas_models::{
    EnvSnapshot, FaasError, FunctionDescriptor, FunctionVersion, MetadataStore, NetworkPolicy,
};

use crate::cache::ResolverCache;

const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(5);
const DEFAULT_CACHE_CAPACITY: usize = 1024;

/// The Function Resolver (§4.2): looks up a function by id-or-name, fetches
/// its active version, env snapshot, and network policy, caching all three
/// so a hot function doesn't round-trip to the Metadata Store on every
/// invocation.
pub struct FunctionResolver {
    store: Arc<dyn MetadataStore>,
    descriptor_cache: ResolverCache<String, FunctionDescriptor>,
    version_cache: ResolverCache<Uuid, FunctionVersion>,
}

impl FunctionResolver {
    pub fn new(store: Arc<dyn MetadataStore>) -> Self {
        Self {
            store,
            descriptor_cache: ResolverCache::new(DEFAULT_CACHE_TTL, DEFAULT_CACHE_CAPACITY),
            version_cache: ResolverCache::new(DEFAULT_CACHE_TTL, DEFAULT_CACHE_CAPACITY),
        }
    }

    /// Descriptor lookup by name is case-sensitive and exact (§4.2).
    #[instrument(skip(self))]
    pub async fn resolve(&self, reference: &str) -> Result<FunctionDescriptor, FaasError> {
        if let Some(cached) = self.descriptor_cache.get(&reference.to_string()).await {
            return Ok(cached);
        }

        let descriptor = self.store.find_function(reference).await?;
        self.descriptor_cache
            .put(reference.to_string(), descriptor.clone())
            .await;
        // Also index by the opaque id so a subsequent lookup by id, after one
        // by name (or vice versa), hits the cache too.
        self.descriptor_cache
            .put(descriptor.function_id.to_string(), descriptor.clone())
            .await;
        Ok(descriptor)
    }

    #[instrument(skip(self))]
    pub async fn load_active_version(
        &self,
        descriptor: &FunctionDescriptor,
    ) -> Result<FunctionVersion, FaasError> {
        let version_id = descriptor.active_version_id.ok_or(FaasError::NoActiveVersion)?;

        if let Some(cached) = self.version_cache.get(&version_id).await {
            return Ok(cached);
        }

        let version = self
            .store
            .load_version(descriptor.function_id, version_id)
            .await?;
        self.version_cache.put(version_id, version.clone()).await;
        Ok(version)
    }

    #[instrument(skip(self))]
    pub async fn env_snapshot(&self, function_id: Uuid) -> Result<EnvSnapshot, FaasError> {
        self.store.list_env(function_id).await
    }

    #[instrument(skip(self))]
    pub async fn network_policy(&self, function_id: Uuid) -> Result<NetworkPolicy, FaasError> {
        self.store.get_network_policy(function_id).await
    }

    /// Invalidate cached state for a function after a control-plane mutation
    /// (version switch, update, delete).
    pub async fn invalidate(&self, descriptor: &FunctionDescriptor) {
        self.descriptor_cache.invalidate(&descriptor.name).await;
        self.descriptor_cache
            .invalidate(&descriptor.function_id.to_string())
            .await;
        if let Some(version_id) = descriptor.active_version_id {
            self.version_cache.invalidate(&version_id).await;
        }
    }
}

/// Applies the invocability rules from §3's invariants, independent of
/// whichever store backs the resolver.
pub fn check_invocable(descriptor: &FunctionDescriptor) -> Result<(), FaasError> {
    if !descriptor.active {
        return Err(FaasError::FunctionDisabled);
    }
    if descriptor.active_version_id.is_none() {
        return Err(FaasError::NoActiveVersion);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use faas_models::RetentionPolicy;
    use std::sync::Mutex;

    struct CountingStore {
        descriptor: FunctionDescriptor,
        calls: Mutex<u32>,
    }

    #[async_trait]
    impl MetadataStore for CountingStore {
        async fn find_function(&self, _reference: &str) -> Result<FunctionDescriptor, FaasError> {
            *self.calls.lock().unwrap() += 1;
            Ok(self.descriptor.clone())
        }
        async fn load_version(
            &self,
            _function_id: Uuid,
            version_id: Uuid,
        ) -> Result<FunctionVersion, FaasError> {
            Ok(FunctionVersion {
                version_id,
                function_id: self.descriptor.function_id,
                sequence: 1,
                content_hash: "abc".to_string(),
                byte_size: 10,
                creator_id: Uuid::new_v4(),
                created_at: Utc::now(),
                ready: true,
            })
        }
        async fn list_env(&self, _function_id: Uuid) -> Result<EnvSnapshot, FaasError> {
            Ok(EnvSnapshot::default())
        }
        async fn get_network_policy(&self, _function_id: Uuid) -> Result<NetworkPolicy, FaasError> {
            Ok(NetworkPolicy::permissive())
        }
        async fn get_retention(&self, _function_id: Uuid) -> Result<RetentionPolicy, FaasError> {
            Ok(RetentionPolicy::None)
        }
    }

    fn descriptor() -> FunctionDescriptor {
        FunctionDescriptor {
            function_id: Uuid::new_v4(),
            project_id: Uuid::new_v4(),
            name: "hi".to_string(),
            active: true,
            requires_api_key: false,
            api_key: None,
            active_version_id: Some(Uuid::new_v4()),
            retention: RetentionPolicy::None,
            network_policy: NetworkPolicy::permissive(),
            timeout_ms: 30_000,
            heap_cap_mib: 256,
            max_concurrency: None,
            cron_schedule: None,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn resolve_hits_cache_on_second_call() {
        let descriptor = descriptor();
        let store = Arc::new(CountingStore {
            descriptor: descriptor.clone(),
            calls: Mutex::new(0),
        });
        let resolver = FunctionResolver::new(store.clone());

        resolver.resolve("hi").await.unwrap();
        resolver.resolve("hi").await.unwrap();

        assert_eq!(*store.calls.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn invalidate_forces_a_fresh_lookup() {
        let descriptor = descriptor();
        let store = Arc::new(CountingStore {
            descriptor: descriptor.clone(),
            calls: Mutex::new(0),
        });
        let resolver = FunctionResolver::new(store.clone());

        resolver.resolve("hi").await.unwrap();
        resolver.invalidate(&descriptor).await;
        resolver.resolve("hi").await.unwrap();

        assert_eq!(*store.calls.lock().unwrap(), 2);
    }

    #[test]
    fn disabled_function_is_not_invocable() {
        let mut d = descriptor();
        d.active = false;
        assert!(matches!(check_invocable(&d), Err(FaasError::FunctionDisabled)));
    }

    #[test]
    fn function_without_active_version_is_not_invocable() {
        let mut d = descriptor();
        d.active_version_id = None;
        assert!(matches!(check_invocable(&d), Err(FaasError::NoActiveVersion)));
    }
}
