use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use faas_models::{
    BlobStore, EnvSnapshot, FaasError, FunctionDescriptor, FunctionVersion, MetadataStore,
    NetworkPolicy, RetentionPolicy,
};

/// In-memory Metadata Store backing a single function, built from the CLI
/// flags rather than a relational store (§6: "the runner uses the same
/// engine with an in-memory Metadata Store").
pub struct SingleFunctionStore {
    descriptor: FunctionDescriptor,
    version: FunctionVersion,
    env: EnvSnapshot,
}

impl SingleFunctionStore {
    pub fn new(content_hash: String, byte_size: u64, env: EnvSnapshot, timeout_ms: u64, heap_cap_mib: u64) -> Self {
        let function_id = Uuid::new_v4();
        let version_id = Uuid::new_v4();
        let version = FunctionVersion {
            version_id,
            function_id,
            sequence: 1,
            content_hash,
            byte_size,
            creator_id: Uuid::new_v4(),
            created_at: Utc::now(),
            ready: true,
        };
        let descriptor = FunctionDescriptor {
            function_id,
            project_id: Uuid::new_v4(),
            name: "local".to_string(),
            active: true,
            requires_api_key: false,
            api_key: None,
            active_version_id: Some(version_id),
            retention: RetentionPolicy::None,
            network_policy: NetworkPolicy::permissive(),
            timeout_ms,
            heap_cap_mib,
            max_concurrency: None,
            cron_schedule: None,
            created_at: Utc::now(),
        };
        Self { descriptor, version, env }
    }

    pub fn descriptor(&self) -> &FunctionDescriptor {
        &self.descriptor
    }
}

#[async_trait]
impl MetadataStore for SingleFunctionStore {
    async fn find_function(&self, _reference: &str) -> Result<FunctionDescriptor, FaasError> {
        Ok(self.descriptor.clone())
    }

    async fn load_version(&self, _function_id: Uuid, _version_id: Uuid) -> Result<FunctionVersion, FaasError> {
        Ok(self.version.clone())
    }

    async fn list_env(&self, _function_id: Uuid) -> Result<EnvSnapshot, FaasError> {
        Ok(self.env.clone())
    }

    async fn get_network_policy(&self, _function_id: Uuid) -> Result<NetworkPolicy, FaasError> {
        Ok(self.descriptor.network_policy.clone())
    }

    async fn get_retention(&self, _function_id: Uuid) -> Result<RetentionPolicy, FaasError> {
        Ok(self.descriptor.retention.clone())
    }
}

/// Serves the single in-memory archive the local runner just zipped up.
pub struct SingleArchiveBlobStore(pub Vec<u8>);

#[async_trait]
impl BlobStore for SingleArchiveBlobStore {
    async fn open_archive(&self, _content_hash: &str) -> Result<Vec<u8>, FaasError> {
        Ok(self.0.clone())
    }
}
