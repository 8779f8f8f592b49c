use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::{EnvSnapshot, FunctionDescriptor, FunctionVersion, NetworkPolicy, RetentionPolicy};
use crate::error::FaasError;
use crate::invocation::ExecutionLog;

/// Control-plane contract (§6): the execution core only reads/writes through
/// this interface. The relational store itself, and everything that
/// populates it, is out of scope of the core.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    async fn find_function(&self, reference: &str) -> Result<FunctionDescriptor, FaasError>;
    async fn load_version(
        &self,
        function_id: Uuid,
        version_id: Uuid,
    ) -> Result<FunctionVersion, FaasError>;
    async fn list_env(&self, function_id: Uuid) -> Result<EnvSnapshot, FaasError>;
    async fn get_network_policy(&self, function_id: Uuid) -> Result<NetworkPolicy, FaasError>;
    async fn get_retention(&self, function_id: Uuid) -> Result<RetentionPolicy, FaasError>;
}

/// Blob Store contract (§6): opens the byte stream for a content-addressed
/// archive. Producing archives is a control-plane concern; the core only
/// reads through this.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn open_archive(&self, content_hash: &str) -> Result<Vec<u8>, FaasError>;
}

/// Log Store contract (§6): durable persistence for `ExecutionLog` rows and
/// the retention reaper.
#[async_trait]
pub trait LogStore: Send + Sync {
    async fn append(&self, record: ExecutionLog) -> Result<(), FaasError>;
    async fn reap(&self, function_id: Uuid, policy: &RetentionPolicy) -> Result<u64, FaasError>;
}
