use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use sha2::{Digest, Sha256};
use sqlx::SqlitePool;
use tempfile::TempDir;
use tokio::task::JoinHandle;
use uuid::Uuid;

use faas_api::AppState;
use faas_hostapi::{InMemoryKvDriver, KvDriver};
use faas_materializer::{FsBlobStore, PackageMaterializer};
use faas_metrics::MetricsService;
use faas_models::{
    EnvSnapshot, FunctionDescriptor, FunctionVersion, LogStore, NetworkPolicy, RetentionPolicy,
};
use faas_resolver::{ConcurrencyManager, FunctionResolver, SqliteLogStore, SqliteMetadataStore};
use faas_sandbox::SandboxEngine;

/// An execution core booted in-process on an ephemeral port, with its own
/// SQLite-backed Metadata/Log Store and filesystem blob store under a
/// scratch directory. Adapted from the teacher's `TestDaemon`/`spawn_daemon`,
/// which instead shelled out to a second `cargo run --bin` process; there is
/// no control-plane CRUD surface here (§C non-goal), so fixtures are seeded
/// directly against the Metadata/Blob Store rather than through HTTP calls
/// the teacher's daemon made against its own admin API.
pub struct TestHarness {
    pub base_url: String,
    pub blobs_dir: TempDir,
    metadata_store: Arc<SqliteMetadataStore>,
    server: JoinHandle<()>,
}

impl TestHarness {
    pub async fn shutdown(self) {
        self.server.abort();
    }

    /// Registers a function backed by the given zip archive bytes, active
    /// and ready to invoke immediately. Returns the descriptor so tests can
    /// reference `function_id`/`name` in requests and assertions.
    pub async fn register_function(
        &self,
        name: &str,
        archive: &[u8],
        env: EnvSnapshot,
        timeout_ms: u64,
    ) -> Result<FunctionDescriptor> {
        let content_hash = format!("{:x}", Sha256::digest(archive));
        tokio::fs::write(self.blobs_dir.path().join(format!("{content_hash}.zip")), archive)
            .await?;

        let function_id = Uuid::new_v4();
        let version_id = Uuid::new_v4();

        let descriptor = FunctionDescriptor {
            function_id,
            project_id: Uuid::new_v4(),
            name: name.to_string(),
            active: true,
            requires_api_key: false,
            api_key: None,
            active_version_id: Some(version_id),
            retention: RetentionPolicy::None,
            network_policy: NetworkPolicy::permissive(),
            timeout_ms,
            heap_cap_mib: 256,
            max_concurrency: None,
            cron_schedule: None,
            created_at: Utc::now(),
        };
        self.metadata_store.upsert_function(&descriptor).await?;

        let version = FunctionVersion {
            version_id,
            function_id,
            sequence: 1,
            content_hash,
            byte_size: archive.len() as u64,
            creator_id: Uuid::new_v4(),
            created_at: Utc::now(),
            ready: true,
        };
        self.metadata_store.insert_version(&version).await?;

        for (key, value) in env.0 {
            self.metadata_store.set_env(function_id, &key, &value).await?;
        }

        Ok(descriptor)
    }

    /// Re-upserts the descriptor with a new `max_concurrency` cap, exercising
    /// the same per-function semaphore path a control-plane update would.
    pub async fn set_max_concurrency(
        &self,
        descriptor: &FunctionDescriptor,
        max_concurrency: Option<u32>,
    ) -> Result<FunctionDescriptor> {
        let mut updated = descriptor.clone();
        updated.max_concurrency = max_concurrency;
        self.metadata_store.upsert_function(&updated).await?;
        Ok(updated)
    }
}

/// Boots a fresh harness: in-memory SQLite pool, temp-directory blob store,
/// in-memory KV driver, listening on an OS-assigned port.
pub async fn spawn_harness() -> Result<TestHarness> {
    let blobs_dir = tempfile::tempdir()?;

    let pool = SqlitePool::connect("sqlite::memory:").await?;
    let metadata_store = Arc::new(SqliteMetadataStore::new(pool.clone()).await?);
    let log_store: Arc<dyn LogStore> = Arc::new(SqliteLogStore::new(pool).await?);

    let blob_store = Arc::new(FsBlobStore::new(blobs_dir.path().to_path_buf()));
    let materializer = Arc::new(PackageMaterializer::new(blob_store, 64 * 1024 * 1024));

    let resolver = Arc::new(FunctionResolver::new(metadata_store.clone()));
    let sandbox = Arc::new(SandboxEngine::new());
    let concurrency = ConcurrencyManager::new(64);
    let metrics = Arc::new(MetricsService::new().map_err(|e| anyhow::anyhow!(e.to_string()))?);
    let kv_driver: Arc<dyn KvDriver> = Arc::new(InMemoryKvDriver::new());

    let state = AppState::new(
        resolver,
        materializer,
        sandbox,
        concurrency,
        kv_driver,
        None,
        log_store,
        metrics,
        30_000,
    );
    let app = faas_api::build_router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let base_url = format!("http://{addr}");

    let server = tokio::spawn(async move {
        let _ = axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await;
    });

    Ok(TestHarness {
        base_url,
        blobs_dir,
        metadata_store,
        server,
    })
}
