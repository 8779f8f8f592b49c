pub mod config;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use sqlx::SqlitePool;

use faas_api::AppState;
use faas_hostapi::{JsonFileKvDriver, KvDriver};
use faas_materializer::{FsBlobStore, PackageMaterializer};
use faas_metrics::MetricsService;
use faas_models::LogStore;
use faas_resolver::{ConcurrencyManager, FunctionResolver, SqliteLogStore, SqliteMetadataStore};
use faas_sandbox::SandboxEngine;

use crate::config::{Config, KvDriverKind};

/// Wires every crate together the way `faas-core-server` does, factored out
/// so the in-process test harness (`faas-testsupport`) can build the same
/// stack without shelling out to a second binary.
pub async fn build_state(config: &Config) -> Result<AppState> {
    tokio::fs::create_dir_all(&config.data.blob_store_path).await.ok();

    if let Some(db_path) = config.data.db_url.strip_prefix("sqlite://") {
        let db_path = PathBuf::from(db_path);
        if let Some(parent) = db_path.parent() {
            tokio::fs::create_dir_all(parent).await.ok();
        }
        if !db_path.exists() {
            tokio::fs::File::create(&db_path).await.ok();
        }
    }
    let pool = SqlitePool::connect(&config.data.db_url).await?;
    let metadata_store = Arc::new(SqliteMetadataStore::new(pool.clone()).await?);
    let log_store: Arc<dyn LogStore> = Arc::new(SqliteLogStore::new(pool).await?);

    let blob_store = Arc::new(FsBlobStore::new(PathBuf::from(&config.data.blob_store_path)));
    let materializer = Arc::new(PackageMaterializer::new(
        blob_store,
        config.defaults.max_archive_size_bytes,
    ));

    let resolver = Arc::new(FunctionResolver::new(metadata_store));
    let sandbox = Arc::new(SandboxEngine::new());
    let concurrency = ConcurrencyManager::new(config.limits.max_global_concurrency as usize);
    let metrics = Arc::new(MetricsService::new()?);

    let kv_driver: Arc<dyn KvDriver> = match config.kv.driver {
        KvDriverKind::JsonFile => {
            let path = PathBuf::from(&config.kv.json_file_path);
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent).await.ok();
            }
            Arc::new(JsonFileKvDriver::open(path).await?)
        }
    };

    Ok(AppState::new(
        resolver,
        materializer,
        sandbox,
        concurrency,
        kv_driver,
        None,
        log_store,
        metrics,
        config.defaults.timeout_ms,
    ))
}

pub fn build_router(state: AppState) -> axum::Router {
    faas_api::build_router(state)
}
