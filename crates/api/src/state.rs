use std::sync::Arc;

use faas_hostapi::KvDriver;
use faas_materializer::PackageMaterializer;
use faas_metrics::MetricsService;
use faas_models::LogStore;
use faas_resolver::{ConcurrencyManager, FunctionResolver};
use faas_sandbox::SandboxEngine;

#[derive(Clone)]
pub struct AppState {
    pub resolver: Arc<FunctionResolver>,
    pub materializer: Arc<PackageMaterializer>,
    pub sandbox: Arc<SandboxEngine>,
    pub concurrency: ConcurrencyManager,
    pub kv_driver: Arc<dyn KvDriver>,
    pub shared_kv_namespace: Option<String>,
    pub log_store: Arc<dyn LogStore>,
    pub metrics: Arc<MetricsService>,
    pub default_timeout_ms: u64,
}

impl AppState {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        resolver: Arc<FunctionResolver>,
        materializer: Arc<PackageMaterializer>,
        sandbox: Arc<SandboxEngine>,
        concurrency: ConcurrencyManager,
        kv_driver: Arc<dyn KvDriver>,
        shared_kv_namespace: Option<String>,
        log_store: Arc<dyn LogStore>,
        metrics: Arc<MetricsService>,
        default_timeout_ms: u64,
    ) -> Self {
        Self {
            resolver,
            materializer,
            sandbox,
            concurrency,
            kv_driver,
            shared_kv_namespace,
            log_store,
            metrics,
            default_timeout_ms,
        }
    }
}
