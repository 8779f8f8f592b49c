use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use uuid::Uuid;

use faas_materializer::VfsView;
use faas_models::{EnvSnapshot, FaasError, NetworkPolicy};

use crate::kv::KvHandle;
use crate::recorder::LogRecorder;

/// The invocation-scoped abort signal (§4.4 step 7, §5). Folded implicitly
/// into every outbound host call; firing it makes every in-flight and
/// future host call on this invocation reject with `aborted`.
#[derive(Clone)]
pub struct AbortHandle {
    flag: Arc<AtomicBool>,
    deadline: Instant,
}

impl AbortHandle {
    pub fn new(budget: Duration) -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
            deadline: Instant::now() + budget,
        }
    }

    pub fn fire(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_aborted(&self) -> bool {
        self.flag.load(Ordering::SeqCst) || Instant::now() >= self.deadline
    }

    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    pub fn check(&self) -> Result<(), FaasError> {
        if self.is_aborted() {
            Err(FaasError::Aborted)
        } else {
            Ok(())
        }
    }
}

/// Everything the Host-API surface needs bound to one invocation: the
/// function's read-only view of its code, its env snapshot, its KV
/// namespace, its outbound network policy, and its log channels. Stored in
/// the isolate's `OpState` so every op can reach it.
pub struct HostContext {
    pub invocation_id: Uuid,
    pub function_id: Uuid,
    pub vfs: Arc<VfsView>,
    pub env: EnvSnapshot,
    pub kv: KvHandle,
    pub network_policy: NetworkPolicy,
    pub recorder: Arc<LogRecorder>,
    pub abort: AbortHandle,
}

impl HostContext {
    pub fn check_network(&self, scheme: &str, host: &str, port: u16) -> Result<(), FaasError> {
        self.network_policy
            .check(scheme, host, port)
            .map_err(|rule| FaasError::PolicyDenied { rule })
    }
}
