use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Semaphore;
use tracing::debug;
use uuid::Uuid;

use faas_models::FaasError;

/// RAII guard that holds a concurrency token. The slot is automatically
/// released when this guard is dropped, regardless of whether the
/// invocation finished normally, errored, or was cancelled at the deadline.
pub struct TokenGuard {
    _permit: tokio::sync::OwnedSemaphorePermit,
}

/// Per-function concurrency cap (§4.1): each function's semaphore is sized
/// from its `max_concurrency`, created lazily on first invocation and kept
/// for the life of the process.
#[derive(Clone)]
pub struct ConcurrencyManager {
    global: Arc<Semaphore>,
    per_function: Arc<DashMap<Uuid, Arc<Semaphore>>>,
}

impl ConcurrencyManager {
    pub fn new(global_limit: usize) -> Self {
        Self {
            global: Arc::new(Semaphore::new(global_limit)),
            per_function: Arc::new(DashMap::new()),
        }
    }

    fn function_semaphore(&self, function_id: Uuid, max_concurrency: Option<u32>) -> Option<Arc<Semaphore>> {
        let limit = max_concurrency? as usize;
        let sem = self
            .per_function
            .entry(function_id)
            .or_insert_with(|| Arc::new(Semaphore::new(limit)))
            .clone();
        Some(sem)
    }

    /// Acquire a global token and, if the function has a configured cap, a
    /// per-function token too. Returns `too_many_concurrent` immediately
    /// (never blocks) when either is exhausted — the dispatcher maps this to
    /// `429` rather than queueing.
    pub fn try_acquire(
        &self,
        function_id: Uuid,
        max_concurrency: Option<u32>,
    ) -> Result<(TokenGuard, Option<TokenGuard>), FaasError> {
        let global_permit = self
            .global
            .clone()
            .try_acquire_owned()
            .map_err(|_| FaasError::TooManyConcurrent)?;

        let function_permit = match self.function_semaphore(function_id, max_concurrency) {
            Some(sem) => match sem.try_acquire_owned() {
                Ok(permit) => Some(TokenGuard { _permit: permit }),
                Err(_) => return Err(FaasError::TooManyConcurrent),
            },
            None => None,
        };

        debug!(%function_id, "acquired concurrency token");
        Ok((TokenGuard { _permit: global_permit }, function_permit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn per_function_cap_rejects_when_exhausted() {
        let manager = ConcurrencyManager::new(256);
        let fn_id = Uuid::new_v4();

        let first = manager.try_acquire(fn_id, Some(1));
        assert!(first.is_ok());

        let second = manager.try_acquire(fn_id, Some(1));
        assert!(matches!(second, Err(FaasError::TooManyConcurrent)));

        drop(first);
        let third = manager.try_acquire(fn_id, Some(1));
        assert!(third.is_ok());
    }

    #[test]
    fn unconfigured_function_only_limited_globally() {
        let manager = ConcurrencyManager::new(1);
        let fn_a = Uuid::new_v4();
        let fn_b = Uuid::new_v4();

        let first = manager.try_acquire(fn_a, None);
        assert!(first.is_ok());

        let second = manager.try_acquire(fn_b, None);
        assert!(matches!(second, Err(FaasError::TooManyConcurrent)));
    }
}
