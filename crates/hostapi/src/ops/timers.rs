use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use deno_core::{anyhow::Error as AnyError, op, OpState};

use crate::context::HostContext;

/// Suspends the calling macrotask for `ms` milliseconds, backing
/// `setTimeout`/`setInterval`/`setImmediate` (§4.5 timers, §5 suspension
/// points). Races against the invocation's deadline so a pending sleep never
/// outlives its invocation.
#[op]
pub async fn op_timer_sleep(state: Rc<RefCell<OpState>>, ms: u64) -> Result<(), AnyError> {
    let abort = {
        let s = state.borrow();
        s.borrow::<HostContext>().abort.clone()
    };

    tokio::select! {
        _ = tokio::time::sleep(Duration::from_millis(ms)) => Ok(()),
        _ = tokio::time::sleep(abort.remaining()) => Err(faas_models::FaasError::Aborted.into()),
    }
}
