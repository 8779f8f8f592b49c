use deno_core::{anyhow::Error as AnyError, op, OpState};

use crate::context::HostContext;

/// `process.env[key]` (§4.5 `process`, read-only snapshot taken at invocation time).
#[op]
pub fn op_env_get(state: &mut OpState, key: String) -> Result<Option<String>, AnyError> {
    let ctx = state.borrow::<HostContext>();
    Ok(ctx.env.get(&key).map(str::to_string))
}

#[op]
pub fn op_env_has(state: &mut OpState, key: String) -> Result<bool, AnyError> {
    let ctx = state.borrow::<HostContext>();
    Ok(ctx.env.get(&key).is_some())
}
