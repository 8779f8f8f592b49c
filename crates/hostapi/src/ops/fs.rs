use base64::Engine as _;
use deno_core::{anyhow::Error as AnyError, op, OpState};
use serde::Serialize;

use crate::context::HostContext;

#[derive(Serialize)]
pub struct StatResult {
    pub size: u64,
    pub is_directory: bool,
}

/// `fs.readFile(path) -> base64` (§4.5 `fs` module, read-only archive view).
#[op]
pub fn op_fs_read_file(state: &mut OpState, path: String) -> Result<String, AnyError> {
    let ctx = state.borrow::<HostContext>();
    let bytes = ctx.vfs.read(&path)?;
    Ok(base64::engine::general_purpose::STANDARD.encode(bytes))
}

#[op]
pub fn op_fs_exists(state: &mut OpState, path: String) -> Result<bool, AnyError> {
    let ctx = state.borrow::<HostContext>();
    Ok(ctx.vfs.exists(&path))
}

#[op]
pub fn op_fs_stat(state: &mut OpState, path: String) -> Result<Option<StatResult>, AnyError> {
    let ctx = state.borrow::<HostContext>();
    Ok(ctx
        .vfs
        .stat(&path)
        .map(|(size, is_directory)| StatResult { size, is_directory }))
}

#[op]
pub fn op_fs_read_dir(state: &mut OpState, path: String) -> Result<Vec<String>, AnyError> {
    let ctx = state.borrow::<HostContext>();
    Ok(ctx.vfs.read_dir(&path)?)
}
