use deno_core::{anyhow::Error as AnyError, op, OpState};

use crate::context::HostContext;

#[op]
pub fn op_console_write(state: &mut OpState, channel: String, message: String) -> Result<(), AnyError> {
    let ctx = state.borrow::<HostContext>();
    match channel.as_str() {
        "stderr" => ctx.recorder.write_stderr(&message),
        _ => ctx.recorder.write_stdout(&message),
    }
    Ok(())
}
