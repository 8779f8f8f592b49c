pub mod context;
pub mod kv;
pub mod ops;
pub mod recorder;

use deno_core::Extension;

pub use context::{AbortHandle, HostContext};
pub use kv::{InMemoryKvDriver, JsonFileKvDriver, KvDriver, KvHandle};
pub use recorder::LogRecorder;

/// The JS-side bootstrap evaluated before the function's `index.js` (§4.5).
/// Wires `Deno.core.opSync`/`opAsync` calls behind the global surface and the
/// `require()`-shaped module resolver user code expects.
pub const BOOTSTRAP_SCRIPT: &str = include_str!("bootstrap.js");

/// Builds the deno_core extension exposing the full Host-API surface (§4.5)
/// to a freshly allocated isolate. One extension instance is built per
/// invocation, matching the one-isolate-per-invocation model (§4.4).
pub fn host_api_extension() -> Extension {
    Extension::builder()
        .ops(vec![
            ops::console::op_console_write::decl(),
            ops::kv::op_kv_get::decl(),
            ops::kv::op_kv_set::decl(),
            ops::kv::op_kv_has::decl(),
            ops::kv::op_kv_delete::decl(),
            ops::kv::op_kv_clear::decl(),
            ops::kv::op_kv_keys::decl(),
            ops::crypto::op_crypto_digest::decl(),
            ops::crypto::op_crypto_hmac::decl(),
            ops::crypto::op_crypto_random_bytes::decl(),
            ops::crypto::op_crypto_pbkdf2::decl(),
            ops::crypto::op_crypto_scrypt::decl(),
            ops::crypto::op_crypto_aes_gcm_encrypt::decl(),
            ops::crypto::op_crypto_aes_gcm_decrypt::decl(),
            ops::crypto::op_crypto_aes_cbc_encrypt::decl(),
            ops::crypto::op_crypto_aes_cbc_decrypt::decl(),
            ops::fs::op_fs_read_file::decl(),
            ops::fs::op_fs_exists::decl(),
            ops::fs::op_fs_stat::decl(),
            ops::fs::op_fs_read_dir::decl(),
            ops::net::op_net_fetch::decl(),
            ops::net::op_net_resolve_dns::decl(),
            ops::process::op_env_get::decl(),
            ops::process::op_env_has::decl(),
            ops::timers::op_timer_sleep::decl(),
            ops::zlib::op_zlib_transform::decl(),
        ])
        .js(vec![("faas:bootstrap", BOOTSTRAP_SCRIPT)])
        .state(|_state| Ok(()))
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bootstrap_script_is_non_empty() {
        assert!(!BOOTSTRAP_SCRIPT.trim().is_empty());
    }

    #[test]
    fn extension_builds_without_panicking() {
        let _ = host_api_extension();
    }
}
