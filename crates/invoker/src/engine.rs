use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use deno_core::{Extension, JsRuntime, RuntimeOptions};
use tracing::{info, instrument};
use uuid::Uuid;

use faas_hostapi::{AbortHandle, HostContext, KvHandle, LogRecorder};
use faas_materializer::VfsView;
use faas_models::{EnvSnapshot, FaasError, NetworkPolicy, OutcomeTag};

use crate::request::{op_request_snapshot, InboundRequest};
use crate::response::{
    op_res_cookie, op_res_end, op_res_get_header, op_res_get_headers, op_res_json,
    op_res_redirect, op_res_remove_header, op_res_send, op_res_set_header, op_res_status,
    op_res_type, op_res_write, ResState, ResponseState, SharedResponse,
};

const BOOTSTRAP_SCRIPT: &str = include_str!("bootstrap.js");

/// The raw result of one invocation, before it is sanitized into an
/// `ExecutionLog` by the caller (§4.9).
pub struct InvocationResult {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    pub outcome: OutcomeTag,
    pub error: Option<FaasError>,
    pub recorder: Arc<LogRecorder>,
}

fn sandbox_extension() -> Extension {
    Extension::builder()
        .ops(vec![
            op_request_snapshot::decl(),
            op_res_status::decl(),
            op_res_set_header::decl(),
            op_res_get_header::decl(),
            op_res_get_headers::decl(),
            op_res_remove_header::decl(),
            op_res_type::decl(),
            op_res_cookie::decl(),
            op_res_write::decl(),
            op_res_json::decl(),
            op_res_send::decl(),
            op_res_end::decl(),
            op_res_redirect::decl(),
        ])
        .js(vec![("faas:req-res", BOOTSTRAP_SCRIPT)])
        .build()
}

/// Wraps the version's `index.js` source as a CommonJS module and invokes
/// its default/top-level export with the freshly built `req`/`res` pair
/// (§4.4 steps 3-5).
fn entry_script(source: &str) -> String {
    format!(
        r#"
        (function() {{
            const module = {{ exports: {{}} }};
            const exports = module.exports;
            (function(module, exports, require) {{
                {source}
            }})(module, exports, globalThis.require);

            const handler = typeof module.exports === "function" ? module.exports : module.exports.default;
            if (typeof handler !== "function") {{
                throw new Error("entry module does not export a handler function");
            }}

            const req = globalThis.__buildReq();
            const res = globalThis.__buildRes();
            return Promise.resolve(handler(req, res));
        }})()
        "#
    )
}

/// Drives isolates; holds no per-function state since heap cap and timeout
/// vary per function and are passed into `invoke` from the descriptor (§4.4
/// step 1: "Maximum heap size set from config").
#[derive(Default)]
pub struct SandboxEngine;

impl SandboxEngine {
    pub fn new() -> Self {
        Self
    }

    /// Runs the full invocation lifecycle (§4.4): allocate isolate, inject
    /// host capabilities, register the entry module, build `req`/`res`,
    /// invoke the handler, await completion, enforce the deadline, tear down.
    #[allow(clippy::too_many_arguments)]
    #[instrument(skip(self, vfs, env, kv, network_policy, request), fields(%function_id, %invocation_id))]
    pub async fn invoke(
        &self,
        function_id: Uuid,
        invocation_id: Uuid,
        vfs: Arc<VfsView>,
        env: EnvSnapshot,
        kv: KvHandle,
        network_policy: NetworkPolicy,
        timeout: Duration,
        heap_cap_mib: u64,
        request: InboundRequest,
    ) -> InvocationResult {
        let recorder = Arc::new(LogRecorder::new());
        let abort = AbortHandle::new(timeout);

        let local = tokio::task::LocalSet::new();
        local
            .run_until(Self::run_isolate(
                function_id,
                invocation_id,
                vfs,
                env,
                kv,
                network_policy,
                heap_cap_mib,
                abort,
                request,
                recorder.clone(),
            ))
            .await
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_isolate(
        function_id: Uuid,
        invocation_id: Uuid,
        vfs: Arc<VfsView>,
        env: EnvSnapshot,
        kv: KvHandle,
        network_policy: NetworkPolicy,
        heap_cap_mib: u64,
        abort: AbortHandle,
        request: InboundRequest,
        recorder: Arc<LogRecorder>,
    ) -> InvocationResult {
        let response: SharedResponse = Rc::new(RefCell::new(ResponseState::new()));

        let heap_limit_bytes = (heap_cap_mib * 1024 * 1024) as usize;
        let create_params = deno_core::v8::CreateParams::default().heap_limits(0, heap_limit_bytes);

        let mut runtime = JsRuntime::new(RuntimeOptions {
            extensions: vec![faas_hostapi::host_api_extension(), sandbox_extension()],
            create_params: Some(create_params),
            ..Default::default()
        });

        {
            let op_state = runtime.op_state();
            let mut state = op_state.borrow_mut();
            state.put(HostContext {
                invocation_id,
                function_id,
                vfs: vfs.clone(),
                env,
                kv,
                network_policy,
                recorder: recorder.clone(),
                abort: abort.clone(),
            });
            state.put(request);
            state.put(response.clone());
        }

        let entry_source = match std::str::from_utf8(match vfs.entry_point() {
            Ok(bytes) => bytes,
            Err(err) => return Self::terminal_error(err, recorder),
        }) {
            Ok(s) => s.to_string(),
            Err(_) => {
                return Self::terminal_error(
                    FaasError::InternalError { reason: "entry point is not valid UTF-8".to_string() },
                    recorder,
                )
            }
        };

        let run = async {
            let promise = runtime.execute_script("faas:entry", entry_script(&entry_source))?;
            runtime.resolve_value(promise).await
        };

        let outcome = tokio::select! {
            result = run => Self::classify(result),
            _ = tokio::time::sleep(abort.remaining()) => {
                abort.fire();
                Err(FaasError::Timeout { timeout_ms: abort.remaining().as_millis() as u64 })
            }
        };

        info!(outcome = ?outcome.as_ref().map(|_| "ok").unwrap_or("error"), "invocation completed");

        let res_state = response.borrow();
        match outcome {
            Ok(()) => {
                let (status, headers, body) = Self::finalize_response(&res_state);
                InvocationResult {
                    status,
                    headers,
                    body,
                    outcome: OutcomeTag::Success,
                    error: None,
                    recorder,
                }
            }
            Err(err) => {
                let (status, headers, body) = if res_state.is_terminal() {
                    Self::finalize_response(&res_state)
                } else {
                    (err.http_status(), vec![("content-type".to_string(), "application/json".to_string())], serde_json::to_vec(&err.to_envelope()).unwrap_or_default())
                };
                let tag = Self::outcome_tag_for(&err);
                InvocationResult { status, headers, body, outcome: tag, error: Some(err), recorder }
            }
        }
    }

    fn finalize_response(res: &ResponseState) -> (u16, Vec<(String, String)>, Vec<u8>) {
        let mut headers: Vec<(String, String)> = res.headers.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        for cookie in &res.set_cookies {
            headers.push(("set-cookie".to_string(), cookie.clone()));
        }
        (res.status, headers, res.body.clone())
    }

    fn classify(
        result: Result<deno_core::v8::Global<deno_core::v8::Value>, deno_core::anyhow::Error>,
    ) -> Result<(), FaasError> {
        match result {
            Ok(_) => Ok(()),
            Err(err) => Err(Self::anyhow_to_faas_error(err)),
        }
    }

    fn anyhow_to_faas_error(err: deno_core::anyhow::Error) -> FaasError {
        match err.downcast::<FaasError>() {
            Ok(faas_err) => faas_err,
            Err(err) => FaasError::UserError { message: err.to_string(), stack: None },
        }
    }

    fn outcome_tag_for(err: &FaasError) -> OutcomeTag {
        match err {
            FaasError::Timeout { .. } => OutcomeTag::Timeout,
            FaasError::PolicyDenied { .. } => OutcomeTag::PolicyDenied,
            FaasError::MemoryExhausted => OutcomeTag::InternalError,
            FaasError::UserError { .. }
            | FaasError::HeadersAlreadySent
            | FaasError::ReadOnlyFilesystem
            | FaasError::AuthFailed
            | FaasError::OperationNotPermitted { .. }
            | FaasError::ModuleNotFound { .. } => OutcomeTag::UserError,
            _ => OutcomeTag::InternalError,
        }
    }

    fn terminal_error(err: FaasError, recorder: Arc<LogRecorder>) -> InvocationResult {
        let envelope = err.to_envelope();
        InvocationResult {
            status: err.http_status(),
            headers: vec![("content-type".to_string(), "application/json".to_string())],
            body: serde_json::to_vec(&envelope).unwrap_or_default(),
            outcome: Self::outcome_tag_for(&err),
            error: Some(err),
            recorder,
        }
    }
}
