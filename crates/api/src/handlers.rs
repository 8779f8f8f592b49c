use std::net::SocketAddr;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::{ConnectInfo, Path, RawQuery, State};
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use tracing::{error, info, instrument};
use uuid::Uuid;

use faas_hostapi::KvHandle;
use faas_models::{FaasError, OutcomeTag, RequestEnvelope, ResponseEnvelope};
use faas_sandbox::InboundRequest;

use crate::middleware::constant_time_eq;
use crate::AppState;

const API_KEY_HEADER: &str = "x-api-key";
/// Headers retained in the durable log record (§4.9); everything else is
/// dropped rather than persisted verbatim.
const LOGGED_HEADERS: &[&str] = &["content-type", "user-agent", "accept"];
const LOG_BODY_PREVIEW_CAP: usize = 2048;

#[instrument(skip(state, headers, body), fields(function_ref = %function_ref))]
pub async fn invoke_function(
    State(state): State<AppState>,
    Path(function_ref): Path<String>,
    method: Method,
    headers: HeaderMap,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    RawQuery(query): RawQuery,
    body: Bytes,
) -> Response {
    dispatch(
        state,
        function_ref,
        String::new(),
        query.unwrap_or_default(),
        method,
        headers,
        connect_info,
        body,
    )
    .await
}

#[instrument(skip(state, headers, body), fields(function_ref = %function_ref, tail = %rest))]
pub async fn invoke_function_with_tail(
    State(state): State<AppState>,
    Path((function_ref, rest)): Path<(String, String)>,
    method: Method,
    headers: HeaderMap,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    RawQuery(query): RawQuery,
    body: Bytes,
) -> Response {
    dispatch(
        state,
        function_ref,
        format!("/{rest}"),
        query.unwrap_or_default(),
        method,
        headers,
        connect_info,
        body,
    )
    .await
}

/// The Invocation Dispatcher's per-request contract (§4.1, steps 1-7).
#[allow(clippy::too_many_arguments)]
async fn dispatch(
    state: AppState,
    function_ref: String,
    tail_path: String,
    query: String,
    method: Method,
    headers: HeaderMap,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    body: Bytes,
) -> Response {
    let descriptor = match state.resolver.resolve(&function_ref).await {
        Ok(d) => d,
        Err(err) => return error_response(err),
    };

    if descriptor.requires_api_key {
        let provided = headers.get(API_KEY_HEADER).and_then(|v| v.to_str().ok());
        let expected = descriptor.api_key.as_deref();
        let ok = matches!((provided, expected), (Some(p), Some(e)) if constant_time_eq(p, e));
        if !ok {
            return error_response(FaasError::ApiKeyRequired);
        }
    }

    if let Err(err) = faas_resolver::check_invocable(&descriptor) {
        return error_response(err);
    }

    let (_global_guard, _fn_guard) =
        match state.concurrency.try_acquire(descriptor.function_id, descriptor.max_concurrency) {
            Ok(guards) => guards,
            Err(err) => return error_response(err),
        };

    let version = match state.resolver.load_active_version(&descriptor).await {
        Ok(v) => v,
        Err(err) => return error_response(err),
    };
    let vfs = match state.materializer.materialize(&version).await {
        Ok(v) => v,
        Err(err) => return error_response(err),
    };
    let env = match state.resolver.env_snapshot(descriptor.function_id).await {
        Ok(e) => e,
        Err(err) => return error_response(err),
    };
    let network_policy = match state.resolver.network_policy(descriptor.function_id).await {
        Ok(p) => p,
        Err(err) => return error_response(err),
    };

    let request_envelope = RequestEnvelope {
        method: method.to_string(),
        path: tail_path.clone(),
        query: query.clone(),
        headers: headers
            .iter()
            .filter(|(k, _)| LOGGED_HEADERS.contains(&k.as_str().to_ascii_lowercase().as_str()))
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.to_string(), v.to_string())))
            .collect(),
    };

    let inbound = InboundRequest {
        method: method.to_string(),
        path: if tail_path.is_empty() { "/".to_string() } else { tail_path },
        query,
        headers: headers
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.to_string(), v.to_string())))
            .collect(),
        body: body.to_vec(),
        remote_addr: connect_info.map(|c| c.0.to_string()).unwrap_or_default(),
    };

    let kv = KvHandle::new(state.kv_driver.clone(), descriptor.function_id.to_string(), state.shared_kv_namespace.clone());
    let timeout = Duration::from_millis(descriptor.timeout_ms);
    let invocation_id = Uuid::new_v4();
    let started_at = Utc::now();

    info!(function_id = %descriptor.function_id, %invocation_id, "invocation started");
    let _in_flight = state.metrics.invocation_started();

    let result = state
        .sandbox
        .invoke(
            descriptor.function_id,
            invocation_id,
            vfs,
            env,
            kv,
            network_policy,
            timeout,
            descriptor.heap_cap_mib,
            inbound,
        )
        .await;

    let duration_ms = (Utc::now() - started_at).num_milliseconds().max(0) as u64;
    state.metrics.record_invocation(result.outcome, duration_ms as f64);
    if result.outcome == OutcomeTag::PolicyDenied {
        state.metrics.record_policy_denial(
            result.error.as_ref().map(|e| e.error_kind()).unwrap_or("policy_denied"),
        );
    }

    let stdout = result.recorder.take_stdout();
    let stderr = result.recorder.take_stderr();
    let log = faas_models::ExecutionLog {
        invocation_id,
        function_id: descriptor.function_id,
        version_id: version.version_id,
        started_at,
        ended_at: Utc::now(),
        duration_ms,
        outcome: result.outcome,
        http_status: result.status,
        request: request_envelope,
        response: ResponseEnvelope {
            status: result.status,
            headers: result.headers.iter().cloned().collect(),
            body_preview: String::from_utf8_lossy(&result.body[..result.body.len().min(LOG_BODY_PREVIEW_CAP)]).to_string(),
        },
        stdout,
        stderr,
        error_kind: result.error.as_ref().map(|e| e.error_kind().to_string()),
        error_message: result.error.as_ref().map(|e| e.to_string()),
        error_stack: None,
    };

    if let Err(err) = state.log_store.append(log).await {
        error!(function_id = %descriptor.function_id, %invocation_id, %err, "failed to persist execution log");
    }

    build_response(result.status, result.headers, result.body)
}

fn build_response(status: u16, headers: Vec<(String, String)>, body: Vec<u8>) -> Response {
    let mut response_headers = HeaderMap::new();
    for (key, value) in headers {
        if let (Ok(name), Ok(value)) = (HeaderName::from_bytes(key.as_bytes()), HeaderValue::from_str(&value)) {
            response_headers.append(name, value);
        }
    }
    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, response_headers, body).into_response()
}

fn error_response(err: FaasError) -> Response {
    let status = StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, axum::Json(err.to_envelope())).into_response()
}

#[instrument]
pub async fn health_check() -> &'static str {
    "OK"
}

#[instrument(skip(state))]
pub async fn metrics(State(state): State<AppState>) -> Result<String, StatusCode> {
    state.metrics.render().map_err(|e| {
        error!(%e, "failed to render metrics");
        StatusCode::INTERNAL_SERVER_ERROR
    })
}

