use deno_core::{anyhow::Error as AnyError, op, OpState};
use serde::Serialize;

/// The raw inbound HTTP request, seeded into the isolate at step 4 of the
/// invocation lifecycle (§4.4, §4.6). Body parsing by content type and the
/// `get`/`header`/`is`/`accepts` helpers live in the bootstrap script; this
/// struct only carries what the isolate cannot derive on its own.
#[derive(Debug, Clone)]
pub struct InboundRequest {
    pub method: String,
    pub path: String,
    pub query: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    pub remote_addr: String,
}

#[derive(Serialize)]
pub struct RequestSnapshot {
    pub method: String,
    pub path: String,
    pub query: String,
    pub headers: Vec<(String, String)>,
    pub body_base64: String,
    pub ip: String,
}

impl From<&InboundRequest> for RequestSnapshot {
    fn from(req: &InboundRequest) -> Self {
        Self {
            method: req.method.clone(),
            path: req.path.clone(),
            query: req.query.clone(),
            headers: req.headers.clone(),
            body_base64: base64::Engine::encode(&base64::engine::general_purpose::STANDARD, &req.body),
            ip: req.remote_addr.clone(),
        }
    }
}

/// `req`'s frozen snapshot (§4.6): read once by the bootstrap script, which
/// layers query/body parsing and the `get`/`header`/`is`/`accepts` helpers on
/// top in JS.
#[op]
pub fn op_request_snapshot(state: &mut OpState) -> Result<RequestSnapshot, AnyError> {
    Ok(RequestSnapshot::from(state.borrow::<InboundRequest>()))
}
