use std::cell::RefCell;
use std::rc::Rc;

use deno_core::{anyhow::anyhow, anyhow::Error as AnyError, op, OpState};
use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use hickory_resolver::error::{ResolveError, ResolveErrorKind};
use hickory_resolver::proto::op::ResponseCode;
use hickory_resolver::TokioAsyncResolver;
use serde::{Deserialize, Serialize};

use crate::context::HostContext;

#[derive(Deserialize)]
pub struct FetchRequest {
    pub method: String,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body_base64: Option<String>,
}

#[derive(Serialize)]
pub struct FetchResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body_base64: String,
}

fn parse_url(raw: &str) -> Result<(String, String, u16), AnyError> {
    let url = reqwest::Url::parse(raw).map_err(|e| anyhow!("invalid URL: {e}"))?;
    let scheme = url.scheme().to_string();
    let host = url
        .host_str()
        .ok_or_else(|| anyhow!("URL has no host: {raw}"))?
        .to_string();
    let port = url
        .port_or_known_default()
        .ok_or_else(|| anyhow!("URL has no resolvable port: {raw}"))?;
    Ok((scheme, host, port))
}

/// `fetch(request)` (§4.5 `net.fetch`). Every outbound call is checked
/// against the function's network policy before a socket is opened.
#[op]
pub async fn op_net_fetch(state: Rc<RefCell<OpState>>, req: FetchRequest) -> Result<FetchResponse, AnyError> {
    let (scheme, host, port) = parse_url(&req.url)?;

    let (client, abort) = {
        let s = state.borrow();
        let ctx = s.borrow::<HostContext>();
        ctx.check_network(&scheme, &host, port)?;
        (reqwest::Client::new(), ctx.abort.clone())
    };

    abort.check()?;

    let method = reqwest::Method::from_bytes(req.method.as_bytes())
        .map_err(|_| anyhow!("invalid HTTP method: {}", req.method))?;
    let mut builder = client.request(method, &req.url);
    for (name, value) in &req.headers {
        builder = builder.header(name, value);
    }
    if let Some(body_base64) = &req.body_base64 {
        let body = base64::Engine::decode(&base64::engine::general_purpose::STANDARD, body_base64)?;
        builder = builder.body(body);
    }

    let response = tokio::select! {
        result = builder.send() => result?,
        _ = tokio::time::sleep(abort.remaining()) => return Err(faas_models::FaasError::Aborted.into()),
    };

    let status = response.status().as_u16();
    let headers = response
        .headers()
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_str().unwrap_or_default().to_string()))
        .collect();
    let body = response.bytes().await?;
    Ok(FetchResponse {
        status,
        headers,
        body_base64: base64::Engine::encode(&base64::engine::general_purpose::STANDARD, &body),
    })
}

/// Maps a `hickory_resolver` failure onto the closed error-code set the JS
/// `dns` surface promises its callers (§4.5 `dns.lookup`/`resolve4`/`resolve6`).
fn classify_dns_error(err: &ResolveError) -> &'static str {
    match err.kind() {
        ResolveErrorKind::NoRecordsFound { response_code, .. } => match response_code {
            ResponseCode::NXDomain => "ENOTFOUND",
            ResponseCode::ServFail => "ESERVFAIL",
            _ => "ENODATA",
        },
        ResolveErrorKind::Timeout => "ETIMEOUT",
        ResolveErrorKind::Io(io_err) if io_err.kind() == std::io::ErrorKind::ConnectionRefused => "ECONNREFUSED",
        ResolveErrorKind::NoConnections => "ECONNREFUSED",
        _ => "ESERVFAIL",
    }
}

/// `net.resolveDns(hostname) -> string[]` (§4.5 `net.resolveDns`), subject to
/// the same outbound network policy as `fetch`. Failures surface as one of
/// the closed set `{ENOTFOUND, ENODATA, ETIMEOUT, ECONNREFUSED, ESERVFAIL}`
/// rather than the raw resolver error, matching the Node `dns` module's
/// `err.code` contract that `bootstrap.js`'s `dns` object relies on.
#[op]
pub async fn op_net_resolve_dns(state: Rc<RefCell<OpState>>, hostname: String) -> Result<Vec<String>, AnyError> {
    {
        let s = state.borrow();
        let ctx = s.borrow::<HostContext>();
        ctx.check_network("dns", &hostname, 0)?;
    }

    let resolver = TokioAsyncResolver::tokio(ResolverConfig::default(), ResolverOpts::default());
    let response = resolver
        .lookup_ip(hostname.as_str())
        .await
        .map_err(|e| anyhow!(classify_dns_error(&e)))?;
    Ok(response.iter().map(|ip| ip.to_string()).collect())
}
