use std::cell::RefCell;
use std::rc::Rc;

use chrono::{Duration as ChronoDuration, Utc};
use deno_core::{anyhow::Error as AnyError, op, OpState};
use serde::Serialize;

use faas_models::KvEntry;

use crate::context::HostContext;

#[derive(Serialize)]
pub struct KvGetResult {
    pub json: Option<serde_json::Value>,
    pub base64: String,
}

fn handle(state: &Rc<RefCell<OpState>>) -> crate::kv::KvHandle {
    state.borrow().borrow::<HostContext>().kv.clone()
}

#[op]
pub async fn op_kv_get(state: Rc<RefCell<OpState>>, key: String) -> Result<Option<KvGetResult>, AnyError> {
    let kv = handle(&state);
    Ok(kv.get(&key).await.map(|entry| KvGetResult {
        json: entry.json,
        base64: base64::Engine::encode(&base64::engine::general_purpose::STANDARD, &entry.value),
    }))
}

#[op]
pub async fn op_kv_set(
    state: Rc<RefCell<OpState>>,
    key: String,
    value_base64: String,
    json: Option<serde_json::Value>,
    ttl_seconds: Option<u64>,
) -> Result<(), AnyError> {
    let kv = handle(&state);
    let value = base64::Engine::decode(&base64::engine::general_purpose::STANDARD, &value_base64)?;
    let expires_at = ttl_seconds.map(|secs| Utc::now() + ChronoDuration::seconds(secs as i64));
    kv.set(&key, KvEntry { value, json, expires_at }).await;
    Ok(())
}

#[op]
pub async fn op_kv_has(state: Rc<RefCell<OpState>>, key: String) -> Result<bool, AnyError> {
    Ok(handle(&state).has(&key).await)
}

#[op]
pub async fn op_kv_delete(state: Rc<RefCell<OpState>>, key: String) -> Result<bool, AnyError> {
    Ok(handle(&state).delete(&key).await)
}

#[op]
pub async fn op_kv_clear(state: Rc<RefCell<OpState>>) -> Result<(), AnyError> {
    handle(&state).clear().await;
    Ok(())
}

#[op]
pub async fn op_kv_keys(state: Rc<RefCell<OpState>>) -> Result<Vec<String>, AnyError> {
    Ok(handle(&state).keys().await)
}
