use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A KV Entry (§3): an opaque byte blob plus an optional absolute expiry
/// instant. `json` holds a parsed shadow when the value round-trips through
/// JSON, so callers that stored plain JSON get it back without a re-parse.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KvEntry {
    pub value: Vec<u8>,
    pub json: Option<serde_json::Value>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl KvEntry {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        matches!(self.expires_at, Some(exp) if now >= exp)
    }
}
