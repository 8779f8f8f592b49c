use std::collections::HashMap;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Machine-readable classification of an invocation's terminal state (§3).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeTag {
    Success,
    UserError,
    Timeout,
    PolicyDenied,
    InternalError,
}

impl OutcomeTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeTag::Success => "success",
            OutcomeTag::UserError => "user_error",
            OutcomeTag::Timeout => "timeout",
            OutcomeTag::PolicyDenied => "policy_denied",
            OutcomeTag::InternalError => "internal_error",
        }
    }
}

/// Sanitized request envelope persisted with the log record (§4.9): only an
/// allow-listed subset of headers is retained.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RequestEnvelope {
    pub method: String,
    pub path: String,
    pub query: String,
    pub headers: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ResponseEnvelope {
    pub status: u16,
    pub headers: HashMap<String, String>,
    /// Truncated to the log body cap.
    pub body_preview: String,
}

/// Ephemeral per-request record (§3). Carries both the wall-clock start
/// (for display) and a monotonic start (for duration math, immune to clock
/// adjustments).
#[derive(Debug, Clone)]
pub struct Invocation {
    pub invocation_id: Uuid,
    pub function_id: Uuid,
    pub version_id: Uuid,
    pub started_at: DateTime<Utc>,
    #[allow(dead_code)]
    pub monotonic_start: Instant,
    pub request: RequestEnvelope,
}

impl Invocation {
    pub fn new(function_id: Uuid, version_id: Uuid, request: RequestEnvelope) -> Self {
        Self {
            invocation_id: Uuid::new_v4(),
            function_id,
            version_id,
            started_at: Utc::now(),
            monotonic_start: Instant::now(),
            request,
        }
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.monotonic_start.elapsed().as_millis() as u64
    }
}

/// Durable record of one invocation (§4.9), governed by the function's
/// retention policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionLog {
    pub invocation_id: Uuid,
    pub function_id: Uuid,
    pub version_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub outcome: OutcomeTag,
    pub http_status: u16,
    pub request: RequestEnvelope,
    pub response: ResponseEnvelope,
    pub stdout: String,
    pub stderr: String,
    pub error_kind: Option<String>,
    pub error_message: Option<String>,
    pub error_stack: Option<String>,
}
