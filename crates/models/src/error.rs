use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error envelope returned to the caller on a non-2xx response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

/// The error taxonomy surfaced to the Sandbox Engine and the log record.
///
/// Variant order mirrors the table in the error handling design: Resolver
/// and Dispatcher failures first, then Engine, Host-API, and user failures.
#[derive(Error, Debug)]
pub enum FaasError {
    #[error("function not found: {reference}")]
    FunctionNotFound { reference: String },

    #[error("function is disabled")]
    FunctionDisabled,

    #[error("function has no active version")]
    NoActiveVersion,

    #[error("api key required")]
    ApiKeyRequired,

    #[error("too many concurrent invocations")]
    TooManyConcurrent,

    #[error("invocation timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("heap limit exceeded")]
    MemoryExhausted,

    #[error("policy denied: {rule}")]
    PolicyDenied { rule: String },

    #[error("user handler error: {message}")]
    UserError {
        message: String,
        stack: Option<String>,
    },

    #[error("internal error: {reason}")]
    InternalError { reason: String },

    #[error("aborted")]
    Aborted,

    #[error("read-only filesystem")]
    ReadOnlyFilesystem,

    #[error("authentication failed")]
    AuthFailed,

    #[error("operation not permitted: {operation}")]
    OperationNotPermitted { operation: String },

    #[error("module not found: {module}")]
    ModuleNotFound { module: String },

    #[error("headers already sent")]
    HeadersAlreadySent,

    #[error("database error: {0}")]
    SqlxError(#[from] sqlx::Error),
}

impl FaasError {
    /// The machine-readable outcome tag persisted on the invocation record.
    pub fn outcome_tag(&self) -> &'static str {
        match self {
            FaasError::FunctionNotFound { .. } => "user_error",
            FaasError::FunctionDisabled => "policy_denied",
            FaasError::NoActiveVersion => "policy_denied",
            FaasError::ApiKeyRequired => "policy_denied",
            FaasError::TooManyConcurrent => "policy_denied",
            FaasError::Timeout { .. } => "timeout",
            FaasError::MemoryExhausted => "memory_exhausted",
            FaasError::PolicyDenied { .. } => "policy_denied",
            FaasError::UserError { .. } => "user_error",
            FaasError::InternalError { .. } => "internal_error",
            FaasError::Aborted => "internal_error",
            FaasError::ReadOnlyFilesystem => "user_error",
            FaasError::AuthFailed => "user_error",
            FaasError::OperationNotPermitted { .. } => "user_error",
            FaasError::ModuleNotFound { .. } => "user_error",
            FaasError::HeadersAlreadySent => "user_error",
            FaasError::SqlxError(_) => "internal_error",
        }
    }

    /// The error kind string surfaced in the JSON error envelope and in the
    /// thrown JS error's `name`/`kind`.
    pub fn error_kind(&self) -> &'static str {
        match self {
            FaasError::FunctionNotFound { .. } => "function_not_found",
            FaasError::FunctionDisabled => "function_disabled",
            FaasError::NoActiveVersion => "no_active_version",
            FaasError::ApiKeyRequired => "api_key_required",
            FaasError::TooManyConcurrent => "too_many_concurrent",
            FaasError::Timeout { .. } => "timeout",
            FaasError::MemoryExhausted => "memory_exhausted",
            FaasError::PolicyDenied { .. } => "policy_denied",
            FaasError::UserError { .. } => "user_error",
            FaasError::InternalError { .. } => "internal_error",
            FaasError::Aborted => "aborted",
            FaasError::ReadOnlyFilesystem => "read_only_filesystem",
            FaasError::AuthFailed => "auth_failed",
            FaasError::OperationNotPermitted { .. } => "operation_not_permitted",
            FaasError::ModuleNotFound { .. } => "module_not_found",
            FaasError::HeadersAlreadySent => "headers_already_sent",
            FaasError::SqlxError(_) => "internal_error",
        }
    }

    pub fn http_status(&self) -> u16 {
        match self {
            FaasError::FunctionNotFound { .. } => 404,
            FaasError::FunctionDisabled => 503,
            FaasError::NoActiveVersion => 503,
            FaasError::ApiKeyRequired => 401,
            FaasError::TooManyConcurrent => 429,
            FaasError::Timeout { .. } => 504,
            FaasError::MemoryExhausted => 500,
            FaasError::PolicyDenied { .. } => 502,
            FaasError::UserError { .. } => 500,
            FaasError::InternalError { .. } => 500,
            FaasError::Aborted => 500,
            FaasError::ReadOnlyFilesystem => 500,
            FaasError::AuthFailed => 500,
            FaasError::OperationNotPermitted { .. } => 500,
            FaasError::ModuleNotFound { .. } => 500,
            FaasError::HeadersAlreadySent => 500,
            FaasError::SqlxError(_) => 500,
        }
    }

    pub fn to_envelope(&self) -> ErrorEnvelope {
        ErrorEnvelope {
            error: self.error_kind().to_string(),
            message: self.to_string(),
            stack: match self {
                FaasError::UserError { stack, .. } => stack.clone(),
                _ => None,
            },
        }
    }
}
