use tracing::{error, info, warn};
use uuid::Uuid;

use faas_models::{FaasError, FunctionDescriptor, OutcomeTag};

pub struct TracingService;

impl TracingService {
    pub fn init() -> Result<(), Box<dyn std::error::Error>> {
        tracing_subscriber::fmt()
            .json()
            .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
            .init();

        Ok(())
    }

    pub fn log_function_resolved(descriptor: &FunctionDescriptor) {
        info!(
            function_id = %descriptor.function_id,
            function_name = %descriptor.name,
            active_version_id = %descriptor.active_version_id.map(|v| v.to_string()).unwrap_or_else(|| "none".to_string()),
            timeout_ms = descriptor.timeout_ms,
            heap_cap_mib = descriptor.heap_cap_mib,
            "Function resolved"
        );
    }

    pub fn log_invocation_started(function_id: Uuid, invocation_id: Uuid, version_id: Uuid) {
        info!(
            function_id = %function_id,
            invocation_id = %invocation_id,
            version_id = %version_id,
            "Invocation started"
        );
    }

    pub fn log_invocation_completed(
        function_id: Uuid,
        invocation_id: Uuid,
        duration_ms: u64,
        status: u16,
        outcome: OutcomeTag,
    ) {
        match outcome {
            OutcomeTag::Success => info!(
                function_id = %function_id,
                invocation_id = %invocation_id,
                duration_ms = duration_ms,
                status = status,
                outcome = outcome.as_str(),
                "Invocation completed"
            ),
            OutcomeTag::Timeout | OutcomeTag::InternalError => error!(
                function_id = %function_id,
                invocation_id = %invocation_id,
                duration_ms = duration_ms,
                status = status,
                outcome = outcome.as_str(),
                "Invocation failed"
            ),
            OutcomeTag::UserError | OutcomeTag::PolicyDenied => warn!(
                function_id = %function_id,
                invocation_id = %invocation_id,
                duration_ms = duration_ms,
                status = status,
                outcome = outcome.as_str(),
                "Invocation completed with error"
            ),
        }
    }

    pub fn log_materialized(function_id: Uuid, version_id: Uuid, content_hash: &str, cache_hit: bool) {
        info!(
            function_id = %function_id,
            version_id = %version_id,
            content_hash = %content_hash,
            cache_hit = cache_hit,
            "Package materialized"
        );
    }

    pub fn log_policy_denied(function_id: Uuid, invocation_id: Uuid, reason: &str) {
        warn!(
            function_id = %function_id,
            invocation_id = %invocation_id,
            reason = %reason,
            "Policy denied"
        );
    }

    pub fn log_error(function_id: Uuid, invocation_id: Option<Uuid>, error: &FaasError) {
        error!(
            function_id = %function_id,
            invocation_id = %invocation_id.map(|v| v.to_string()).unwrap_or_else(|| "none".to_string()),
            error_kind = %error.error_kind(),
            error_message = %error,
            "Error occurred"
        );
    }

    pub fn log_resolver_cache_evicted(function_id: Uuid, reason: &str) {
        info!(
            function_id = %function_id,
            reason = %reason,
            "Resolver cache entry evicted"
        );
    }
}
