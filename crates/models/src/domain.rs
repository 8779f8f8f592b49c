use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Log retention rule attached to a function.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RetentionPolicy {
    None,
    ByTime { days: u32 },
    ByCount { count: u32 },
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        RetentionPolicy::None
    }
}

/// Outbound network allow-list for a function's invocations.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct NetworkPolicy {
    /// Empty == permissive (no restriction).
    pub allowed_hosts: Vec<String>,
    pub allowed_port_min: Option<u16>,
    pub allowed_port_max: Option<u16>,
    pub allowed_schemes: Vec<String>,
}

impl NetworkPolicy {
    pub fn permissive() -> Self {
        Self::default()
    }

    pub fn is_permissive(&self) -> bool {
        self.allowed_hosts.is_empty()
    }

    /// Evaluate whether `host:port` over `scheme` is reachable under this
    /// policy. Returns `Err(rule)` naming the first violated constraint.
    pub fn check(&self, scheme: &str, host: &str, port: u16) -> Result<(), String> {
        if self.is_permissive() {
            return Ok(());
        }
        if !self.allowed_hosts.iter().any(|h| h == host) {
            return Err(format!("host '{host}' not in allow-list"));
        }
        if !self.allowed_schemes.is_empty() && !self.allowed_schemes.iter().any(|s| s == scheme) {
            return Err(format!("scheme '{scheme}' not permitted"));
        }
        if let (Some(min), Some(max)) = (self.allowed_port_min, self.allowed_port_max) {
            if port < min || port > max {
                return Err(format!("port {port} outside allowed range {min}-{max}"));
            }
        }
        Ok(())
    }
}

/// Function Descriptor (§3). Owned by the control plane, read-only to the core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionDescriptor {
    pub function_id: Uuid,
    pub project_id: Uuid,
    pub name: String,
    pub active: bool,
    pub requires_api_key: bool,
    pub api_key: Option<String>,
    pub active_version_id: Option<Uuid>,
    pub retention: RetentionPolicy,
    pub network_policy: NetworkPolicy,
    pub timeout_ms: u64,
    pub heap_cap_mib: u64,
    pub max_concurrency: Option<u32>,
    pub cron_schedule: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Version (§3): immutable content-addressed archive plus metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionVersion {
    pub version_id: Uuid,
    pub function_id: Uuid,
    pub sequence: u64,
    pub content_hash: String,
    pub byte_size: u64,
    pub creator_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub ready: bool,
}

/// Environment variable binding snapshot, taken at invocation time (§3).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EnvSnapshot(pub HashMap<String, String>);

impl EnvSnapshot {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }
}
