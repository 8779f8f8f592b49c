pub mod domain;
pub mod error;
pub mod invocation;
pub mod kv;
pub mod store;

pub use domain::*;
pub use error::*;
pub use invocation::*;
pub use kv::*;
pub use store::*;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    #[test]
    fn function_descriptor_roundtrip() {
        let descriptor = FunctionDescriptor {
            function_id: Uuid::new_v4(),
            project_id: Uuid::new_v4(),
            name: "hi".to_string(),
            active: true,
            requires_api_key: false,
            api_key: None,
            active_version_id: Some(Uuid::new_v4()),
            retention: RetentionPolicy::ByTime { days: 30 },
            network_policy: NetworkPolicy::permissive(),
            timeout_ms: 30_000,
            heap_cap_mib: 256,
            max_concurrency: None,
            cron_schedule: None,
            created_at: Utc::now(),
        };

        let json = serde_json::to_string(&descriptor).unwrap();
        let deserialized: FunctionDescriptor = serde_json::from_str(&json).unwrap();
        assert_eq!(descriptor.name, deserialized.name);
        assert_eq!(descriptor.active, deserialized.active);
    }

    #[test]
    fn network_policy_permissive_allows_everything() {
        let policy = NetworkPolicy::permissive();
        assert!(policy.check("https", "anything.example", 443).is_ok());
    }

    #[test]
    fn network_policy_denies_unlisted_host() {
        let policy = NetworkPolicy {
            allowed_hosts: vec!["api.allowed.example".to_string()],
            ..Default::default()
        };
        assert!(policy.check("https", "api.allowed.example", 443).is_ok());
        assert!(policy.check("https", "blocked.example", 443).is_err());
    }

    #[test]
    fn error_kind_and_status_are_consistent() {
        let err = FaasError::Timeout { timeout_ms: 500 };
        assert_eq!(err.outcome_tag(), "timeout");
        assert_eq!(err.error_kind(), "timeout");
        assert_eq!(err.http_status(), 504);
    }

    #[test]
    fn kv_entry_expiry() {
        let now = Utc::now();
        let entry = KvEntry {
            value: b"v".to_vec(),
            json: None,
            expires_at: Some(now - chrono::Duration::seconds(1)),
        };
        assert!(entry.is_expired_at(now));
    }
}
