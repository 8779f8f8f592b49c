use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use faas_models::{
    EnvSnapshot, FaasError, FunctionDescriptor, FunctionVersion, MetadataStore, NetworkPolicy,
    RetentionPolicy,
};

/// `sqlx`-backed implementation of the Metadata Store contract (§6). Uses
/// only runtime-checked `sqlx::query` calls (no `query_as!`/`migrate!`
/// compile-time macros) and creates its schema with plain DDL on startup.
pub struct SqliteMetadataStore {
    pool: SqlitePool,
}

impl SqliteMetadataStore {
    pub async fn new(pool: SqlitePool) -> Result<Self, FaasError> {
        let store = Self { pool };
        store.ensure_schema().await?;
        Ok(store)
    }

    async fn ensure_schema(&self) -> Result<(), FaasError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS functions (
                function_id TEXT PRIMARY KEY,
                project_id TEXT NOT NULL,
                name TEXT NOT NULL UNIQUE,
                active INTEGER NOT NULL,
                requires_api_key INTEGER NOT NULL,
                api_key TEXT,
                active_version_id TEXT,
                retention_json TEXT NOT NULL,
                network_policy_json TEXT NOT NULL,
                timeout_ms INTEGER NOT NULL,
                heap_cap_mib INTEGER NOT NULL,
                max_concurrency INTEGER,
                cron_schedule TEXT,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS versions (
                version_id TEXT PRIMARY KEY,
                function_id TEXT NOT NULL,
                sequence INTEGER NOT NULL,
                content_hash TEXT NOT NULL,
                byte_size INTEGER NOT NULL,
                creator_id TEXT NOT NULL,
                created_at TEXT NOT NULL,
                ready INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS env_vars (
                function_id TEXT NOT NULL,
                key TEXT NOT NULL,
                value TEXT NOT NULL,
                PRIMARY KEY (function_id, key)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    fn row_to_descriptor(row: &sqlx::sqlite::SqliteRow) -> Result<FunctionDescriptor, FaasError> {
        let function_id: String = row.try_get("function_id")?;
        let project_id: String = row.try_get("project_id")?;
        let active_version_id: Option<String> = row.try_get("active_version_id")?;
        let retention_json: String = row.try_get("retention_json")?;
        let network_policy_json: String = row.try_get("network_policy_json")?;
        let created_at: DateTime<Utc> = row.try_get("created_at")?;

        Ok(FunctionDescriptor {
            function_id: Uuid::parse_str(&function_id)
                .map_err(|e| FaasError::InternalError { reason: e.to_string() })?,
            project_id: Uuid::parse_str(&project_id)
                .map_err(|e| FaasError::InternalError { reason: e.to_string() })?,
            name: row.try_get("name")?,
            active: row.try_get::<i64, _>("active")? != 0,
            requires_api_key: row.try_get::<i64, _>("requires_api_key")? != 0,
            api_key: row.try_get("api_key")?,
            active_version_id: active_version_id
                .map(|v| Uuid::parse_str(&v))
                .transpose()
                .map_err(|e| FaasError::InternalError { reason: e.to_string() })?,
            retention: serde_json::from_str(&retention_json)
                .map_err(|e| FaasError::InternalError { reason: e.to_string() })?,
            network_policy: serde_json::from_str(&network_policy_json)
                .map_err(|e| FaasError::InternalError { reason: e.to_string() })?,
            timeout_ms: row.try_get::<i64, _>("timeout_ms")? as u64,
            heap_cap_mib: row.try_get::<i64, _>("heap_cap_mib")? as u64,
            max_concurrency: row.try_get::<Option<i64>, _>("max_concurrency")?.map(|v| v as u32),
            cron_schedule: row.try_get("cron_schedule")?,
            created_at,
        })
    }

    pub async fn upsert_function(&self, descriptor: &FunctionDescriptor) -> Result<(), FaasError> {
        sqlx::query(
            r#"
            INSERT INTO functions (
                function_id, project_id, name, active, requires_api_key, api_key,
                active_version_id, retention_json, network_policy_json, timeout_ms,
                heap_cap_mib, max_concurrency, cron_schedule, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(function_id) DO UPDATE SET
                name = excluded.name,
                active = excluded.active,
                requires_api_key = excluded.requires_api_key,
                api_key = excluded.api_key,
                active_version_id = excluded.active_version_id,
                retention_json = excluded.retention_json,
                network_policy_json = excluded.network_policy_json,
                timeout_ms = excluded.timeout_ms,
                heap_cap_mib = excluded.heap_cap_mib,
                max_concurrency = excluded.max_concurrency,
                cron_schedule = excluded.cron_schedule
            "#,
        )
        .bind(descriptor.function_id.to_string())
        .bind(descriptor.project_id.to_string())
        .bind(&descriptor.name)
        .bind(descriptor.active as i64)
        .bind(descriptor.requires_api_key as i64)
        .bind(&descriptor.api_key)
        .bind(descriptor.active_version_id.map(|v| v.to_string()))
        .bind(serde_json::to_string(&descriptor.retention).unwrap_or_default())
        .bind(serde_json::to_string(&descriptor.network_policy).unwrap_or_default())
        .bind(descriptor.timeout_ms as i64)
        .bind(descriptor.heap_cap_mib as i64)
        .bind(descriptor.max_concurrency.map(|v| v as i64))
        .bind(&descriptor.cron_schedule)
        .bind(descriptor.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn insert_version(&self, version: &FunctionVersion) -> Result<(), FaasError> {
        sqlx::query(
            r#"
            INSERT INTO versions (
                version_id, function_id, sequence, content_hash, byte_size,
                creator_id, created_at, ready
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(version.version_id.to_string())
        .bind(version.function_id.to_string())
        .bind(version.sequence as i64)
        .bind(&version.content_hash)
        .bind(version.byte_size as i64)
        .bind(version.creator_id.to_string())
        .bind(version.created_at)
        .bind(version.ready as i64)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn set_env(&self, function_id: Uuid, key: &str, value: &str) -> Result<(), FaasError> {
        sqlx::query(
            "INSERT INTO env_vars (function_id, key, value) VALUES (?, ?, ?) \
             ON CONFLICT(function_id, key) DO UPDATE SET value = excluded.value",
        )
        .bind(function_id.to_string())
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl MetadataStore for SqliteMetadataStore {
    async fn find_function(&self, reference: &str) -> Result<FunctionDescriptor, FaasError> {
        let row = if let Ok(id) = Uuid::parse_str(reference) {
            sqlx::query("SELECT * FROM functions WHERE function_id = ?")
                .bind(id.to_string())
                .fetch_optional(&self.pool)
                .await?
        } else {
            sqlx::query("SELECT * FROM functions WHERE name = ?")
                .bind(reference)
                .fetch_optional(&self.pool)
                .await?
        };

        let row = row.ok_or_else(|| FaasError::FunctionNotFound {
            reference: reference.to_string(),
        })?;

        Self::row_to_descriptor(&row)
    }

    async fn load_version(
        &self,
        function_id: Uuid,
        version_id: Uuid,
    ) -> Result<FunctionVersion, FaasError> {
        let row = sqlx::query("SELECT * FROM versions WHERE function_id = ? AND version_id = ?")
            .bind(function_id.to_string())
            .bind(version_id.to_string())
            .fetch_optional(&self.pool)
            .await?
            .ok_or(FaasError::NoActiveVersion)?;

        let version_id: String = row.try_get("version_id")?;
        let function_id: String = row.try_get("function_id")?;
        let creator_id: String = row.try_get("creator_id")?;

        Ok(FunctionVersion {
            version_id: Uuid::parse_str(&version_id)
                .map_err(|e| FaasError::InternalError { reason: e.to_string() })?,
            function_id: Uuid::parse_str(&function_id)
                .map_err(|e| FaasError::InternalError { reason: e.to_string() })?,
            sequence: row.try_get::<i64, _>("sequence")? as u64,
            content_hash: row.try_get("content_hash")?,
            byte_size: row.try_get::<i64, _>("byte_size")? as u64,
            creator_id: Uuid::parse_str(&creator_id)
                .map_err(|e| FaasError::InternalError { reason: e.to_string() })?,
            created_at: row.try_get("created_at")?,
            ready: row.try_get::<i64, _>("ready")? != 0,
        })
    }

    async fn list_env(&self, function_id: Uuid) -> Result<EnvSnapshot, FaasError> {
        let rows = sqlx::query("SELECT key, value FROM env_vars WHERE function_id = ?")
            .bind(function_id.to_string())
            .fetch_all(&self.pool)
            .await?;

        let mut map = std::collections::HashMap::new();
        for row in rows {
            let key: String = row.try_get("key")?;
            let value: String = row.try_get("value")?;
            map.insert(key, value);
        }
        Ok(EnvSnapshot(map))
    }

    async fn get_network_policy(&self, function_id: Uuid) -> Result<NetworkPolicy, FaasError> {
        let descriptor = self.find_function(&function_id.to_string()).await?;
        Ok(descriptor.network_policy)
    }

    async fn get_retention(&self, function_id: Uuid) -> Result<RetentionPolicy, FaasError> {
        let descriptor = self.find_function(&function_id.to_string()).await?;
        Ok(descriptor.retention)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    async fn test_pool() -> SqlitePool {
        SqlitePool::connect("sqlite::memory:").await.unwrap()
    }

    fn sample_descriptor() -> FunctionDescriptor {
        FunctionDescriptor {
            function_id: Uuid::new_v4(),
            project_id: Uuid::new_v4(),
            name: "hello".to_string(),
            active: true,
            requires_api_key: false,
            api_key: None,
            active_version_id: None,
            retention: RetentionPolicy::None,
            network_policy: NetworkPolicy::permissive(),
            timeout_ms: 30_000,
            heap_cap_mib: 256,
            max_concurrency: None,
            cron_schedule: None,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn find_function_by_name_and_id() {
        let store = SqliteMetadataStore::new(test_pool().await).await.unwrap();
        let descriptor = sample_descriptor();
        store.upsert_function(&descriptor).await.unwrap();

        let by_name = store.find_function("hello").await.unwrap();
        assert_eq!(by_name.function_id, descriptor.function_id);

        let by_id = store
            .find_function(&descriptor.function_id.to_string())
            .await
            .unwrap();
        assert_eq!(by_id.name, "hello");
    }

    #[tokio::test]
    async fn unknown_reference_is_not_found() {
        let store = SqliteMetadataStore::new(test_pool().await).await.unwrap();
        let result = store.find_function("nope").await;
        assert!(matches!(result, Err(FaasError::FunctionNotFound { .. })));
    }

    #[tokio::test]
    async fn env_snapshot_reflects_stored_vars() {
        let store = SqliteMetadataStore::new(test_pool().await).await.unwrap();
        let descriptor = sample_descriptor();
        store.upsert_function(&descriptor).await.unwrap();
        store
            .set_env(descriptor.function_id, "GREETING", "hi")
            .await
            .unwrap();

        let snapshot = store.list_env(descriptor.function_id).await.unwrap();
        assert_eq!(snapshot.get("GREETING"), Some("hi"));
    }
}
