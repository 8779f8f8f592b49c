use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use tracing::instrument;
use uuid::Uuid;

use faas_models::{ExecutionLog, FaasError, LogStore, RetentionPolicy};

/// `sqlx`-backed implementation of the Log Store contract (§6), the durable
/// home for `ExecutionLog` rows and the retention reaper. Stores the
/// request/response envelopes as JSON columns rather than normalizing them;
/// nothing in the core queries into their structure.
pub struct SqliteLogStore {
    pool: SqlitePool,
}

impl SqliteLogStore {
    pub async fn new(pool: SqlitePool) -> Result<Self, FaasError> {
        let store = Self { pool };
        store.ensure_schema().await?;
        Ok(store)
    }

    async fn ensure_schema(&self) -> Result<(), FaasError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS execution_logs (
                invocation_id TEXT PRIMARY KEY,
                function_id TEXT NOT NULL,
                version_id TEXT NOT NULL,
                started_at TEXT NOT NULL,
                ended_at TEXT NOT NULL,
                duration_ms INTEGER NOT NULL,
                outcome TEXT NOT NULL,
                http_status INTEGER NOT NULL,
                request_json TEXT NOT NULL,
                response_json TEXT NOT NULL,
                stdout TEXT NOT NULL,
                stderr TEXT NOT NULL,
                error_kind TEXT,
                error_message TEXT,
                error_stack TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_execution_logs_function_started \
             ON execution_logs (function_id, started_at)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl LogStore for SqliteLogStore {
    #[instrument(skip(self, record), fields(invocation_id = %record.invocation_id))]
    async fn append(&self, record: ExecutionLog) -> Result<(), FaasError> {
        sqlx::query(
            r#"
            INSERT INTO execution_logs (
                invocation_id, function_id, version_id, started_at, ended_at,
                duration_ms, outcome, http_status, request_json, response_json,
                stdout, stderr, error_kind, error_message, error_stack
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.invocation_id.to_string())
        .bind(record.function_id.to_string())
        .bind(record.version_id.to_string())
        .bind(record.started_at)
        .bind(record.ended_at)
        .bind(record.duration_ms as i64)
        .bind(record.outcome.as_str())
        .bind(record.http_status as i64)
        .bind(serde_json::to_string(&record.request).unwrap_or_default())
        .bind(serde_json::to_string(&record.response).unwrap_or_default())
        .bind(&record.stdout)
        .bind(&record.stderr)
        .bind(&record.error_kind)
        .bind(&record.error_message)
        .bind(&record.error_stack)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    #[instrument(skip(self, policy))]
    async fn reap(&self, function_id: Uuid, policy: &RetentionPolicy) -> Result<u64, FaasError> {
        let deleted = match policy {
            RetentionPolicy::None => {
                sqlx::query("DELETE FROM execution_logs WHERE function_id = ?")
                    .bind(function_id.to_string())
                    .execute(&self.pool)
                    .await?
                    .rows_affected()
            }
            RetentionPolicy::ByTime { days } => {
                let cutoff = chrono::Utc::now() - chrono::Duration::days(*days as i64);
                sqlx::query("DELETE FROM execution_logs WHERE function_id = ? AND started_at < ?")
                    .bind(function_id.to_string())
                    .bind(cutoff)
                    .execute(&self.pool)
                    .await?
                    .rows_affected()
            }
            RetentionPolicy::ByCount { count } => {
                let row = sqlx::query(
                    "SELECT invocation_id FROM execution_logs WHERE function_id = ? \
                     ORDER BY started_at DESC LIMIT 1 OFFSET ?",
                )
                .bind(function_id.to_string())
                .bind(*count as i64)
                .fetch_optional(&self.pool)
                .await?;

                match row {
                    Some(row) => {
                        let cutoff_id: String = row.try_get("invocation_id")?;
                        let cutoff_started_at: chrono::DateTime<chrono::Utc> = sqlx::query(
                            "SELECT started_at FROM execution_logs WHERE invocation_id = ?",
                        )
                        .bind(&cutoff_id)
                        .fetch_one(&self.pool)
                        .await?
                        .try_get("started_at")?;

                        sqlx::query(
                            "DELETE FROM execution_logs WHERE function_id = ? AND started_at <= ?",
                        )
                        .bind(function_id.to_string())
                        .bind(cutoff_started_at)
                        .execute(&self.pool)
                        .await?
                        .rows_affected()
                    }
                    None => 0,
                }
            }
        };
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use faas_models::{OutcomeTag, RequestEnvelope, ResponseEnvelope};

    fn sample_log(function_id: Uuid, started_at: chrono::DateTime<Utc>) -> ExecutionLog {
        ExecutionLog {
            invocation_id: Uuid::new_v4(),
            function_id,
            version_id: Uuid::new_v4(),
            started_at,
            ended_at: started_at,
            duration_ms: 12,
            outcome: OutcomeTag::Success,
            http_status: 200,
            request: RequestEnvelope::default(),
            response: ResponseEnvelope::default(),
            stdout: String::new(),
            stderr: String::new(),
            error_kind: None,
            error_message: None,
            error_stack: None,
        }
    }

    #[tokio::test]
    async fn appends_and_reaps_by_count() {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        let store = SqliteLogStore::new(pool).await.unwrap();
        let function_id = Uuid::new_v4();

        for i in 0..5 {
            let started_at = Utc::now() + chrono::Duration::seconds(i);
            store.append(sample_log(function_id, started_at)).await.unwrap();
        }

        let deleted = store
            .reap(function_id, &RetentionPolicy::ByCount { count: 2 })
            .await
            .unwrap();
        assert_eq!(deleted, 3);
    }

    #[tokio::test]
    async fn reap_none_deletes_everything() {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        let store = SqliteLogStore::new(pool).await.unwrap();
        let function_id = Uuid::new_v4();
        store.append(sample_log(function_id, Utc::now())).await.unwrap();

        let deleted = store.reap(function_id, &RetentionPolicy::None).await.unwrap();
        assert_eq!(deleted, 1);
    }
}
