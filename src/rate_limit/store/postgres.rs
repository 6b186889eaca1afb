use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use sqlx::PgPool;

use super::{CounterStore, StoreError};
use crate::rate_limit::window::Window;

/// 基于 Postgres 表 `rate_limits` 的计数存储
#[derive(Debug, Clone)]
pub struct PgCounterStore {
    pool: PgPool,
}

impl PgCounterStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 建表（幂等）
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS rate_limits (
                key          TEXT        NOT NULL,
                window_start TIMESTAMPTZ NOT NULL,
                expires_at   TIMESTAMPTZ NOT NULL,
                count        BIGINT      NOT NULL CHECK (count >= 1),
                PRIMARY KEY (key, window_start)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS rate_limits_expires_at_idx ON rate_limits (expires_at)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// 读取某窗口的当前计数
    pub async fn count(&self, key: &str, window: Window) -> Result<Option<u64>, StoreError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT count FROM rate_limits WHERE key = $1 AND window_start = $2",
        )
        .bind(key)
        .bind(window.start())
        .fetch_optional(&self.pool)
        .await?;

        Ok(count.map(|c| c.max(0) as u64))
    }
}

#[async_trait]
impl CounterStore for PgCounterStore {
    async fn increment(
        &self,
        key: &str,
        window: Window,
        ceiling: Option<u64>,
    ) -> Result<u64, StoreError> {
        // 单条 upsert，冲突时在行锁内自增，不存在先读后写
        let ceiling = ceiling.map(|c| c.clamp(1, i64::MAX as u64) as i64);
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO rate_limits (key, window_start, expires_at, count)
            VALUES ($1, $2, $3, 1)
            ON CONFLICT (key, window_start)
            DO UPDATE SET count = CASE
                WHEN $4::BIGINT IS NULL THEN rate_limits.count + 1
                ELSE LEAST(rate_limits.count + 1, $4::BIGINT)
            END
            RETURNING count
            "#,
        )
        .bind(key)
        .bind(window.start())
        .bind(window.end())
        .bind(ceiling)
        .fetch_one(&self.pool)
        .await?;

        Ok(count.max(0) as u64)
    }

    async fn purge_expired(&self, now_ms: i64) -> Result<u64, StoreError> {
        let now = Utc
            .timestamp_millis_opt(now_ms)
            .single()
            .ok_or_else(|| StoreError::Unavailable(format!("无效的时间戳 {}", now_ms)))?;

        let result = sqlx::query("DELETE FROM rate_limits WHERE expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use futures_util::future::join_all;
    use sqlx::postgres::PgPoolOptions;

    use super::*;

    // 仅在设置 TEST_DATABASE_URL=postgres://... 时连接真实 Postgres
    async fn test_store() -> Option<PgCounterStore> {
        let url = std::env::var("TEST_DATABASE_URL").ok()?;
        let pool = PgPoolOptions::new()
            .max_connections(16)
            .connect(&url)
            .await
            .expect("connect postgres");
        let store = PgCounterStore::new(pool);
        store.ensure_schema().await.expect("schema");
        Some(store)
    }

    fn unique_key(tag: &str) -> String {
        format!("test:{}:{}", tag, Utc::now().timestamp_nanos_opt().unwrap_or_default())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_upserts_are_exact() {
        let Some(store) = test_store().await else {
            return;
        };
        let store = Arc::new(store);
        let key = unique_key("concurrent");
        let window = Window::containing(Utc::now().timestamp_millis(), 60_000);

        let tasks = (0..50).map(|_| {
            let store = store.clone();
            let key = key.clone();
            tokio::spawn(async move { store.increment(&key, window, None).await })
        });
        for result in join_all(tasks).await {
            result.unwrap().unwrap();
        }

        assert_eq!(store.count(&key, window).await.unwrap(), Some(50));
    }

    #[tokio::test]
    async fn ceiling_is_applied_inside_upsert() {
        let Some(store) = test_store().await else {
            return;
        };
        let key = unique_key("ceiling");
        let window = Window::containing(Utc::now().timestamp_millis(), 60_000);

        for _ in 0..6 {
            store.increment(&key, window, Some(3)).await.unwrap();
        }
        assert_eq!(store.count(&key, window).await.unwrap(), Some(3));
    }

    #[tokio::test]
    async fn purge_deletes_expired_rows() {
        let Some(store) = test_store().await else {
            return;
        };
        let key = unique_key("purge");
        let window = Window::containing(1_000, 1_000);

        store.increment(&key, window, None).await.unwrap();
        store.purge_expired(window.end_ms()).await.unwrap();
        assert_eq!(store.count(&key, window).await.unwrap(), None);
    }
}
