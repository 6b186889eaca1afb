// 计数存储
// 唯一要求：对 (key, window) 的“插入或自增并返回新值”必须是一次原子操作

mod memory;
mod postgres;
mod redis_store;

use async_trait::async_trait;
use thiserror::Error;

pub use memory::MemoryCounterStore;
pub use postgres::PgCounterStore;
pub use redis_store::RedisCounterStore;

use super::window::Window;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Redis 错误: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("计数任务失败: {0}")]
    Task(String),
    #[error("计数存储不可用: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait CounterStore: Send + Sync {
    /// 原子地对 `(key, window)` 插入 count = 1 或自增 1，返回自增后的计数。
    ///
    /// `ceiling` 为 `Some(n)` 时计数不超过 `n`，封顶同样在这一次原子操作内完成。
    async fn increment(
        &self,
        key: &str,
        window: Window,
        ceiling: Option<u64>,
    ) -> Result<u64, StoreError>;

    /// 删除在 `now_ms` 之前已结束的窗口记录，返回删除数量
    async fn purge_expired(&self, now_ms: i64) -> Result<u64, StoreError>;
}
