use std::sync::Arc;

use async_trait::async_trait;
use redis::{Client as RedisClient, Script};

use super::{CounterStore, StoreError};
use crate::rate_limit::window::Window;

/// Redis 键前缀
const RATE_LIMIT_PREFIX: &str = "rate_limit:";

/// 窗口结束后额外保留的毫秒数，防止时钟偏差导致提前过期
const EXPIRY_SLACK_MS: i64 = 1_000;

// INCR 与 PEXPIREAT 在同一脚本内执行，不会留下没有过期时间的键
const INCREMENT_SCRIPT: &str = r#"
local count = redis.call('INCR', KEYS[1])
if count == 1 then
    redis.call('PEXPIREAT', KEYS[1], ARGV[1])
end
local cap = tonumber(ARGV[2])
if cap > 0 and count > cap then
    redis.call('SET', KEYS[1], cap, 'KEEPTTL')
    count = cap
end
return count
"#;

/// 键的绝对过期时间：窗口结束时刻 + 余量
pub fn expire_at_ms(window: Window) -> i64 {
    window.end_ms().saturating_add(EXPIRY_SLACK_MS)
}

pub fn rate_limit_key(key: &str, window: Window) -> String {
    format!("{}{}:{}", RATE_LIMIT_PREFIX, key, window.start_ms())
}

/// 基于 Redis 的计数存储，过期清理交给键的 TTL
#[derive(Clone)]
pub struct RedisCounterStore {
    redis: Arc<RedisClient>,
    script: Arc<Script>,
}

impl RedisCounterStore {
    pub fn new(redis: Arc<RedisClient>) -> Self {
        Self {
            redis,
            script: Arc::new(Script::new(INCREMENT_SCRIPT)),
        }
    }
}

#[async_trait]
impl CounterStore for RedisCounterStore {
    async fn increment(
        &self,
        key: &str,
        window: Window,
        ceiling: Option<u64>,
    ) -> Result<u64, StoreError> {
        let mut conn = self.redis.get_multiplexed_async_connection().await?;

        let count: u64 = self
            .script
            .key(rate_limit_key(key, window))
            .arg(expire_at_ms(window))
            .arg(ceiling.unwrap_or(0))
            .invoke_async(&mut conn)
            .await?;

        Ok(count)
    }

    async fn purge_expired(&self, _now_ms: i64) -> Result<u64, StoreError> {
        // 键自带 PEXPIREAT，无需主动删除
        Ok(0)
    }
}
