use std::sync::Arc;

use super::{
    Clock, CounterStore, LimitKey, OverflowPolicy, RateLimitPolicy, StoreError, SystemClock,
    Window,
};

/// 一次限流判定的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub limit: u32,
    /// 自增后的计数
    pub count: u64,
    pub remaining: u32,
    pub window: Window,
    /// 距窗口结束的毫秒数
    pub reset_ms: u64,
    /// 仅在被拒绝时存在
    pub retry_after_ms: Option<u64>,
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        self.retry_after_ms.is_none()
    }
}

/// 固定窗口限流器。计数完全依赖注入的存储，本地不缓存任何计数。
#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn CounterStore>,
    clock: Arc<dyn Clock>,
    overflow: OverflowPolicy,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn CounterStore>) -> Self {
        Self {
            store,
            clock: Arc::new(SystemClock),
            overflow: OverflowPolicy::default(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_overflow(mut self, overflow: OverflowPolicy) -> Self {
        self.overflow = overflow;
        self
    }

    /// 为 `key` 计一次请求并给出判定。
    ///
    /// 自增在独立的 tokio 任务中执行：即使调用方的请求被取消，已发出的自增也会完成，
    /// 不会出现计数丢失。自增失败时不做任何判定，直接返回存储错误。
    pub async fn check(
        &self,
        key: &LimitKey,
        policy: &RateLimitPolicy,
    ) -> Result<Decision, StoreError> {
        let now = self.clock.now_ms();
        let window = policy.window_at(now);
        let ceiling = self.overflow.ceiling(policy);

        let store = self.store.clone();
        let storage_key = key.storage_key();
        let count = tokio::spawn(async move { store.increment(&storage_key, window, ceiling).await })
            .await
            .map_err(|e| StoreError::Task(e.to_string()))??;

        let limit = policy.max();
        let remaining = u64::from(limit).saturating_sub(count) as u32;
        let reset_ms = window.remaining_ms(now);
        let retry_after_ms = (count > u64::from(limit)).then_some(reset_ms);

        Ok(Decision {
            limit,
            count,
            remaining,
            window,
            reset_ms,
            retry_after_ms,
        })
    }
}
