use async_trait::async_trait;
use dashmap::DashMap;

use super::{CounterStore, StoreError};
use crate::rate_limit::window::Window;

#[derive(Debug, Clone, Copy)]
struct Counter {
    count: u64,
    expires_at_ms: i64,
}

/// 进程内计数存储，仅用于测试和单实例开发环境
#[derive(Debug, Default)]
pub struct MemoryCounterStore {
    counters: DashMap<(String, i64), Counter>,
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, key: &str, window: Window) -> Option<u64> {
        self.counters
            .get(&(key.to_string(), window.start_ms()))
            .map(|c| c.count)
    }

    /// 所有计数的快照：(key, window_start_ms, count)
    pub fn snapshot(&self) -> Vec<(String, i64, u64)> {
        self.counters
            .iter()
            .map(|e| (e.key().0.clone(), e.key().1, e.value().count))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.counters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    async fn increment(
        &self,
        key: &str,
        window: Window,
        ceiling: Option<u64>,
    ) -> Result<u64, StoreError> {
        // entry 持有分片写锁，插入与自增不可分割
        let mut entry = self
            .counters
            .entry((key.to_string(), window.start_ms()))
            .or_insert(Counter {
                count: 0,
                expires_at_ms: window.end_ms(),
            });
        let next = entry.count + 1;
        entry.count = match ceiling {
            Some(cap) => next.min(cap.max(1)),
            None => next,
        };
        Ok(entry.count)
    }

    async fn purge_expired(&self, now_ms: i64) -> Result<u64, StoreError> {
        let before = self.counters.len();
        self.counters.retain(|_, c| c.expires_at_ms > now_ms);
        Ok(before.saturating_sub(self.counters.len()) as u64)
    }
}
