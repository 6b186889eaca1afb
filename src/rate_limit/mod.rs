// 限流模块
// 固定窗口计数，按 (身份, 资源) 独立计数，计数存储可替换

pub mod clock;
pub mod key;
pub mod limiter;
pub mod reaper;
pub mod store;
pub mod window;

use std::str::FromStr;

pub use clock::{Clock, ManualClock, SystemClock};
pub use key::LimitKey;
pub use limiter::{Decision, RateLimiter};
pub use reaper::spawn_reaper;
pub use store::{CounterStore, MemoryCounterStore, PgCounterStore, RedisCounterStore, StoreError};
pub use window::{InvalidPolicy, RateLimitPolicy, Window};

/// 超限后计数是否继续增长
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverflowPolicy {
    /// 每个请求都计数，被拒绝的请求也不退还
    #[default]
    Count,
    /// 计数封顶在 `max + 1`，仍可判定超限
    Clamp,
}

impl OverflowPolicy {
    /// 存储端的计数上限
    pub fn ceiling(self, policy: &RateLimitPolicy) -> Option<u64> {
        match self {
            OverflowPolicy::Count => None,
            OverflowPolicy::Clamp => Some(u64::from(policy.max()) + 1),
        }
    }
}

impl FromStr for OverflowPolicy {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "count" => Ok(Self::Count),
            "clamp" => Ok(Self::Clamp),
            _ => Err(()),
        }
    }
}

/// 计数存储不可用时的处理方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreFailurePolicy {
    #[default]
    FailClosed,
    FailOpen,
}

impl FromStr for StoreFailurePolicy {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "fail_closed" | "closed" => Ok(Self::FailClosed),
            "fail_open" | "open" => Ok(Self::FailOpen),
            _ => Err(()),
        }
    }
}
