use chrono::{DateTime, TimeZone, Utc};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("限流配置无效: max 必须大于 0，window_ms 必须在 1 到 i64::MAX 之间")]
pub struct InvalidPolicy;

/// 单个路由的限流配置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    max: u32,
    window_ms: u64,
}

impl RateLimitPolicy {
    pub fn new(max: u32, window_ms: u64) -> Result<Self, InvalidPolicy> {
        if max == 0 || window_ms == 0 || i64::try_from(window_ms).is_err() {
            return Err(InvalidPolicy);
        }
        Ok(Self { max, window_ms })
    }

    pub fn max(&self) -> u32 {
        self.max
    }

    pub fn window_ms(&self) -> u64 {
        self.window_ms
    }

    pub fn window_at(&self, now_ms: i64) -> Window {
        Window::containing(now_ms, self.window_ms)
    }
}

/// 对齐到窗口大小整数倍的固定时间窗口
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Window {
    start_ms: i64,
    size_ms: u64,
}

impl Window {
    /// `start = now - (now mod size)`，各实例无需协调即可得到同一边界
    pub fn containing(now_ms: i64, size_ms: u64) -> Self {
        let size = size_as_i64(size_ms);
        Self {
            start_ms: now_ms - now_ms.rem_euclid(size),
            size_ms,
        }
    }

    pub fn start_ms(&self) -> i64 {
        self.start_ms
    }

    pub fn end_ms(&self) -> i64 {
        self.start_ms.saturating_add(size_as_i64(self.size_ms))
    }

    pub fn size_ms(&self) -> u64 {
        self.size_ms
    }

    pub fn contains(&self, now_ms: i64) -> bool {
        now_ms >= self.start_ms && now_ms < self.end_ms()
    }

    /// 距离窗口结束的毫秒数，即 `size - (now mod size)`
    pub fn remaining_ms(&self, now_ms: i64) -> u64 {
        self.end_ms()
            .saturating_sub(now_ms)
            .clamp(0, size_as_i64(self.size_ms)) as u64
    }

    pub fn start(&self) -> DateTime<Utc> {
        millis_to_datetime(self.start_ms)
    }

    pub fn end(&self) -> DateTime<Utc> {
        millis_to_datetime(self.end_ms())
    }
}

// 超出 i64 的窗口已被 RateLimitPolicy::new 拒绝，这里只做饱和
fn size_as_i64(size_ms: u64) -> i64 {
    i64::try_from(size_ms).unwrap_or(i64::MAX).max(1)
}

fn millis_to_datetime(ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// 毫秒向上取整为秒
pub fn ceil_secs(ms: u64) -> u64 {
    ms.div_ceil(1000)
}
