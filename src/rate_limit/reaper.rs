use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::{Clock, CounterStore};

/// 启动后台清理任务，周期性删除已过期的窗口记录。
///
/// 过期记录不会再被写入，清理与在线请求之间不需要任何同步。
pub fn spawn_reaper(
    store: Arc<dyn CounterStore>,
    clock: Arc<dyn Clock>,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // 第一次 tick 立即返回，跳过
        ticker.tick().await;

        loop {
            ticker.tick().await;
            match store.purge_expired(clock.now_ms()).await {
                Ok(0) => {}
                Ok(removed) => tracing::debug!("Purged {} expired rate limit records", removed),
                Err(e) => tracing::warn!("Failed to purge rate limit records: {}", e),
            }
        }
    })
}
