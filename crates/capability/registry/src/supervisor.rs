//! 离线巡检
//!
//! 两个相互独立的周期：
//! - 离线判定：超过离线超时无帧的在线设备标记为离线（默认每 30s，超时 180s）
//! - 长期离线移除：离线超过保留期的记录移出注册表（默认每 300s，保留 7 天）
//!
//! 两者都在注册表锁内“读取-判定-修改”，与冲突检测的接管判定不会交错。

use crate::registry::DeviceRegistry;
use domain::now_epoch_ms;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy)]
pub struct SupervisorConfig {
    pub offline_timeout_ms: i64,
    pub check_interval: Duration,
    pub retention_ms: i64,
    pub eviction_interval: Duration,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            offline_timeout_ms: 180_000,
            check_interval: Duration::from_secs(30),
            retention_ms: 7 * 24 * 3600 * 1000,
            eviction_interval: Duration::from_secs(300),
        }
    }
}

pub struct OfflineSupervisor {
    registry: Arc<DeviceRegistry>,
    config: SupervisorConfig,
}

impl OfflineSupervisor {
    pub fn new(registry: Arc<DeviceRegistry>, config: SupervisorConfig) -> Self {
        Self { registry, config }
    }

    /// 执行一次离线判定，返回新离线的设备数。
    pub fn sweep_offline(&self, now_ms: i64) -> usize {
        let transitioned = self
            .registry
            .mark_offline(self.config.offline_timeout_ms, now_ms);
        if !transitioned.is_empty() {
            debug!(
                target: "alarm.registry",
                count = transitioned.len(),
                "offline_sweep_done"
            );
        }
        transitioned.len()
    }

    /// 执行一次长期离线移除，返回移除的设备数。
    pub fn sweep_evictions(&self, now_ms: i64) -> usize {
        self.registry
            .evict_offline(self.config.retention_ms, now_ms)
            .len()
    }

    pub fn spawn(self, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut offline_tick = tokio::time::interval(self.config.check_interval);
            offline_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut eviction_tick = tokio::time::interval(self.config.eviction_interval);
            eviction_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                if *shutdown.borrow() {
                    break;
                }
                tokio::select! {
                    _ = offline_tick.tick() => {
                        self.sweep_offline(now_epoch_ms());
                    }
                    _ = eviction_tick.tick() => {
                        self.sweep_evictions(now_epoch_ms());
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }
            info!(target: "alarm.registry", "offline_supervisor_stopped");
        })
    }
}
