//! 设备发现
//!
//! 启动流程：等待服务就绪 → 一轮发现 → 等待设备响应 → 再一轮发现 → 写快照 → 推送完成事件。
//! 一轮发现 = 向广播地址发一次立即上报，再向每个已知来源地址单播一次（覆盖丢弃广播的链路）。
//! 另有独立的周期性发现用于纠正状态漂移。
//!
//! 发现是尽力而为的：没有响应不视为错误，发送失败只记日志。

use crate::dispatcher::{CommandDispatcher, ControlError};
use alarm_protocol::Frame;
use alarm_registry::DeviceRegistry;
use domain::{BROADCAST_ID, DeviceEvent, now_epoch_ms};
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy)]
pub struct DiscoveryConfig {
    pub broadcast_addr: IpAddr,
    /// 启动后首轮发现前的等待
    pub settle_delay: Duration,
    /// 两轮启动发现之间的等待
    pub response_wait: Duration,
    /// 周期性发现间隔
    pub interval: Duration,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            broadcast_addr: IpAddr::V4(Ipv4Addr::BROADCAST),
            settle_delay: Duration::from_millis(2000),
            response_wait: Duration::from_millis(5000),
            interval: Duration::from_secs(300),
        }
    }
}

/// 一轮发现的发送结果
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiscoveryReport {
    pub broadcast_sent: bool,
    pub targeted_sent: usize,
    pub targeted_failed: usize,
}

pub struct DiscoveryBroadcaster {
    registry: Arc<DeviceRegistry>,
    dispatcher: Arc<dyn CommandDispatcher>,
    config: DiscoveryConfig,
}

impl DiscoveryBroadcaster {
    pub fn new(
        registry: Arc<DeviceRegistry>,
        dispatcher: Arc<dyn CommandDispatcher>,
        config: DiscoveryConfig,
    ) -> Self {
        Self {
            registry,
            dispatcher,
            config,
        }
    }

    pub fn config(&self) -> &DiscoveryConfig {
        &self.config
    }

    pub async fn broadcast_round(&self) -> DiscoveryReport {
        let frame = Frame::immediate_report(BROADCAST_ID);
        let mut report = DiscoveryReport {
            broadcast_sent: self
                .dispatcher
                .send(&frame, self.config.broadcast_addr)
                .await
                .is_ok(),
            ..DiscoveryReport::default()
        };

        for ip in self.registry.known_source_ips() {
            match self.dispatcher.send(&frame, ip).await {
                Ok(()) => report.targeted_sent += 1,
                Err(_) => report.targeted_failed += 1,
            }
        }
        info!(
            target: "alarm.control",
            broadcast_sent = report.broadcast_sent,
            targeted_sent = report.targeted_sent,
            targeted_failed = report.targeted_failed,
            "discovery_round_done"
        );
        report
    }

    /// 完整的启动发现流程，返回结束时注册表中的设备数。
    pub async fn run_startup(&self) -> usize {
        tokio::time::sleep(self.config.settle_delay).await;
        self.broadcast_round().await;
        tokio::time::sleep(self.config.response_wait).await;
        self.broadcast_round().await;

        self.registry.request_persist();
        let known_devices = self.registry.len();
        self.registry.publish(DeviceEvent::DeviceDiscoveryComplete {
            timestamp_ms: now_epoch_ms(),
            known_devices,
        });
        info!(target: "alarm.control", known_devices, "device_discovery_complete");
        known_devices
    }

    /// 在后台执行启动发现流程；收到停止信号时中止。
    pub fn spawn_startup(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            if *shutdown.borrow() {
                return;
            }
            tokio::select! {
                _ = self.run_startup() => {}
                _ = shutdown.changed() => {
                    info!(target: "alarm.control", "device_discovery_cancelled");
                }
            }
        })
    }

    /// 周期性发现（首轮在一个间隔之后）。间隔为 0 时不启用。
    pub fn spawn_periodic(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            if self.config.interval.is_zero() {
                warn!(target: "alarm.control", "periodic_discovery_disabled");
                return;
            }
            let start = tokio::time::Instant::now() + self.config.interval;
            let mut tick = tokio::time::interval_at(start, self.config.interval);
            tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                if *shutdown.borrow() {
                    break;
                }
                tokio::select! {
                    _ = tick.tick() => {
                        self.broadcast_round().await;
                        self.registry.request_persist();
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }
            info!(target: "alarm.control", "periodic_discovery_stopped");
        })
    }

    /// 手动重新发现（与启动流程相同）。
    pub fn rediscover(self: Arc<Self>, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        info!(target: "alarm.control", "device_rediscovery_requested");
        self.spawn_startup(shutdown)
    }

    /// 向单个设备发送立即上报。
    ///
    /// 目标地址优先级：显式地址 > 设备最近来源 > 广播地址。返回实际使用的地址。
    pub async fn report_now(
        &self,
        device_id: u8,
        target: Option<IpAddr>,
    ) -> Result<IpAddr, ControlError> {
        let target = target
            .or_else(|| self.registry.get(device_id).map(|record| record.source_ip))
            .unwrap_or(self.config.broadcast_addr);
        let frame = Frame::immediate_report(device_id);
        if let Err(err) = self.dispatcher.send(&frame, target).await {
            warn!(
                target: "alarm.control",
                device_id,
                target_ip = %target,
                error = %err,
                "immediate_report_send_failed"
            );
            return Err(err);
        }
        info!(
            target: "alarm.control",
            device_id,
            target_ip = %target,
            "immediate_report_sent"
        );
        Ok(target)
    }
}
