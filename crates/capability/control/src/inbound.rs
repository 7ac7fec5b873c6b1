//! 上行帧处理
//!
//! 注册表更新在接收循环内同步完成（保证同一设备按接收顺序生效），
//! 冲突协商涉及网络发送，放到独立任务中执行，不阻塞后续接收。

use crate::resolver::{ConflictResolver, ResolveError};
use alarm_protocol::{Frame, FrameHandler, ProtocolError};
use alarm_registry::{DeviceRegistry, DeviceReport, UpdateOutcome};
use async_trait::async_trait;
use domain::{DeviceEvent, now_epoch_ms};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tokio::task::JoinHandle;

/// 单帧处理结果
pub struct Processed {
    pub outcome: UpdateOutcome,
    /// 冲突时启动的协商任务
    pub resolution: Option<JoinHandle<Result<u8, ResolveError>>>,
}

pub struct FrameProcessor {
    registry: Arc<DeviceRegistry>,
    resolver: Arc<ConflictResolver>,
}

impl FrameProcessor {
    pub fn new(registry: Arc<DeviceRegistry>, resolver: Arc<ConflictResolver>) -> Self {
        Self { registry, resolver }
    }

    pub fn process(&self, frame: &Frame, source_ip: IpAddr, now_ms: i64) -> Processed {
        let report = DeviceReport {
            device_id: frame.device_id,
            command: frame.command,
            status: frame.status,
            wifi_rssi: frame.wifi_rssi,
            source_ip,
        };
        let outcome = self.registry.update(report, now_ms);
        let resolution = match &outcome {
            UpdateOutcome::Updated(record) => {
                self.registry.publish(DeviceEvent::DeviceMessage {
                    timestamp_ms: now_ms,
                    device_id: record.id,
                    command: frame.command.as_u8(),
                    command_name: frame.command.name().to_string(),
                    status: frame.status,
                    wifi_rssi: frame.wifi_rssi,
                    source_ip,
                    device: record.clone(),
                });
                None
            }
            UpdateOutcome::ConflictDetected {
                device_id,
                source_ip,
            } => {
                let resolver = self.resolver.clone();
                let (device_id, source_ip) = (*device_id, *source_ip);
                Some(tokio::spawn(async move {
                    resolver.resolve(device_id, source_ip, now_ms).await
                }))
            }
            UpdateOutcome::Ignored(_) => None,
        };
        Processed {
            outcome,
            resolution,
        }
    }
}

#[async_trait]
impl FrameHandler for FrameProcessor {
    async fn handle(&self, frame: Frame, source: SocketAddr) -> Result<(), ProtocolError> {
        // 协商任务自行记录结果，这里不等待
        let _ = self.process(&frame, source.ip(), now_epoch_ms());
        Ok(())
    }
}
