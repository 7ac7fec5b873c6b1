//! 设备事件（推送给 SSE 等外部观察者）。

use crate::device::DeviceRecord;
use serde::Serialize;
use std::net::IpAddr;

/// 设备事件。
///
/// 序列化为带 `type` 标签的 JSON，例如
/// `{"type":"device_online","timestamp_ms":...,"device_id":7,"source_ip":"192.168.0.10"}`。
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DeviceEvent {
    /// 离线设备重新上线
    DeviceOnline {
        timestamp_ms: i64,
        device_id: u8,
        source_ip: IpAddr,
    },
    /// 超时无响应，判定离线
    DeviceOffline {
        timestamp_ms: i64,
        device_id: u8,
        source_ip: IpAddr,
        offline_timeout_secs: u64,
    },
    /// ID 迁移完成，观察者应移除旧 ID
    DeviceIdChange {
        timestamp_ms: i64,
        old_device_id: u8,
        new_device_id: u8,
        source_ip: IpAddr,
    },
    /// 检测到 ID 冲突并已下发修改命令
    IdConflictResolved {
        timestamp_ms: i64,
        old_device_id: u8,
        new_device_id: u8,
        source_ip: IpAddr,
    },
    /// ID 空间耗尽，冲突无法自动处理（需人工介入）
    IdSpaceExhausted {
        timestamp_ms: i64,
        device_id: u8,
        source_ip: IpAddr,
    },
    /// 长期离线设备被移出注册表
    DeviceEvicted {
        timestamp_ms: i64,
        device_id: u8,
        offline_since_ms: Option<i64>,
    },
    /// 启动/手动设备发现流程结束
    DeviceDiscoveryComplete {
        timestamp_ms: i64,
        known_devices: usize,
    },
    /// 上行帧处理完成
    DeviceMessage {
        timestamp_ms: i64,
        device_id: u8,
        command: u8,
        command_name: String,
        status: u8,
        wifi_rssi: u8,
        source_ip: IpAddr,
        device: DeviceRecord,
    },
    /// 推送通道空闲心跳
    Heartbeat { timestamp_ms: i64 },
}

impl DeviceEvent {
    /// 事件类型名（与序列化后的 `type` 字段一致）。
    pub fn kind(&self) -> &'static str {
        match self {
            Self::DeviceOnline { .. } => "device_online",
            Self::DeviceOffline { .. } => "device_offline",
            Self::DeviceIdChange { .. } => "device_id_change",
            Self::IdConflictResolved { .. } => "id_conflict_resolved",
            Self::IdSpaceExhausted { .. } => "id_space_exhausted",
            Self::DeviceEvicted { .. } => "device_evicted",
            Self::DeviceDiscoveryComplete { .. } => "device_discovery_complete",
            Self::DeviceMessage { .. } => "device_message",
            Self::Heartbeat { .. } => "heartbeat",
        }
    }

    pub fn timestamp_ms(&self) -> i64 {
        match self {
            Self::DeviceOnline { timestamp_ms, .. }
            | Self::DeviceOffline { timestamp_ms, .. }
            | Self::DeviceIdChange { timestamp_ms, .. }
            | Self::IdConflictResolved { timestamp_ms, .. }
            | Self::IdSpaceExhausted { timestamp_ms, .. }
            | Self::DeviceEvicted { timestamp_ms, .. }
            | Self::DeviceDiscoveryComplete { timestamp_ms, .. }
            | Self::DeviceMessage { timestamp_ms, .. }
            | Self::Heartbeat { timestamp_ms } => *timestamp_ms,
        }
    }
}
