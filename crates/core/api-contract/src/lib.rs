//! 稳定的 DTO 与 API 响应契约。

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 标准 API 响应封装。
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<ApiError>,
}

/// 失败响应的错误体。
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(ApiError {
                code: code.into(),
                message: message.into(),
            }),
        }
    }
}

/// 设备返回结构。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceDto {
    pub device_id: u8,
    pub status: String,
    /// 最近一次帧是否仍在在线窗口内
    pub online: bool,
    pub is_offline: bool,
    pub offline_since_ms: Option<i64>,
    pub first_seen_ms: i64,
    pub last_seen_ms: i64,
    pub seconds_since_last_seen: i64,
    pub wifi_rssi: u8,
    pub source_ip: String,
    pub alarm_count: u64,
    pub recover_count: u64,
    pub heartbeat_count: u64,
}

/// 设备列表返回结构。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceListDto {
    pub devices: Vec<DeviceDto>,
    pub count: usize,
}

/// 设备日志查询参数。
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceLogQuery {
    pub limit: Option<usize>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    #[serde(alias = "start_ms")]
    pub start_ms: Option<i64>,
    #[serde(alias = "end_ms")]
    pub end_ms: Option<i64>,
}

/// 设备日志返回结构。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceLogDto {
    pub device_id: u8,
    pub timestamp_ms: i64,
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
    pub wifi_rssi: u8,
    pub source_ip: String,
}

/// 设备日志统计返回结构。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogSummaryDto {
    pub device_id: u8,
    pub total: usize,
    pub first_ms: Option<i64>,
    pub last_ms: Option<i64>,
    pub kinds: BTreeMap<String, usize>,
}

/// 修改设备 ID 请求体。
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModifyDeviceIdRequest {
    #[serde(alias = "current_id")]
    pub current_id: Option<u16>,
    #[serde(alias = "new_id")]
    pub new_id: Option<u16>,
}

/// 立即上报请求体。
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImmediateReportRequest {
    #[serde(alias = "device_id")]
    pub device_id: Option<u16>,
    #[serde(alias = "target_ip")]
    pub target_ip: Option<String>,
}

/// 下行命令受理结果。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandAcceptedDto {
    pub device_id: u8,
    pub target_ip: String,
    /// 修改 ID 时的新 ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_id: Option<u8>,
    pub message: String,
}

/// 计数指标快照。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshotDto {
    pub frames_received: u64,
    pub frames_rejected: u64,
    pub frames_ignored: u64,
    pub conflicts_detected: u64,
    pub conflicts_resolved: u64,
    pub id_space_exhausted: u64,
    pub id_migrations: u64,
    pub devices_offline: u64,
    pub devices_evicted: u64,
    pub commands_sent: u64,
    pub command_send_failures: u64,
    pub snapshot_writes: u64,
    pub snapshot_write_failures: u64,
    pub log_entries_dropped: u64,
    pub events_published: u64,
}
