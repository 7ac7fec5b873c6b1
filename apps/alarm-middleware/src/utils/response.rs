//! HTTP 响应辅助函数和 DTO 转换
//!
//! - 错误响应：bad_request_error, not_found_error, device_offline_error, id_conflict_error,
//!   send_failed_error, storage_error
//! - DTO 转换：device_to_dto, log_entry_to_dto, summary_to_dto
//!
//! 所有错误返回统一的 ApiResponse 格式，HTTP 状态码与错误码一一对应。

use alarm_storage::{LogSummary, StorageError};
use api_contract::{ApiResponse, DeviceDto, DeviceLogDto, LogSummaryDto};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use domain::{DeviceLogEntry, DeviceRecord};

fn error_response(status: StatusCode, code: &str, message: impl Into<String>) -> Response {
    (status, Json(ApiResponse::<()>::error(code, message.into()))).into_response()
}

/// 错误请求响应
pub fn bad_request_error(message: impl Into<String>) -> Response {
    error_response(StatusCode::BAD_REQUEST, "INVALID.REQUEST", message)
}

/// 资源未找到错误响应
pub fn not_found_error() -> Response {
    error_response(StatusCode::NOT_FOUND, "RESOURCE.NOT_FOUND", "not found")
}

pub fn device_offline_error(message: impl Into<String>) -> Response {
    error_response(StatusCode::CONFLICT, "DEVICE.OFFLINE", message)
}

pub fn id_conflict_error(message: impl Into<String>) -> Response {
    error_response(StatusCode::CONFLICT, "DEVICE.ID_CONFLICT", message)
}

/// 下行命令发送失败
pub fn send_failed_error(message: impl Into<String>) -> Response {
    error_response(StatusCode::BAD_GATEWAY, "COMMAND.SEND_FAILED", message)
}

/// 存储错误响应
pub fn storage_error(err: StorageError) -> Response {
    error_response(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL.ERROR", err.to_string())
}

pub fn internal_error(message: impl Into<String>) -> Response {
    error_response(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL.ERROR", message)
}

/// DeviceRecord 转 DeviceDto
pub fn device_to_dto(record: DeviceRecord, online_timeout_ms: i64, now_ms: i64) -> DeviceDto {
    let silent_ms = record.silent_for_ms(now_ms);
    DeviceDto {
        device_id: record.id,
        status: record.status.as_str().to_string(),
        online: !record.is_offline() && silent_ms < online_timeout_ms,
        is_offline: record.is_offline(),
        offline_since_ms: record.offline_since_ms,
        first_seen_ms: record.first_seen_ms,
        last_seen_ms: record.last_seen_ms,
        seconds_since_last_seen: silent_ms / 1000,
        wifi_rssi: record.wifi_rssi,
        source_ip: record.source_ip.to_string(),
        alarm_count: record.alarm_count,
        recover_count: record.recover_count,
        heartbeat_count: record.heartbeat_count,
    }
}

/// DeviceLogEntry 转 DeviceLogDto
pub fn log_entry_to_dto(entry: DeviceLogEntry) -> DeviceLogDto {
    DeviceLogDto {
        device_id: entry.device_id,
        timestamp_ms: entry.timestamp_ms,
        kind: entry.kind.as_str().to_string(),
        message: entry.message,
        wifi_rssi: entry.wifi_rssi,
        source_ip: entry.source_ip.to_string(),
    }
}

pub fn summary_to_dto(device_id: u8, summary: LogSummary) -> LogSummaryDto {
    LogSummaryDto {
        device_id,
        total: summary.total,
        first_ms: summary.first_ms,
        last_ms: summary.last_ms,
        kinds: summary.kinds,
    }
}
