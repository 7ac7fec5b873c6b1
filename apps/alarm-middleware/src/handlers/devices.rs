//! 设备查询 handlers
//!
//! - GET /devices
//! - GET /devices/{id}
//! - GET /devices/{id}/logs?limit&type&startMs&endMs
//! - GET /devices/{id}/logs/summary
//!
//! 只读接口，返回注册表的快照副本。

use crate::AppState;
use crate::utils::parse_device_id;
use crate::utils::response::{
    bad_request_error, device_to_dto, log_entry_to_dto, not_found_error, storage_error,
    summary_to_dto,
};
use alarm_storage::LogQuery;
use api_contract::{ApiResponse, DeviceDto, DeviceListDto, DeviceLogDto, DeviceLogQuery};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use domain::{DeviceLogKind, now_epoch_ms};

/// 单次日志查询默认/最大条数
const DEFAULT_LOG_LIMIT: usize = 100;
const MAX_LOG_LIMIT: usize = 1000;

#[derive(serde::Deserialize)]
pub struct DevicePath {
    device_id: String,
}

/// 列出全部设备（按 ID 升序）
pub async fn list_devices(State(state): State<AppState>) -> Response {
    let now_ms = now_epoch_ms();
    let devices: Vec<DeviceDto> = state
        .registry
        .get_all()
        .into_iter()
        .map(|record| device_to_dto(record, state.online_timeout_ms, now_ms))
        .collect();
    let count = devices.len();
    (
        StatusCode::OK,
        Json(ApiResponse::success(DeviceListDto { devices, count })),
    )
        .into_response()
}

pub async fn get_device(State(state): State<AppState>, Path(path): Path<DevicePath>) -> Response {
    let device_id = match parse_device_id(&path.device_id) {
        Ok(id) => id,
        Err(response) => return response,
    };
    match state.registry.get(device_id) {
        Some(record) => (
            StatusCode::OK,
            Json(ApiResponse::success(device_to_dto(
                record,
                state.online_timeout_ms,
                now_epoch_ms(),
            ))),
        )
            .into_response(),
        None => not_found_error(),
    }
}

/// 设备日志（时间正序，默认最近 100 条）
pub async fn list_device_logs(
    State(state): State<AppState>,
    Path(path): Path<DevicePath>,
    Query(query): Query<DeviceLogQuery>,
) -> Response {
    let device_id = match parse_device_id(&path.device_id) {
        Ok(id) => id,
        Err(response) => return response,
    };
    let kind = match query.kind.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => match raw.parse::<DeviceLogKind>() {
            Ok(kind) => Some(kind),
            Err(message) => return bad_request_error(message),
        },
    };
    if let (Some(start), Some(end)) = (query.start_ms, query.end_ms)
        && start > end
    {
        return bad_request_error("startMs must not be after endMs");
    }
    let log_query = LogQuery {
        kind,
        start_ms: query.start_ms,
        end_ms: query.end_ms,
        limit: query
            .limit
            .unwrap_or(DEFAULT_LOG_LIMIT)
            .clamp(1, MAX_LOG_LIMIT),
    };
    match state.device_logs.search(device_id, &log_query).await {
        Ok(entries) => {
            let data: Vec<DeviceLogDto> = entries.into_iter().map(log_entry_to_dto).collect();
            (StatusCode::OK, Json(ApiResponse::success(data))).into_response()
        }
        Err(err) => storage_error(err),
    }
}

pub async fn device_log_summary(
    State(state): State<AppState>,
    Path(path): Path<DevicePath>,
) -> Response {
    let device_id = match parse_device_id(&path.device_id) {
        Ok(id) => id,
        Err(response) => return response,
    };
    match state.device_logs.summary(device_id).await {
        Ok(summary) => (
            StatusCode::OK,
            Json(ApiResponse::success(summary_to_dto(device_id, summary))),
        )
            .into_response(),
        Err(err) => storage_error(err),
    }
}
