//! 下行命令 handlers
//!
//! - POST /devices/modify-id
//! - POST /devices/immediate-report
//! - POST /devices/rediscover
//!
//! 这些接口只负责校验与转发，状态变化仍由设备重新上报后经注册表完成。

use crate::AppState;
use crate::utils::require_device_id;
use crate::utils::response::{
    bad_request_error, device_offline_error, id_conflict_error, internal_error, not_found_error,
    send_failed_error,
};
use alarm_control::ResolveError;
use alarm_registry::ReassignError;
use api_contract::{ApiResponse, CommandAcceptedDto, ImmediateReportRequest, ModifyDeviceIdRequest};
use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use domain::now_epoch_ms;
use std::net::IpAddr;
use tracing::info;

/// 修改设备 ID
pub async fn modify_device_id(
    State(state): State<AppState>,
    Json(req): Json<ModifyDeviceIdRequest>,
) -> Response {
    let current_id = match require_device_id(req.current_id, "currentId") {
        Ok(id) => id,
        Err(response) => return response,
    };
    let new_id = match require_device_id(req.new_id, "newId") {
        Ok(id) => id,
        Err(response) => return response,
    };
    match state
        .resolver
        .request_modification(current_id, new_id, state.online_timeout_ms, now_epoch_ms())
        .await
    {
        Ok(pending) => {
            info!(
                target: "alarm.api",
                current_id,
                new_id,
                source_ip = %pending.source_ip,
                "modify_device_id_accepted"
            );
            let data = CommandAcceptedDto {
                device_id: current_id,
                target_ip: pending.source_ip.to_string(),
                new_id: Some(new_id),
                message: format!("modify id command sent to device {}", current_id),
            };
            (StatusCode::OK, Json(ApiResponse::success(data))).into_response()
        }
        Err(ResolveError::Rejected(err)) => match err {
            ReassignError::InvalidId(_) | ReassignError::Unchanged(_) => {
                bad_request_error(err.to_string())
            }
            ReassignError::NotFound(_) => not_found_error(),
            ReassignError::Offline(_) => device_offline_error(err.to_string()),
            ReassignError::Conflict(_) => id_conflict_error(err.to_string()),
        },
        Err(ResolveError::Send(err)) => send_failed_error(err.to_string()),
        Err(err) => internal_error(err.to_string()),
    }
}

/// 立即上报（设备 ID 可为 255 表示全部设备）
pub async fn immediate_report(
    State(state): State<AppState>,
    Json(req): Json<ImmediateReportRequest>,
) -> Response {
    let device_id = match req.device_id {
        Some(id) => match u8::try_from(id) {
            Ok(id) if id != 0 => id,
            _ => return bad_request_error("deviceId must be between 1 and 255"),
        },
        None => return bad_request_error("deviceId is required"),
    };
    let target = match req.target_ip.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => match raw.parse::<IpAddr>() {
            Ok(ip) => Some(ip),
            Err(_) => return bad_request_error(format!("invalid targetIp: {}", raw)),
        },
    };
    match state.discovery.report_now(device_id, target).await {
        Ok(target_ip) => {
            let data = CommandAcceptedDto {
                device_id,
                target_ip: target_ip.to_string(),
                new_id: None,
                message: format!("immediate report command sent to device {}", device_id),
            };
            (StatusCode::OK, Json(ApiResponse::success(data))).into_response()
        }
        Err(err) => send_failed_error(err.to_string()),
    }
}

/// 重新执行启动发现流程（后台进行，立即返回）
pub async fn rediscover_devices(State(state): State<AppState>) -> Response {
    // 任务自行结束或随停止信号退出，不需要保留句柄
    let _ = state.discovery.clone().rediscover(state.shutdown.clone());
    (
        StatusCode::ACCEPTED,
        Json(ApiResponse::success(serde_json::json!({
            "message": "device discovery started",
        }))),
    )
        .into_response()
}
