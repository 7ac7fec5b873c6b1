//! HTTP 层辅助函数

pub mod response;

use axum::response::Response;
use response::bad_request_error;

/// 解析路径中的设备 ID（1-254）。
pub fn parse_device_id(raw: &str) -> Result<u8, Response> {
    match raw.trim().parse::<u8>() {
        Ok(id) if domain::is_assignable_id(id) => Ok(id),
        _ => Err(bad_request_error(format!("invalid device id: {}", raw))),
    }
}

/// 校验请求体中的设备 ID 字段（必填，1-254）。
pub fn require_device_id(value: Option<u16>, field: &str) -> Result<u8, Response> {
    let value = value.ok_or_else(|| bad_request_error(format!("{} is required", field)))?;
    match u8::try_from(value) {
        Ok(id) if domain::is_assignable_id(id) => Ok(id),
        _ => Err(bad_request_error(format!(
            "{} must be between 1 and 254",
            field
        ))),
    }
}
