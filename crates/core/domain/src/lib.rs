//! 报警设备中间件的核心领域模型。
//!
//! - [`device`]：设备记录、设备状态、ID 修改协商记录
//! - [`event`]：推送给外部观察者的设备事件
//! - [`log`]：单设备日志条目

pub mod device;
pub mod event;
pub mod log;

pub use device::{
    BROADCAST_ID, DeviceRecord, DeviceStatus, MAX_DEVICE_ID, MIN_DEVICE_ID, PendingReassignment,
    SERVER_ID, is_assignable_id,
};
pub use event::DeviceEvent;
pub use log::{DeviceLogEntry, DeviceLogKind};

/// 获取当前时间戳（毫秒）
pub fn now_epoch_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}
