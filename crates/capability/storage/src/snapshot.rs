//! 设备快照存储接口
//!
//! 快照只用于进程重启后的恢复，运行期间注册表才是唯一的数据来源。

use crate::error::StorageError;
use async_trait::async_trait;
use domain::DeviceRecord;
use serde::{Deserialize, Serialize};

/// 当前快照格式版本
pub const SNAPSHOT_VERSION: u32 = 1;

/// 持久化快照文档
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotDocument {
    pub version: u32,
    pub saved_at_ms: i64,
    pub devices: Vec<DeviceRecord>,
}

impl SnapshotDocument {
    pub fn new(devices: Vec<DeviceRecord>, saved_at_ms: i64) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            saved_at_ms,
            devices,
        }
    }
}

/// 设备快照存储接口
#[async_trait]
pub trait DeviceSnapshotStore: Send + Sync {
    /// 加载全部设备记录（无快照时返回空列表）
    async fn load_all(&self) -> Result<Vec<DeviceRecord>, StorageError>;

    /// 整体覆盖写入
    async fn save_all(&self, devices: &[DeviceRecord], saved_at_ms: i64)
    -> Result<(), StorageError>;
}
