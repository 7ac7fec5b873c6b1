//! 设备快照内存实现。

use crate::error::StorageError;
use crate::snapshot::{DeviceSnapshotStore, SnapshotDocument};
use async_trait::async_trait;
use domain::DeviceRecord;
use std::sync::RwLock;

pub struct InMemorySnapshotStore {
    document: RwLock<Option<SnapshotDocument>>,
    saves: RwLock<u64>,
}

impl InMemorySnapshotStore {
    pub fn new() -> Self {
        Self {
            document: RwLock::new(None),
            saves: RwLock::new(0),
        }
    }

    /// 以已有记录初始化（模拟进程重启前的快照）。
    pub fn with_devices(devices: Vec<DeviceRecord>, saved_at_ms: i64) -> Self {
        Self {
            document: RwLock::new(Some(SnapshotDocument::new(devices, saved_at_ms))),
            saves: RwLock::new(0),
        }
    }

    /// 最近一次写入的文档。
    pub fn document(&self) -> Result<Option<SnapshotDocument>, StorageError> {
        let document = self
            .document
            .read()
            .map_err(|_| StorageError::new("lock failed"))?;
        Ok(document.clone())
    }

    /// 累计写入次数。
    pub fn save_count(&self) -> Result<u64, StorageError> {
        let saves = self
            .saves
            .read()
            .map_err(|_| StorageError::new("lock failed"))?;
        Ok(*saves)
    }
}

impl Default for InMemorySnapshotStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DeviceSnapshotStore for InMemorySnapshotStore {
    async fn load_all(&self) -> Result<Vec<DeviceRecord>, StorageError> {
        let document = self
            .document
            .read()
            .map_err(|_| StorageError::new("lock failed"))?;
        Ok(document
            .as_ref()
            .map(|document| document.devices.clone())
            .unwrap_or_default())
    }

    async fn save_all(
        &self,
        devices: &[DeviceRecord],
        saved_at_ms: i64,
    ) -> Result<(), StorageError> {
        let mut document = self
            .document
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        *document = Some(SnapshotDocument::new(devices.to_vec(), saved_at_ms));
        let mut saves = self
            .saves
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        *saves += 1;
        Ok(())
    }
}
