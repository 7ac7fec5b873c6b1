//! 设备快照 JSON 文件实现。

use super::{read_optional, write_atomic};
use crate::error::StorageError;
use crate::snapshot::{DeviceSnapshotStore, SNAPSHOT_VERSION, SnapshotDocument};
use async_trait::async_trait;
use domain::DeviceRecord;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

pub struct JsonFileSnapshotStore {
    path: PathBuf,
    // 串行化写入，避免两次写入共用同一个临时文件
    write_lock: Mutex<()>,
}

impl JsonFileSnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl DeviceSnapshotStore for JsonFileSnapshotStore {
    async fn load_all(&self) -> Result<Vec<DeviceRecord>, StorageError> {
        let Some(bytes) = read_optional(&self.path).await? else {
            return Ok(Vec::new());
        };
        let document: SnapshotDocument = serde_json::from_slice(&bytes)?;
        if document.version != SNAPSHOT_VERSION {
            return Err(StorageError::new(format!(
                "unsupported snapshot version {} in {}",
                document.version,
                self.path.display()
            )));
        }
        Ok(document.devices)
    }

    async fn save_all(
        &self,
        devices: &[DeviceRecord],
        saved_at_ms: i64,
    ) -> Result<(), StorageError> {
        let document = SnapshotDocument::new(devices.to_vec(), saved_at_ms);
        let bytes = serde_json::to_vec_pretty(&document)?;
        let _guard = self.write_lock.lock().await;
        write_atomic(&self.path, &bytes).await
    }
}
