//! 设备日志 JSON 文件实现（`device_<id>.json`，内容为按时间正序的条目数组）。

use super::{read_optional, write_atomic};
use crate::device_log::{DEFAULT_MAX_ENTRIES, DeviceLogStore, LogQuery, LogSummary, push_capped};
use crate::error::StorageError;
use async_trait::async_trait;
use domain::DeviceLogEntry;
use std::io::ErrorKind;
use std::path::PathBuf;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::warn;

pub struct JsonFileDeviceLogStore {
    dir: PathBuf,
    max_entries: usize,
    // 读-改-写需要串行
    lock: Mutex<()>,
}

impl JsonFileDeviceLogStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self::with_max_entries(dir, DEFAULT_MAX_ENTRIES)
    }

    pub fn with_max_entries(dir: impl Into<PathBuf>, max_entries: usize) -> Self {
        Self {
            dir: dir.into(),
            max_entries: max_entries.max(1),
            lock: Mutex::new(()),
        }
    }

    fn file_path(&self, device_id: u8) -> PathBuf {
        self.dir.join(format!("device_{}.json", device_id))
    }

    /// 损坏的日志文件按空处理，下一次追加时覆盖。
    async fn load(&self, device_id: u8) -> Result<Vec<DeviceLogEntry>, StorageError> {
        let path = self.file_path(device_id);
        let Some(bytes) = read_optional(&path).await? else {
            return Ok(Vec::new());
        };
        match serde_json::from_slice(&bytes) {
            Ok(entries) => Ok(entries),
            Err(err) => {
                warn!(
                    target: "alarm.storage",
                    device_id,
                    path = %path.display(),
                    error = %err,
                    "device_log_file_corrupted"
                );
                Ok(Vec::new())
            }
        }
    }
}

fn parse_device_id(file_name: &str) -> Option<u8> {
    file_name
        .strip_prefix("device_")?
        .strip_suffix(".json")?
        .parse()
        .ok()
}

#[async_trait]
impl DeviceLogStore for JsonFileDeviceLogStore {
    async fn append(&self, entry: DeviceLogEntry) -> Result<(), StorageError> {
        let _guard = self.lock.lock().await;
        let device_id = entry.device_id;
        let mut entries = self.load(device_id).await?;
        push_capped(&mut entries, entry, self.max_entries);
        let bytes = serde_json::to_vec_pretty(&entries)?;
        write_atomic(&self.file_path(device_id), &bytes).await
    }

    async fn list(&self, device_id: u8, limit: usize) -> Result<Vec<DeviceLogEntry>, StorageError> {
        let _guard = self.lock.lock().await;
        Ok(LogQuery::latest(limit).apply(&self.load(device_id).await?))
    }

    async fn search(
        &self,
        device_id: u8,
        query: &LogQuery,
    ) -> Result<Vec<DeviceLogEntry>, StorageError> {
        let _guard = self.lock.lock().await;
        Ok(query.apply(&self.load(device_id).await?))
    }

    async fn summary(&self, device_id: u8) -> Result<LogSummary, StorageError> {
        let _guard = self.lock.lock().await;
        Ok(LogSummary::from_entries(&self.load(device_id).await?))
    }

    async fn clear(&self, device_id: u8) -> Result<(), StorageError> {
        let _guard = self.lock.lock().await;
        match fs::remove_file(self.file_path(device_id)).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    async fn device_ids(&self) -> Result<Vec<u8>, StorageError> {
        let mut dir = match fs::read_dir(&self.dir).await {
            Ok(dir) => dir,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };
        let mut ids = Vec::new();
        while let Some(item) = dir.next_entry().await? {
            if let Some(id) = item.file_name().to_str().and_then(parse_device_id) {
                ids.push(id);
            }
        }
        ids.sort_unstable();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::parse_device_id;

    #[test]
    fn parses_log_file_names() {
        assert_eq!(parse_device_id("device_7.json"), Some(7));
        assert_eq!(parse_device_id("device_254.json"), Some(254));
        assert_eq!(parse_device_id("device_7.json.tmp"), None);
        assert_eq!(parse_device_id("device_300.json"), None);
        assert_eq!(parse_device_id("notes.json"), None);
    }
}
