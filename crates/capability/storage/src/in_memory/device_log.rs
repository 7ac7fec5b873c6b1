//! 设备日志内存实现。

use crate::device_log::{DEFAULT_MAX_ENTRIES, DeviceLogStore, LogQuery, LogSummary, push_capped};
use crate::error::StorageError;
use async_trait::async_trait;
use domain::DeviceLogEntry;
use std::collections::BTreeMap;
use std::sync::RwLock;

pub struct InMemoryDeviceLogStore {
    max_entries: usize,
    logs: RwLock<BTreeMap<u8, Vec<DeviceLogEntry>>>,
}

impl InMemoryDeviceLogStore {
    pub fn new() -> Self {
        Self::with_max_entries(DEFAULT_MAX_ENTRIES)
    }

    pub fn with_max_entries(max_entries: usize) -> Self {
        Self {
            max_entries: max_entries.max(1),
            logs: RwLock::new(BTreeMap::new()),
        }
    }

    fn entries(&self, device_id: u8) -> Result<Vec<DeviceLogEntry>, StorageError> {
        let logs = self
            .logs
            .read()
            .map_err(|_| StorageError::new("lock failed"))?;
        Ok(logs.get(&device_id).cloned().unwrap_or_default())
    }
}

impl Default for InMemoryDeviceLogStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DeviceLogStore for InMemoryDeviceLogStore {
    async fn append(&self, entry: DeviceLogEntry) -> Result<(), StorageError> {
        let mut logs = self
            .logs
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        let entries = logs.entry(entry.device_id).or_default();
        push_capped(entries, entry, self.max_entries);
        Ok(())
    }

    async fn list(&self, device_id: u8, limit: usize) -> Result<Vec<DeviceLogEntry>, StorageError> {
        Ok(LogQuery::latest(limit).apply(&self.entries(device_id)?))
    }

    async fn search(
        &self,
        device_id: u8,
        query: &LogQuery,
    ) -> Result<Vec<DeviceLogEntry>, StorageError> {
        Ok(query.apply(&self.entries(device_id)?))
    }

    async fn summary(&self, device_id: u8) -> Result<LogSummary, StorageError> {
        Ok(LogSummary::from_entries(&self.entries(device_id)?))
    }

    async fn clear(&self, device_id: u8) -> Result<(), StorageError> {
        let mut logs = self
            .logs
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        logs.remove(&device_id);
        Ok(())
    }

    async fn device_ids(&self) -> Result<Vec<u8>, StorageError> {
        let logs = self
            .logs
            .read()
            .map_err(|_| StorageError::new("lock failed"))?;
        Ok(logs
            .iter()
            .filter(|(_, entries)| !entries.is_empty())
            .map(|(id, _)| *id)
            .collect())
    }
}
