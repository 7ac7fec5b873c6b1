//! 单设备日志存储接口
//!
//! - [`DeviceLogStore`]：异步读写接口（文件/内存实现）
//! - [`DeviceLogAppender`]：同步、非阻塞的追加接口，注册表在状态迁移时调用

use crate::error::StorageError;
use async_trait::async_trait;
use domain::{DeviceLogEntry, DeviceLogKind};
use serde::Serialize;
use std::collections::BTreeMap;

/// 单设备默认保留条数
pub const DEFAULT_MAX_ENTRIES: usize = 1000;

/// 日志检索条件
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogQuery {
    pub kind: Option<DeviceLogKind>,
    /// 起始时间（含）
    pub start_ms: Option<i64>,
    /// 结束时间（含）
    pub end_ms: Option<i64>,
    /// 最多返回最近的 N 条
    pub limit: usize,
}

impl LogQuery {
    pub fn latest(limit: usize) -> Self {
        Self {
            limit,
            ..Default::default()
        }
    }

    fn matches(&self, entry: &DeviceLogEntry) -> bool {
        if self.kind.is_some_and(|kind| kind != entry.kind) {
            return false;
        }
        if self.start_ms.is_some_and(|start| entry.timestamp_ms < start) {
            return false;
        }
        if self.end_ms.is_some_and(|end| entry.timestamp_ms > end) {
            return false;
        }
        true
    }

    /// 过滤后保留最近 `limit` 条，保持时间正序。
    pub fn apply(&self, entries: &[DeviceLogEntry]) -> Vec<DeviceLogEntry> {
        let filtered: Vec<&DeviceLogEntry> =
            entries.iter().filter(|entry| self.matches(entry)).collect();
        let skip = filtered.len().saturating_sub(self.limit);
        filtered.into_iter().skip(skip).cloned().collect()
    }
}

/// 日志摘要
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LogSummary {
    pub total: usize,
    pub first_ms: Option<i64>,
    pub last_ms: Option<i64>,
    pub kinds: BTreeMap<String, usize>,
}

impl LogSummary {
    pub fn from_entries(entries: &[DeviceLogEntry]) -> Self {
        let mut kinds = BTreeMap::new();
        for entry in entries {
            *kinds.entry(entry.kind.as_str().to_string()).or_insert(0) += 1;
        }
        Self {
            total: entries.len(),
            first_ms: entries.first().map(|entry| entry.timestamp_ms),
            last_ms: entries.last().map(|entry| entry.timestamp_ms),
            kinds,
        }
    }
}

/// 单设备日志存储接口
#[async_trait]
pub trait DeviceLogStore: Send + Sync {
    async fn append(&self, entry: DeviceLogEntry) -> Result<(), StorageError>;

    /// 最近 `limit` 条，时间正序
    async fn list(&self, device_id: u8, limit: usize) -> Result<Vec<DeviceLogEntry>, StorageError>;

    async fn search(
        &self,
        device_id: u8,
        query: &LogQuery,
    ) -> Result<Vec<DeviceLogEntry>, StorageError>;

    async fn summary(&self, device_id: u8) -> Result<LogSummary, StorageError>;

    async fn clear(&self, device_id: u8) -> Result<(), StorageError>;

    /// 有日志的设备 ID（升序）
    async fn device_ids(&self) -> Result<Vec<u8>, StorageError>;
}

/// 日志追加接口（同步、不得阻塞调用方）
pub trait DeviceLogAppender: Send + Sync {
    fn append(&self, entry: DeviceLogEntry);
}

/// 丢弃所有日志
pub struct NoopLogAppender;

impl DeviceLogAppender for NoopLogAppender {
    fn append(&self, _entry: DeviceLogEntry) {}
}

/// 追加后按上限截断，保留最新条目。
pub(crate) fn push_capped(entries: &mut Vec<DeviceLogEntry>, entry: DeviceLogEntry, max: usize) {
    entries.push(entry);
    if entries.len() > max {
        let overflow = entries.len() - max;
        entries.drain(..overflow);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};

    fn entry(ts: i64, kind: DeviceLogKind) -> DeviceLogEntry {
        DeviceLogEntry::new(
            7,
            ts,
            kind,
            "test",
            0xC8,
            IpAddr::V4(Ipv4Addr::new(10, 0, 0, 7)),
        )
    }

    #[test]
    fn query_keeps_latest_matching_entries_in_order() {
        let entries = vec![
            entry(1, DeviceLogKind::Online),
            entry(2, DeviceLogKind::Alarm),
            entry(3, DeviceLogKind::Alarm),
            entry(4, DeviceLogKind::Recover),
            entry(5, DeviceLogKind::Alarm),
        ];
        let query = LogQuery {
            kind: Some(DeviceLogKind::Alarm),
            limit: 2,
            ..Default::default()
        };
        let found: Vec<i64> = query.apply(&entries).iter().map(|e| e.timestamp_ms).collect();
        assert_eq!(found, vec![3, 5]);

        let window = LogQuery {
            start_ms: Some(2),
            end_ms: Some(4),
            limit: 10,
            ..Default::default()
        };
        assert_eq!(window.apply(&entries).len(), 3);
    }

    #[test]
    fn push_capped_drops_oldest() {
        let mut entries = Vec::new();
        for ts in 0..5 {
            push_capped(&mut entries, entry(ts, DeviceLogKind::Heartbeat), 3);
        }
        let kept: Vec<i64> = entries.iter().map(|e| e.timestamp_ms).collect();
        assert_eq!(kept, vec![2, 3, 4]);
    }

    #[test]
    fn summary_counts_kinds() {
        let entries = vec![
            entry(10, DeviceLogKind::Online),
            entry(20, DeviceLogKind::Alarm),
            entry(30, DeviceLogKind::Alarm),
        ];
        let summary = LogSummary::from_entries(&entries);
        assert_eq!(summary.total, 3);
        assert_eq!(summary.first_ms, Some(10));
        assert_eq!(summary.last_ms, Some(30));
        assert_eq!(summary.kinds.get("alarm"), Some(&2));
        assert_eq!(LogSummary::from_entries(&[]), LogSummary::default());
    }
}
