//! 后台持久化任务
//!
//! - [`SnapshotWriter`]：唯一的快照写入任务。监听注册表修订号，变化后读取一份时间点快照并在锁外写入；
//!   `watch` 通道只保留最新修订号，突发的多次修改合并为一次写入。
//! - [`DeviceLogWriter`]：有界队列 + 后台任务，把同步的日志追加转换为异步写入。

use crate::device_log::{DeviceLogAppender, DeviceLogStore};
use crate::snapshot::DeviceSnapshotStore;
use alarm_telemetry::{record_log_entry_dropped, record_snapshot_write, record_snapshot_write_failure};
use domain::{DeviceLogEntry, DeviceRecord, now_epoch_ms};
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// 快照数据来源（注册表实现）
pub trait SnapshotSource: Send + Sync {
    /// 时间点快照（不得在返回后继续持有内部锁）
    fn snapshot(&self) -> Vec<DeviceRecord>;
}

pub struct SnapshotWriter;

impl SnapshotWriter {
    /// 启动写入任务。退出信号到达后再写一次，然后结束。
    pub fn spawn(
        store: Arc<dyn DeviceSnapshotStore>,
        source: Arc<dyn SnapshotSource>,
        mut changes: watch::Receiver<u64>,
        mut shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                if *shutdown.borrow() {
                    break;
                }
                tokio::select! {
                    changed = changes.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let revision = *changes.borrow_and_update();
                        debug!(target: "alarm.storage", revision, "snapshot_revision_changed");
                        Self::write_once(store.as_ref(), source.as_ref()).await;
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }
            Self::write_once(store.as_ref(), source.as_ref()).await;
            info!(target: "alarm.storage", "snapshot_writer_stopped");
        })
    }

    /// 写入一次快照；失败只记录，不向上传播。
    pub async fn write_once(store: &dyn DeviceSnapshotStore, source: &dyn SnapshotSource) -> bool {
        let devices = source.snapshot();
        match store.save_all(&devices, now_epoch_ms()).await {
            Ok(()) => {
                record_snapshot_write();
                debug!(
                    target: "alarm.storage",
                    devices = devices.len(),
                    "snapshot_written"
                );
                true
            }
            Err(err) => {
                record_snapshot_write_failure();
                error!(
                    target: "alarm.storage",
                    devices = devices.len(),
                    error = %err,
                    "snapshot_write_failed"
                );
                false
            }
        }
    }
}

/// 设备日志异步写入器
pub struct DeviceLogWriter {
    tx: mpsc::Sender<DeviceLogEntry>,
}

impl DeviceLogWriter {
    /// 启动后台写入任务；收到退出信号后写完队列中剩余条目再结束。
    pub fn spawn(
        store: Arc<dyn DeviceLogStore>,
        capacity: usize,
        mut shutdown: watch::Receiver<bool>,
    ) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::channel::<DeviceLogEntry>(capacity.max(1));
        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    entry = rx.recv() => {
                        match entry {
                            Some(entry) => Self::persist(store.as_ref(), entry).await,
                            None => break,
                        }
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            rx.close();
                            while let Some(entry) = rx.recv().await {
                                Self::persist(store.as_ref(), entry).await;
                            }
                            break;
                        }
                    }
                }
            }
            info!(target: "alarm.storage", "device_log_writer_stopped");
        });
        (Self { tx }, handle)
    }

    async fn persist(store: &dyn DeviceLogStore, entry: DeviceLogEntry) {
        let device_id = entry.device_id;
        if let Err(err) = store.append(entry).await {
            record_log_entry_dropped();
            error!(
                target: "alarm.storage",
                device_id,
                error = %err,
                "device_log_append_failed"
            );
        }
    }
}

impl DeviceLogAppender for DeviceLogWriter {
    fn append(&self, entry: DeviceLogEntry) {
        match self.tx.try_send(entry) {
            Ok(()) => {}
            Err(TrySendError::Full(entry)) => {
                record_log_entry_dropped();
                warn!(
                    target: "alarm.storage",
                    device_id = entry.device_id,
                    kind = entry.kind.as_str(),
                    "device_log_queue_full"
                );
            }
            Err(TrySendError::Closed(entry)) => {
                record_log_entry_dropped();
                debug!(
                    target: "alarm.storage",
                    device_id = entry.device_id,
                    "device_log_writer_closed"
                );
            }
        }
    }
}
