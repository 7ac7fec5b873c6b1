//! ID 冲突协商
//!
//! 注册表返回 `ConflictDetected` 后，由 [`ConflictResolver`] 为冲突来源分配新 ID，
//! 向该来源下发 `AA 04 <旧ID> <新ID> 00 55`，并登记协商记录。设备以新 ID 重新上线时，
//! 注册表的迁移消费路径完成剩余工作。
//!
//! 分配与登记在注册表的同一临界区内完成，发送在锁外进行；发送失败时撤销预留。

use crate::dispatcher::{CommandDispatcher, ControlError};
use alarm_protocol::Frame;
use alarm_registry::{AllocationError, DeviceRegistry, ReassignError};
use alarm_telemetry::{record_conflict_resolved, record_id_space_exhausted};
use domain::{DeviceEvent, DeviceLogEntry, DeviceLogKind, PendingReassignment, now_epoch_ms};
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    /// 1-254 全部被不可复用的记录占用
    #[error("no free device id for conflicting id {0}")]
    Exhausted(u8),
    #[error("modify id request rejected: {0}")]
    Rejected(#[from] ReassignError),
    #[error("modify id command not sent: {0}")]
    Send(#[from] ControlError),
}

pub struct ConflictResolver {
    registry: Arc<DeviceRegistry>,
    dispatcher: Arc<dyn CommandDispatcher>,
}

impl ConflictResolver {
    pub fn new(registry: Arc<DeviceRegistry>, dispatcher: Arc<dyn CommandDispatcher>) -> Self {
        Self {
            registry,
            dispatcher,
        }
    }

    /// 处理一次冲突，返回分配给冲突来源的新 ID。
    ///
    /// 同一来源的协商尚未完成时重发同一条命令，不再分配第二个 ID。
    pub async fn resolve(
        &self,
        conflicting_id: u8,
        source_ip: IpAddr,
        now_ms: i64,
    ) -> Result<u8, ResolveError> {
        let reservation = match self
            .registry
            .begin_reassignment(conflicting_id, source_ip, now_ms)
        {
            Ok(reservation) => reservation,
            Err(AllocationError::Exhausted) => {
                record_id_space_exhausted();
                error!(
                    target: "alarm.control",
                    device_id = conflicting_id,
                    source_ip = %source_ip,
                    "id_space_exhausted"
                );
                self.registry.publish(DeviceEvent::IdSpaceExhausted {
                    timestamp_ms: now_ms,
                    device_id: conflicting_id,
                    source_ip,
                });
                return Err(ResolveError::Exhausted(conflicting_id));
            }
        };
        let new_id = reservation.pending.new_id;

        let frame = Frame::modify_id(conflicting_id, new_id);
        if let Err(err) = self.dispatcher.send(&frame, source_ip).await {
            // 重发失败时保留原协商，之前的命令可能已经送达
            if !reservation.reused {
                self.registry.cancel_reassignment(source_ip, new_id);
            }
            warn!(
                target: "alarm.control",
                old_id = conflicting_id,
                new_id,
                source_ip = %source_ip,
                error = %err,
                "conflict_resolution_send_failed"
            );
            return Err(err.into());
        }

        if reservation.reused {
            info!(
                target: "alarm.control",
                old_id = conflicting_id,
                new_id,
                source_ip = %source_ip,
                "conflict_command_resent"
            );
            return Ok(new_id);
        }

        record_conflict_resolved();
        info!(
            target: "alarm.control",
            old_id = conflicting_id,
            new_id,
            source_ip = %source_ip,
            "id_conflict_resolved"
        );
        self.registry.publish(DeviceEvent::IdConflictResolved {
            timestamp_ms: now_ms,
            old_device_id: conflicting_id,
            new_device_id: new_id,
            source_ip,
        });
        self.registry.append_log(DeviceLogEntry::new(
            new_id,
            now_ms,
            DeviceLogKind::Conflict,
            format!(
                "id {} already in use, {} told to switch to {}",
                conflicting_id, source_ip, new_id
            ),
            0,
            source_ip,
        ));
        Ok(new_id)
    }

    /// 人工修改 ID：校验并登记协商后，向设备最近来源发送修改命令。
    pub async fn request_modification(
        &self,
        current_id: u8,
        new_id: u8,
        online_timeout_ms: i64,
        now_ms: i64,
    ) -> Result<PendingReassignment, ResolveError> {
        let pending =
            self.registry
                .request_reassignment(current_id, new_id, online_timeout_ms, now_ms)?;
        let frame = Frame::modify_id(current_id, new_id);
        if let Err(err) = self.dispatcher.send(&frame, pending.source_ip).await {
            self.registry.cancel_reassignment(pending.source_ip, new_id);
            return Err(err.into());
        }
        info!(
            target: "alarm.control",
            old_id = current_id,
            new_id,
            source_ip = %pending.source_ip,
            "id_modification_sent"
        );
        Ok(pending)
    }

    /// 清理超时协商，返回清理数量。
    pub fn expire_pending(&self, timeout_ms: i64, now_ms: i64) -> usize {
        self.registry.expire_pending(timeout_ms, now_ms).len()
    }

    pub fn spawn_expiry(
        self: Arc<Self>,
        interval: Duration,
        timeout_ms: i64,
        mut shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(interval);
            tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                if *shutdown.borrow() {
                    break;
                }
                tokio::select! {
                    _ = tick.tick() => {
                        self.expire_pending(timeout_ms, now_epoch_ms());
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }
            info!(target: "alarm.control", "pending_expiry_stopped");
        })
    }
}
