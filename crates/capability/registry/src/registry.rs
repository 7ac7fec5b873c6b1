//! 设备注册表
//!
//! 注册表持有全部设备记录与进行中的 ID 修改协商，一把互斥锁保护二者：
//! 冲突检测、迁移消费、ID 分配必须相对普通更新串行执行，
//! 否则两个线程可能各自“解决”同一个冲突。
//!
//! ## 上行更新流程
//!
//! ```text
//! update(report)
//!   ├─ ID 为 0/255          → Ignored(ReservedId)
//!   ├─ 上线帧且命中协商记录 → 迁移旧记录到新 ID → Updated
//!   ├─ ID 被其他来源占用
//!   │    ├─ 占用者离线超过宽限期 → 移除旧占用者，继续
//!   │    └─ 否则                 → ConflictDetected（不修改任何状态）
//!   ├─ 新 ID 且已达容量上限 → Ignored(Capacity)
//!   └─ 创建或更新记录       → Updated
//! ```

use crate::events::{EventSink, NoopEventSink};
use alarm_protocol::Command;
use alarm_storage::{DeviceLogAppender, NoopLogAppender, SnapshotSource};
use alarm_telemetry::{
    record_conflict_detected, record_device_evicted, record_device_offline, record_frame_ignored,
    record_id_migration,
};
use domain::{
    DeviceEvent, DeviceLogEntry, DeviceLogKind, DeviceRecord, DeviceStatus, MAX_DEVICE_ID,
    MIN_DEVICE_ID, PendingReassignment, is_assignable_id,
};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::net::IpAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// 注册表策略参数
#[derive(Debug, Clone, Copy)]
pub struct RegistryPolicy {
    /// 容量上限（设备数）
    pub max_devices: usize,
    /// 占用者离线超过该时长后，其 ID 可被其他来源直接接管
    pub conflict_grace_ms: i64,
    /// 离线超过该时长的记录在分配时可被复用
    pub reuse_after_ms: i64,
}

impl Default for RegistryPolicy {
    fn default() -> Self {
        Self {
            max_devices: usize::from(MAX_DEVICE_ID),
            conflict_grace_ms: 5 * 60 * 1000,
            reuse_after_ms: 60 * 60 * 1000,
        }
    }
}

/// 一次上行上报
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceReport {
    pub device_id: u8,
    pub command: Command,
    pub status: u8,
    pub wifi_rssi: u8,
    pub source_ip: IpAddr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// ID 为 0（服务器自身）或 255（广播）
    ReservedId,
    /// 容量已满且 ID 未知
    Capacity,
}

/// 上行更新结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// 更新后的记录快照
    Updated(DeviceRecord),
    /// ID 已被其他来源占用，需由冲突协商处理
    ConflictDetected { device_id: u8, source_ip: IpAddr },
    Ignored(IgnoreReason),
}

/// ID 分配失败
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AllocationError {
    #[error("device id space exhausted")]
    Exhausted,
}

/// 人工修改 ID 请求被拒绝的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ReassignError {
    #[error("device id {0} is reserved or out of range")]
    InvalidId(u8),
    #[error("device {0} not found")]
    NotFound(u8),
    #[error("device {0} is not online")]
    Offline(u8),
    #[error("device id {0} is already in use")]
    Conflict(u8),
    #[error("device already uses id {0}")]
    Unchanged(u8),
}

/// 冲突协商预留结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reservation {
    pub pending: PendingReassignment,
    /// 沿用该来源尚未完成的同一协商（重发同一条修改命令）
    pub reused: bool,
}

#[derive(Default)]
struct RegistryState {
    devices: BTreeMap<u8, DeviceRecord>,
    pending: HashMap<IpAddr, PendingReassignment>,
}

/// 锁内产生、释放锁后投递的副作用
#[derive(Default)]
struct Effects {
    events: Vec<DeviceEvent>,
    logs: Vec<DeviceLogEntry>,
    changed: bool,
}

impl Effects {
    fn log(
        &mut self,
        record: &DeviceRecord,
        kind: DeviceLogKind,
        message: impl Into<String>,
        now_ms: i64,
    ) {
        self.logs.push(DeviceLogEntry::new(
            record.id,
            now_ms,
            kind,
            message,
            record.wifi_rssi,
            record.source_ip,
        ));
    }
}

/// 设备注册表
pub struct DeviceRegistry {
    policy: RegistryPolicy,
    state: Mutex<RegistryState>,
    events: Arc<dyn EventSink>,
    logs: Arc<dyn DeviceLogAppender>,
    revision: watch::Sender<u64>,
}

impl DeviceRegistry {
    pub fn new(policy: RegistryPolicy) -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            policy,
            state: Mutex::new(RegistryState::default()),
            events: Arc::new(NoopEventSink),
            logs: Arc::new(NoopLogAppender),
            revision,
        }
    }

    pub fn with_event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    pub fn with_log_appender(mut self, logs: Arc<dyn DeviceLogAppender>) -> Self {
        self.logs = logs;
        self
    }

    pub fn policy(&self) -> &RegistryPolicy {
        &self.policy
    }

    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 投递锁内缓存的副作用（调用时不得持有锁）。
    fn flush(&self, effects: Effects) {
        for event in effects.events {
            self.events.publish(event);
        }
        for entry in effects.logs {
            self.logs.append(entry);
        }
        if effects.changed {
            self.bump_revision();
        }
    }

    fn bump_revision(&self) {
        self.revision.send_modify(|revision| *revision = revision.wrapping_add(1));
    }

    /// 直接发布事件（协商、发现等注册表外部流程使用同一出口）。
    pub fn publish(&self, event: DeviceEvent) {
        self.events.publish(event);
    }

    /// 直接追加设备日志。
    pub fn append_log(&self, entry: DeviceLogEntry) {
        self.logs.append(entry);
    }

    /// 处理一次上行上报。
    pub fn update(&self, report: DeviceReport, now_ms: i64) -> UpdateOutcome {
        if !is_assignable_id(report.device_id) {
            record_frame_ignored();
            debug!(
                target: "alarm.registry",
                device_id = report.device_id,
                source_ip = %report.source_ip,
                "reserved_device_id_ignored"
            );
            return UpdateOutcome::Ignored(IgnoreReason::ReservedId);
        }

        let mut effects = Effects::default();
        let outcome = {
            let mut state = self.lock();
            self.apply_update(&mut state, &report, now_ms, &mut effects)
        };
        self.flush(effects);
        outcome
    }

    fn apply_update(
        &self,
        state: &mut RegistryState,
        report: &DeviceReport,
        now_ms: i64,
        effects: &mut Effects,
    ) -> UpdateOutcome {
        let id = report.device_id;
        let source_ip = report.source_ip;

        if report.command == Command::Online
            && let Some(outcome) = self.consume_migration(state, report, now_ms, effects)
        {
            return outcome;
        }

        match state.devices.get(&id) {
            Some(existing) if existing.source_ip != source_ip => {
                if !existing.offline_longer_than(self.policy.conflict_grace_ms, now_ms) {
                    record_conflict_detected();
                    warn!(
                        target: "alarm.registry",
                        device_id = id,
                        owner_ip = %existing.source_ip,
                        source_ip = %source_ip,
                        "device_id_conflict_detected"
                    );
                    return UpdateOutcome::ConflictDetected {
                        device_id: id,
                        source_ip,
                    };
                }
                info!(
                    target: "alarm.registry",
                    device_id = id,
                    owner_ip = %existing.source_ip,
                    source_ip = %source_ip,
                    offline_since_ms = ?existing.offline_since_ms,
                    "stale_device_owner_replaced"
                );
                if let Some(stale) = state.devices.remove(&id) {
                    push_eviction(&stale, "replaced after offline grace", now_ms, effects);
                }
            }
            Some(_) => {}
            None if state.devices.len() >= self.policy.max_devices => {
                record_frame_ignored();
                warn!(
                    target: "alarm.registry",
                    device_id = id,
                    source_ip = %source_ip,
                    max_devices = self.policy.max_devices,
                    "registry_at_capacity"
                );
                return UpdateOutcome::Ignored(IgnoreReason::Capacity);
            }
            None => {}
        }

        let is_new = !state.devices.contains_key(&id);
        let record = state
            .devices
            .entry(id)
            .or_insert_with(|| DeviceRecord::new(id, source_ip, now_ms));
        if is_new {
            info!(
                target: "alarm.registry",
                device_id = id,
                source_ip = %source_ip,
                "device_registered"
            );
        }
        apply_report(record, report, now_ms, effects);
        UpdateOutcome::Updated(record.clone())
    }

    /// 上线帧命中该来源的协商记录时完成迁移；未命中返回 None 走普通流程。
    fn consume_migration(
        &self,
        state: &mut RegistryState,
        report: &DeviceReport,
        now_ms: i64,
        effects: &mut Effects,
    ) -> Option<UpdateOutcome> {
        let pending = *state.pending.get(&report.source_ip)?;
        if pending.new_id != report.device_id {
            return None;
        }
        state.pending.remove(&report.source_ip);

        if !self.slot_available(state, pending.new_id, report.source_ip, now_ms) {
            warn!(
                target: "alarm.registry",
                old_id = pending.old_id,
                new_id = pending.new_id,
                source_ip = %report.source_ip,
                "stale_reassignment_discarded"
            );
            return None;
        }

        // 旧 ID 的记录只有来自同一来源时才属于该设备（冲突场景下旧 ID 属于另一台设备）
        let migrated = match state.devices.get(&pending.old_id) {
            Some(old) if old.source_ip == report.source_ip => state.devices.remove(&pending.old_id),
            _ => None,
        };
        // 上线帧之前用新 ID 发来的帧已建立记录，同一来源即同一台设备
        let (early, displaced) = match state.devices.remove(&pending.new_id) {
            Some(record) if record.source_ip == report.source_ip => (Some(record), None),
            other => (None, other),
        };

        if migrated.is_none()
            && early.is_none()
            && displaced.is_none()
            && state.devices.len() >= self.policy.max_devices
        {
            record_frame_ignored();
            warn!(
                target: "alarm.registry",
                device_id = pending.new_id,
                source_ip = %report.source_ip,
                max_devices = self.policy.max_devices,
                "registry_at_capacity"
            );
            return Some(UpdateOutcome::Ignored(IgnoreReason::Capacity));
        }

        if let Some(displaced) = &displaced {
            push_eviction(displaced, "replaced by reassigned device", now_ms, effects);
        }

        let carried_history = migrated.is_some();
        let mut record = match (migrated, early) {
            (Some(mut record), early) => {
                record.id = pending.new_id;
                if let Some(early) = early {
                    absorb(&mut record, &early);
                }
                record
            }
            (None, Some(early)) => early,
            (None, None) => DeviceRecord::new(pending.new_id, report.source_ip, now_ms),
        };
        record.source_ip = report.source_ip;

        record_id_migration();
        info!(
            target: "alarm.registry",
            old_id = pending.old_id,
            new_id = pending.new_id,
            source_ip = %report.source_ip,
            carried_history,
            "device_id_migrated"
        );
        // 旧 ID 仍属于另一台设备时观察者不能移除它
        if carried_history {
            effects.events.push(DeviceEvent::DeviceIdChange {
                timestamp_ms: now_ms,
                old_device_id: pending.old_id,
                new_device_id: pending.new_id,
                source_ip: report.source_ip,
            });
        }
        effects.log(
            &record,
            DeviceLogKind::IdChange,
            format!("id changed {} -> {}", pending.old_id, pending.new_id),
            now_ms,
        );

        apply_report(&mut record, report, now_ms, effects);
        let snapshot = record.clone();
        state.devices.insert(pending.new_id, record);
        effects.changed = true;
        Some(UpdateOutcome::Updated(snapshot))
    }

    /// 目标 ID 对某来源是否可用：空闲、同一来源、或占用者离线超过宽限期/复用阈值。
    fn slot_available(
        &self,
        state: &RegistryState,
        id: u8,
        source_ip: IpAddr,
        now_ms: i64,
    ) -> bool {
        match state.devices.get(&id) {
            None => true,
            Some(existing) => {
                existing.source_ip == source_ip
                    || existing.offline_longer_than(self.policy.conflict_grace_ms, now_ms)
                    || existing.offline_longer_than(self.policy.reuse_after_ms, now_ms)
            }
        }
    }

    pub fn get(&self, id: u8) -> Option<DeviceRecord> {
        self.lock().devices.get(&id).cloned()
    }

    /// 全部记录（按 ID 升序的快照副本）。
    pub fn get_all(&self) -> Vec<DeviceRecord> {
        self.lock().devices.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().devices.is_empty()
    }

    /// 记录存在且距最近一次有效帧不足 `timeout_ms`。
    pub fn is_online(&self, id: u8, timeout_ms: i64, now_ms: i64) -> bool {
        self.lock()
            .devices
            .get(&id)
            .is_some_and(|record| record.silent_for_ms(now_ms) < timeout_ms)
    }

    /// 该来源上报该 ID 是否构成冲突。
    pub fn check_conflict(&self, id: u8, source_ip: IpAddr, now_ms: i64) -> bool {
        self.lock().devices.get(&id).is_some_and(|existing| {
            existing.source_ip != source_ip
                && !existing.offline_longer_than(self.policy.conflict_grace_ms, now_ms)
        })
    }

    /// 分配一个可用 ID（不预留）。
    pub fn allocate(&self, now_ms: i64) -> Result<u8, AllocationError> {
        let state = self.lock();
        self.allocate_locked(&state, now_ms)
            .ok_or(AllocationError::Exhausted)
    }

    /// 升序扫描：先找无记录的 ID，再找离线超过复用阈值的 ID；跳过协商中的目标 ID。
    fn allocate_locked(&self, state: &RegistryState, now_ms: i64) -> Option<u8> {
        let reserved: HashSet<u8> = state.pending.values().map(|p| p.new_id).collect();
        let mut candidates = (MIN_DEVICE_ID..=MAX_DEVICE_ID).filter(|id| !reserved.contains(id));

        // 容量已满时新 ID 无法落库，只能复用长期离线的 ID
        let has_capacity = state.devices.len() + reserved.len() < self.policy.max_devices;
        if has_capacity
            && let Some(id) = candidates.clone().find(|id| !state.devices.contains_key(id))
        {
            return Some(id);
        }
        candidates.find(|id| {
            state
                .devices
                .get(id)
                .is_some_and(|record| record.offline_longer_than(self.policy.reuse_after_ms, now_ms))
        })
    }

    /// 为冲突来源预留新 ID 并登记协商记录（同一临界区内完成）。
    ///
    /// 该来源已有针对同一旧 ID 的协商且目标仍可用时沿用原协商。
    pub fn begin_reassignment(
        &self,
        old_id: u8,
        source_ip: IpAddr,
        now_ms: i64,
    ) -> Result<Reservation, AllocationError> {
        let mut state = self.lock();
        if let Some(existing) = state.pending.get(&source_ip).copied() {
            if existing.old_id == old_id
                && self.slot_available(&state, existing.new_id, source_ip, now_ms)
            {
                return Ok(Reservation {
                    pending: existing,
                    reused: true,
                });
            }
            state.pending.remove(&source_ip);
        }

        let new_id = self
            .allocate_locked(&state, now_ms)
            .ok_or(AllocationError::Exhausted)?;
        let pending = PendingReassignment {
            source_ip,
            old_id,
            new_id,
            registered_at_ms: now_ms,
        };
        state.pending.insert(source_ip, pending);
        debug!(
            target: "alarm.registry",
            old_id,
            new_id,
            source_ip = %source_ip,
            "reassignment_registered"
        );
        Ok(Reservation {
            pending,
            reused: false,
        })
    }

    /// 人工修改 ID：校验后登记协商记录（以设备最近来源为键），返回该记录。
    pub fn request_reassignment(
        &self,
        current_id: u8,
        new_id: u8,
        online_timeout_ms: i64,
        now_ms: i64,
    ) -> Result<PendingReassignment, ReassignError> {
        if !is_assignable_id(new_id) {
            return Err(ReassignError::InvalidId(new_id));
        }
        let mut state = self.lock();
        let record = state
            .devices
            .get(&current_id)
            .ok_or(ReassignError::NotFound(current_id))?;
        if record.silent_for_ms(now_ms) >= online_timeout_ms {
            return Err(ReassignError::Offline(current_id));
        }
        if new_id == current_id {
            return Err(ReassignError::Unchanged(new_id));
        }
        let source_ip = record.source_ip;
        let targeted_elsewhere = state
            .pending
            .values()
            .any(|p| p.new_id == new_id && p.source_ip != source_ip);
        if targeted_elsewhere || !self.slot_available(&state, new_id, source_ip, now_ms) {
            return Err(ReassignError::Conflict(new_id));
        }

        let pending = PendingReassignment {
            source_ip,
            old_id: current_id,
            new_id,
            registered_at_ms: now_ms,
        };
        state.pending.insert(source_ip, pending);
        info!(
            target: "alarm.registry",
            old_id = current_id,
            new_id,
            source_ip = %source_ip,
            "manual_reassignment_registered"
        );
        Ok(pending)
    }

    /// 撤销协商（仅当该来源的协商目标仍是 `new_id`）。
    pub fn cancel_reassignment(&self, source_ip: IpAddr, new_id: u8) -> bool {
        let mut state = self.lock();
        match state.pending.get(&source_ip) {
            Some(pending) if pending.new_id == new_id => {
                state.pending.remove(&source_ip);
                true
            }
            _ => false,
        }
    }

    /// 清理超时未完成的协商，返回被清理的记录。
    pub fn expire_pending(&self, timeout_ms: i64, now_ms: i64) -> Vec<PendingReassignment> {
        let mut state = self.lock();
        let expired: Vec<PendingReassignment> = state
            .pending
            .values()
            .filter(|pending| pending.is_expired(timeout_ms, now_ms))
            .copied()
            .collect();
        for pending in &expired {
            state.pending.remove(&pending.source_ip);
            info!(
                target: "alarm.registry",
                old_id = pending.old_id,
                new_id = pending.new_id,
                source_ip = %pending.source_ip,
                "reassignment_expired"
            );
        }
        expired
    }

    pub fn pending(&self) -> Vec<PendingReassignment> {
        let mut pending: Vec<PendingReassignment> = self.lock().pending.values().copied().collect();
        pending.sort_by_key(|p| (p.registered_at_ms, p.old_id));
        pending
    }

    /// 将超时无帧的在线设备标记为离线（已离线的不重复处理），返回本次迁移的记录。
    pub fn mark_offline(&self, timeout_ms: i64, now_ms: i64) -> Vec<DeviceRecord> {
        let mut effects = Effects::default();
        let transitioned = {
            let mut state = self.lock();
            let mut transitioned = Vec::new();
            for record in state.devices.values_mut() {
                if record.is_offline() || record.silent_for_ms(now_ms) <= timeout_ms {
                    continue;
                }
                record.mark_offline(now_ms);
                record_device_offline();
                let timeout_secs = u64::try_from(timeout_ms / 1000).unwrap_or(0);
                info!(
                    target: "alarm.registry",
                    device_id = record.id,
                    source_ip = %record.source_ip,
                    silent_ms = record.silent_for_ms(now_ms),
                    "device_marked_offline"
                );
                effects.events.push(DeviceEvent::DeviceOffline {
                    timestamp_ms: now_ms,
                    device_id: record.id,
                    source_ip: record.source_ip,
                    offline_timeout_secs: timeout_secs,
                });
                effects.log(
                    record,
                    DeviceLogKind::Offline,
                    format!("no frame for more than {}s", timeout_secs),
                    now_ms,
                );
                transitioned.push(record.clone());
            }
            effects.changed = !transitioned.is_empty();
            transitioned
        };
        self.flush(effects);
        transitioned
    }

    /// 移除离线超过保留期的记录，返回被移除的记录。
    pub fn evict_offline(&self, retention_ms: i64, now_ms: i64) -> Vec<DeviceRecord> {
        let mut effects = Effects::default();
        let evicted = {
            let mut state = self.lock();
            let ids: Vec<u8> = state
                .devices
                .values()
                .filter(|record| record.offline_longer_than(retention_ms, now_ms))
                .map(|record| record.id)
                .collect();
            let mut evicted = Vec::with_capacity(ids.len());
            for id in ids {
                let Some(record) = state.devices.remove(&id) else {
                    continue;
                };
                push_eviction(&record, "removed after long offline", now_ms, &mut effects);
                evicted.push(record);
            }
            effects.changed = !evicted.is_empty();
            evicted
        };
        self.flush(effects);
        evicted
    }

    /// 启动时从快照恢复（跳过保留 ID、重复 ID，遵守容量上限），返回恢复条数。
    pub fn restore(&self, records: Vec<DeviceRecord>) -> usize {
        let mut state = self.lock();
        let mut restored = 0;
        for record in records {
            if !is_assignable_id(record.id)
                || state.devices.contains_key(&record.id)
                || state.devices.len() >= self.policy.max_devices
            {
                warn!(
                    target: "alarm.registry",
                    device_id = record.id,
                    "snapshot_record_skipped"
                );
                continue;
            }
            state.devices.insert(record.id, record);
            restored += 1;
        }
        info!(target: "alarm.registry", restored, "registry_restored");
        restored
    }

    /// 已知设备的来源地址（去重、有序）。
    pub fn known_source_ips(&self) -> Vec<IpAddr> {
        let ips: BTreeSet<IpAddr> = self
            .lock()
            .devices
            .values()
            .map(|record| record.source_ip)
            .collect();
        ips.into_iter().collect()
    }

    /// 订阅修订号变化（持久化任务使用）。
    pub fn subscribe_changes(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    pub fn revision(&self) -> u64 {
        *self.revision.borrow()
    }

    /// 不修改状态，仅请求写一次快照。
    pub fn request_persist(&self) {
        self.bump_revision();
    }
}

impl SnapshotSource for DeviceRegistry {
    fn snapshot(&self) -> Vec<DeviceRecord> {
        self.get_all()
    }
}

/// 表外命令不改变已知状态，只把新记录的 unknown 视为 online。
fn status_for(current: DeviceStatus, command: Command) -> DeviceStatus {
    match command {
        Command::Online => DeviceStatus::Online,
        Command::Alarm => DeviceStatus::Alarm,
        Command::Recover => DeviceStatus::Recover,
        Command::Heartbeat => DeviceStatus::Heartbeat,
        _ if current == DeviceStatus::Unknown => DeviceStatus::Online,
        _ => current,
    }
}

/// 记录移出注册表：计数、事件与设备日志。
fn push_eviction(record: &DeviceRecord, reason: &str, now_ms: i64, effects: &mut Effects) {
    record_device_evicted();
    info!(
        target: "alarm.registry",
        device_id = record.id,
        source_ip = %record.source_ip,
        offline_since_ms = ?record.offline_since_ms,
        reason,
        "device_evicted"
    );
    effects.events.push(DeviceEvent::DeviceEvicted {
        timestamp_ms: now_ms,
        device_id: record.id,
        offline_since_ms: record.offline_since_ms,
    });
    effects.log(record, DeviceLogKind::Evicted, reason, now_ms);
    effects.changed = true;
}

/// 把同一设备在新 ID 上提前产生的记录并入迁移过来的记录。
fn absorb(record: &mut DeviceRecord, early: &DeviceRecord) {
    record.first_seen_ms = record.first_seen_ms.min(early.first_seen_ms);
    record.last_seen_ms = record.last_seen_ms.max(early.last_seen_ms);
    record.alarm_count += early.alarm_count;
    record.recover_count += early.recover_count;
    record.heartbeat_count += early.heartbeat_count;
}

/// 把一次上报写入记录：清除离线标记、更新时间/状态/计数/信号/来源。
fn apply_report(record: &mut DeviceRecord, report: &DeviceReport, now_ms: i64, effects: &mut Effects) {
    if record.mark_online() {
        info!(
            target: "alarm.registry",
            device_id = record.id,
            source_ip = %report.source_ip,
            "device_back_online"
        );
        effects.events.push(DeviceEvent::DeviceOnline {
            timestamp_ms: now_ms,
            device_id: record.id,
            source_ip: report.source_ip,
        });
    }
    record.touch(now_ms);
    record.status = status_for(record.status, report.command);
    record.wifi_rssi = report.wifi_rssi;
    record.source_ip = report.source_ip;

    let (kind, message) = match report.command {
        Command::Online => (DeviceLogKind::Online, "device online".to_string()),
        Command::Alarm => {
            record.alarm_count += 1;
            (DeviceLogKind::Alarm, format!("alarm (status={})", report.status))
        }
        Command::Recover => {
            record.recover_count += 1;
            (DeviceLogKind::Recover, format!("recovered (status={})", report.status))
        }
        Command::Heartbeat => {
            record.heartbeat_count += 1;
            (DeviceLogKind::Heartbeat, "heartbeat".to_string())
        }
        other => (
            DeviceLogKind::Unknown,
            format!("unknown command 0x{:02x}", other.as_u8()),
        ),
    };
    effects.log(record, kind, message, now_ms);
    effects.changed = true;
}
