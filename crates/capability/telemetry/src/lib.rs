//! 追踪、请求 ID 生成与进程内计数指标。

use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing_subscriber::{EnvFilter, fmt};

/// 请求级追踪标识。
#[derive(Debug, Clone)]
pub struct RequestIds {
    pub request_id: String,
    pub trace_id: String,
}

/// 计数指标快照。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub frames_received: u64,
    pub frames_rejected: u64,
    pub frames_ignored: u64,
    pub conflicts_detected: u64,
    pub conflicts_resolved: u64,
    pub id_space_exhausted: u64,
    pub id_migrations: u64,
    pub devices_offline: u64,
    pub devices_evicted: u64,
    pub commands_sent: u64,
    pub command_send_failures: u64,
    pub snapshot_writes: u64,
    pub snapshot_write_failures: u64,
    pub log_entries_dropped: u64,
    pub events_published: u64,
}

/// 进程内计数指标（只增不减）。
pub struct TelemetryMetrics {
    frames_received: AtomicU64,
    frames_rejected: AtomicU64,
    frames_ignored: AtomicU64,
    conflicts_detected: AtomicU64,
    conflicts_resolved: AtomicU64,
    id_space_exhausted: AtomicU64,
    id_migrations: AtomicU64,
    devices_offline: AtomicU64,
    devices_evicted: AtomicU64,
    commands_sent: AtomicU64,
    command_send_failures: AtomicU64,
    snapshot_writes: AtomicU64,
    snapshot_write_failures: AtomicU64,
    log_entries_dropped: AtomicU64,
    events_published: AtomicU64,
}

impl TelemetryMetrics {
    pub fn new() -> Self {
        Self {
            frames_received: AtomicU64::new(0),
            frames_rejected: AtomicU64::new(0),
            frames_ignored: AtomicU64::new(0),
            conflicts_detected: AtomicU64::new(0),
            conflicts_resolved: AtomicU64::new(0),
            id_space_exhausted: AtomicU64::new(0),
            id_migrations: AtomicU64::new(0),
            devices_offline: AtomicU64::new(0),
            devices_evicted: AtomicU64::new(0),
            commands_sent: AtomicU64::new(0),
            command_send_failures: AtomicU64::new(0),
            snapshot_writes: AtomicU64::new(0),
            snapshot_write_failures: AtomicU64::new(0),
            log_entries_dropped: AtomicU64::new(0),
            events_published: AtomicU64::new(0),
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            frames_received: self.frames_received.load(Ordering::Relaxed),
            frames_rejected: self.frames_rejected.load(Ordering::Relaxed),
            frames_ignored: self.frames_ignored.load(Ordering::Relaxed),
            conflicts_detected: self.conflicts_detected.load(Ordering::Relaxed),
            conflicts_resolved: self.conflicts_resolved.load(Ordering::Relaxed),
            id_space_exhausted: self.id_space_exhausted.load(Ordering::Relaxed),
            id_migrations: self.id_migrations.load(Ordering::Relaxed),
            devices_offline: self.devices_offline.load(Ordering::Relaxed),
            devices_evicted: self.devices_evicted.load(Ordering::Relaxed),
            commands_sent: self.commands_sent.load(Ordering::Relaxed),
            command_send_failures: self.command_send_failures.load(Ordering::Relaxed),
            snapshot_writes: self.snapshot_writes.load(Ordering::Relaxed),
            snapshot_write_failures: self.snapshot_write_failures.load(Ordering::Relaxed),
            log_entries_dropped: self.log_entries_dropped.load(Ordering::Relaxed),
            events_published: self.events_published.load(Ordering::Relaxed),
        }
    }
}

impl Default for TelemetryMetrics {
    fn default() -> Self {
        Self::new()
    }
}

static METRICS: OnceLock<TelemetryMetrics> = OnceLock::new();

/// 获取全局指标实例。
pub fn metrics() -> &'static TelemetryMetrics {
    METRICS.get_or_init(TelemetryMetrics::new)
}

/// 初始化 tracing（默认 info，可通过 RUST_LOG 覆盖）。
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).try_init();
}

/// 生成新的 request_id 与 trace_id。
pub fn new_request_ids() -> RequestIds {
    RequestIds {
        request_id: uuid::Uuid::new_v4().to_string(),
        trace_id: uuid::Uuid::new_v4().to_string(),
    }
}

/// 记录收到的 UDP 数据报次数。
pub fn record_frame_received() {
    metrics().frames_received.fetch_add(1, Ordering::Relaxed);
}

/// 记录帧校验失败（长度/帧头/帧尾/下行命令）次数。
pub fn record_frame_rejected() {
    metrics().frames_rejected.fetch_add(1, Ordering::Relaxed);
}

/// 记录被忽略的合法帧次数（保留 ID、容量已满）。
pub fn record_frame_ignored() {
    metrics().frames_ignored.fetch_add(1, Ordering::Relaxed);
}

/// 记录检测到 ID 冲突次数。
pub fn record_conflict_detected() {
    metrics().conflicts_detected.fetch_add(1, Ordering::Relaxed);
}

/// 记录冲突已下发修改 ID 命令次数。
pub fn record_conflict_resolved() {
    metrics().conflicts_resolved.fetch_add(1, Ordering::Relaxed);
}

/// 记录 ID 空间耗尽次数。
pub fn record_id_space_exhausted() {
    metrics().id_space_exhausted.fetch_add(1, Ordering::Relaxed);
}

/// 记录 ID 迁移完成次数。
pub fn record_id_migration() {
    metrics().id_migrations.fetch_add(1, Ordering::Relaxed);
}

/// 记录设备判定离线次数。
pub fn record_device_offline() {
    metrics().devices_offline.fetch_add(1, Ordering::Relaxed);
}

/// 记录长期离线设备被移除次数。
pub fn record_device_evicted() {
    metrics().devices_evicted.fetch_add(1, Ordering::Relaxed);
}

/// 记录下行命令发送成功次数。
pub fn record_command_sent() {
    metrics().commands_sent.fetch_add(1, Ordering::Relaxed);
}

/// 记录下行命令发送失败次数。
pub fn record_command_send_failure() {
    metrics().command_send_failures.fetch_add(1, Ordering::Relaxed);
}

/// 记录设备快照写入成功次数。
pub fn record_snapshot_write() {
    metrics().snapshot_writes.fetch_add(1, Ordering::Relaxed);
}

/// 记录设备快照写入失败次数。
pub fn record_snapshot_write_failure() {
    metrics().snapshot_write_failures.fetch_add(1, Ordering::Relaxed);
}

/// 记录设备日志因队列满或写入失败被丢弃的条数。
pub fn record_log_entry_dropped() {
    metrics().log_entries_dropped.fetch_add(1, Ordering::Relaxed);
}

/// 记录发布的设备事件数。
pub fn record_event_published() {
    metrics().events_published.fetch_add(1, Ordering::Relaxed);
}
