//! 设备记录与 ID 修改协商记录。

use serde::{Deserialize, Serialize};
use std::net::IpAddr;

/// 服务器自身 ID（上行帧携带该 ID 时忽略）。
pub const SERVER_ID: u8 = 0x00;
/// 广播 ID（仅作为下行目标，不会出现在注册表中）。
pub const BROADCAST_ID: u8 = 0xFF;
/// 可分配设备 ID 下限。
pub const MIN_DEVICE_ID: u8 = 1;
/// 可分配设备 ID 上限。
pub const MAX_DEVICE_ID: u8 = 254;

/// 是否为可存入注册表的设备 ID（1-254）。
pub fn is_assignable_id(id: u8) -> bool {
    (MIN_DEVICE_ID..=MAX_DEVICE_ID).contains(&id)
}

/// 设备状态（由最近一次上行命令决定，与离线标记相互独立）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceStatus {
    Online,
    Alarm,
    Recover,
    Heartbeat,
    #[default]
    Unknown,
}

impl DeviceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::Alarm => "alarm",
            Self::Recover => "recover",
            Self::Heartbeat => "heartbeat",
            Self::Unknown => "unknown",
        }
    }
}

/// 设备记录。
///
/// 每个在用 ID 对应唯一一条记录。离线标记由 `offline_since_ms` 唯一决定：
/// 有值即离线，无值即在线。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRecord {
    /// 设备 ID（1-254）
    pub id: u8,
    /// 首次出现时间（毫秒），创建后不再变化
    pub first_seen_ms: i64,
    /// 最近一次收到有效帧的时间（毫秒），单调不减
    pub last_seen_ms: i64,
    /// 最近一次上行命令对应的状态
    #[serde(default)]
    pub status: DeviceStatus,
    /// 进入离线状态的时间（毫秒）
    #[serde(default)]
    pub offline_since_ms: Option<i64>,
    /// 最近上报的 WiFi 信号强度
    #[serde(default)]
    pub wifi_rssi: u8,
    /// 最近一次上行帧的来源地址
    pub source_ip: IpAddr,
    #[serde(default)]
    pub alarm_count: u64,
    #[serde(default)]
    pub recover_count: u64,
    #[serde(default)]
    pub heartbeat_count: u64,
}

impl DeviceRecord {
    /// 创建新记录（状态 unknown，计数清零，在线）。
    pub fn new(id: u8, source_ip: IpAddr, now_ms: i64) -> Self {
        Self {
            id,
            first_seen_ms: now_ms,
            last_seen_ms: now_ms,
            status: DeviceStatus::Unknown,
            offline_since_ms: None,
            wifi_rssi: 0,
            source_ip,
            alarm_count: 0,
            recover_count: 0,
            heartbeat_count: 0,
        }
    }

    pub fn is_offline(&self) -> bool {
        self.offline_since_ms.is_some()
    }

    /// 已离线时长（毫秒），在线时为 None。
    pub fn offline_for_ms(&self, now_ms: i64) -> Option<i64> {
        self.offline_since_ms.map(|since| now_ms.saturating_sub(since))
    }

    /// 是否已离线超过给定时长（严格大于）。
    pub fn offline_longer_than(&self, threshold_ms: i64, now_ms: i64) -> bool {
        self.offline_for_ms(now_ms)
            .is_some_and(|elapsed| elapsed > threshold_ms)
    }

    /// 距最近一次有效帧的时长（毫秒）。
    pub fn silent_for_ms(&self, now_ms: i64) -> i64 {
        now_ms.saturating_sub(self.last_seen_ms)
    }

    /// 更新最近出现时间，保证单调不减。
    pub fn touch(&mut self, now_ms: i64) {
        if now_ms > self.last_seen_ms {
            self.last_seen_ms = now_ms;
        }
    }

    pub fn mark_offline(&mut self, now_ms: i64) {
        self.offline_since_ms = Some(now_ms);
    }

    /// 清除离线标记，返回此前是否离线。
    pub fn mark_online(&mut self) -> bool {
        self.offline_since_ms.take().is_some()
    }
}

/// 进行中的 ID 修改协商。
///
/// 以来源地址为键：设备应用新 ID 前后只有来源地址是稳定的。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PendingReassignment {
    pub source_ip: IpAddr,
    pub old_id: u8,
    pub new_id: u8,
    pub registered_at_ms: i64,
}

impl PendingReassignment {
    pub fn is_expired(&self, timeout_ms: i64, now_ms: i64) -> bool {
        now_ms.saturating_sub(self.registered_at_ms) > timeout_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn ip() -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(192, 168, 0, 10))
    }

    #[test]
    fn reserved_ids_are_not_assignable() {
        assert!(!is_assignable_id(SERVER_ID));
        assert!(!is_assignable_id(BROADCAST_ID));
        assert!(is_assignable_id(1));
        assert!(is_assignable_id(254));
    }

    #[test]
    fn touch_never_moves_backwards() {
        let mut record = DeviceRecord::new(7, ip(), 10_000);
        record.touch(5_000);
        assert_eq!(record.last_seen_ms, 10_000);
        record.touch(12_000);
        assert_eq!(record.last_seen_ms, 12_000);
        assert_eq!(record.first_seen_ms, 10_000);
    }

    #[test]
    fn offline_flag_follows_offline_since() {
        let mut record = DeviceRecord::new(7, ip(), 0);
        assert!(!record.is_offline());
        record.mark_offline(1_000);
        assert!(record.is_offline());
        assert!(record.offline_longer_than(500, 2_000));
        assert!(!record.offline_longer_than(1_000, 2_000));
        assert!(record.mark_online());
        assert!(!record.is_offline());
        assert!(!record.mark_online());
    }

    #[test]
    fn pending_expiry_is_strict() {
        let pending = PendingReassignment {
            source_ip: ip(),
            old_id: 7,
            new_id: 8,
            registered_at_ms: 0,
        };
        assert!(!pending.is_expired(300_000, 300_000));
        assert!(pending.is_expired(300_000, 300_001));
    }
}
