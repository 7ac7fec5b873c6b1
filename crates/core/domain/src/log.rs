//! 单设备日志条目。

use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::str::FromStr;

/// 日志类型。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceLogKind {
    Online,
    Offline,
    Alarm,
    Recover,
    Heartbeat,
    Unknown,
    Conflict,
    IdChange,
    Evicted,
}

impl DeviceLogKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::Offline => "offline",
            Self::Alarm => "alarm",
            Self::Recover => "recover",
            Self::Heartbeat => "heartbeat",
            Self::Unknown => "unknown",
            Self::Conflict => "conflict",
            Self::IdChange => "id_change",
            Self::Evicted => "evicted",
        }
    }
}

impl FromStr for DeviceLogKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "online" => Ok(Self::Online),
            "offline" => Ok(Self::Offline),
            "alarm" => Ok(Self::Alarm),
            "recover" => Ok(Self::Recover),
            "heartbeat" => Ok(Self::Heartbeat),
            "unknown" => Ok(Self::Unknown),
            "conflict" => Ok(Self::Conflict),
            "id_change" => Ok(Self::IdChange),
            "evicted" => Ok(Self::Evicted),
            other => Err(format!("unknown log type: {}", other)),
        }
    }
}

/// 设备日志条目。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceLogEntry {
    pub device_id: u8,
    pub timestamp_ms: i64,
    #[serde(rename = "type")]
    pub kind: DeviceLogKind,
    pub message: String,
    pub wifi_rssi: u8,
    pub source_ip: IpAddr,
}

impl DeviceLogEntry {
    pub fn new(
        device_id: u8,
        timestamp_ms: i64,
        kind: DeviceLogKind,
        message: impl Into<String>,
        wifi_rssi: u8,
        source_ip: IpAddr,
    ) -> Self {
        Self {
            device_id,
            timestamp_ms,
            kind,
            message: message.into(),
            wifi_rssi,
            source_ip,
        }
    }
}
