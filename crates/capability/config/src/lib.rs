//! 中间件运行配置加载。
//!
//! 所有配置项均有默认值，环境变量仅用于覆盖；数值非法时启动失败。

use std::env;
use std::path::PathBuf;

/// 配置加载错误。
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {0}: {1}")]
    Invalid(String, String),
}

/// 中间件运行配置。
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub http_addr: String,
    pub udp_listen_addr: String,
    pub udp_command_port: u16,
    pub udp_broadcast_addr: String,
    pub udp_recv_timeout_ms: u64,
    pub udp_send_timeout_ms: u64,
    pub data_dir: PathBuf,
    pub max_devices: usize,
    pub offline_timeout_seconds: u64,
    pub offline_check_interval_seconds: u64,
    pub offline_retention_seconds: u64,
    pub eviction_interval_seconds: u64,
    pub conflict_grace_seconds: u64,
    pub id_reuse_after_seconds: u64,
    pub pending_timeout_seconds: u64,
    pub pending_sweep_interval_seconds: u64,
    pub online_timeout_seconds: u64,
    pub discovery_settle_ms: u64,
    pub discovery_response_wait_ms: u64,
    pub discovery_interval_seconds: u64,
    pub event_buffer: usize,
    pub sse_heartbeat_seconds: u64,
    pub device_log_max_entries: usize,
}

impl AppConfig {
    /// 从环境变量读取配置。
    pub fn from_env() -> Result<Self, ConfigError> {
        let http_addr = env::var("ALARM_HTTP_ADDR").unwrap_or_else(|_| "0.0.0.0:8081".to_string());
        let udp_listen_addr =
            env::var("ALARM_UDP_LISTEN_ADDR").unwrap_or_else(|_| "0.0.0.0:5439".to_string());
        let udp_command_port = read_u16_with_default("ALARM_UDP_COMMAND_PORT", 5439)?;
        let udp_broadcast_addr = env::var("ALARM_UDP_BROADCAST_ADDR")
            .unwrap_or_else(|_| "255.255.255.255".to_string());
        let udp_recv_timeout_ms = read_u64_with_default("ALARM_UDP_RECV_TIMEOUT_MS", 1000)?;
        let udp_send_timeout_ms = read_u64_with_default("ALARM_UDP_SEND_TIMEOUT_MS", 1000)?;
        let data_dir = read_optional("ALARM_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./data"));
        let max_devices = read_u64_with_default("ALARM_MAX_DEVICES", 254)? as usize;
        if max_devices == 0 || max_devices > 254 {
            return Err(ConfigError::Invalid(
                "ALARM_MAX_DEVICES".to_string(),
                max_devices.to_string(),
            ));
        }
        let offline_timeout_seconds = read_positive_u64("ALARM_OFFLINE_TIMEOUT_SECONDS", 180)?;
        let offline_check_interval_seconds =
            read_positive_u64("ALARM_OFFLINE_CHECK_INTERVAL_SECONDS", 30)?;
        // 巡检周期必须短于离线超时
        if offline_check_interval_seconds >= offline_timeout_seconds {
            return Err(ConfigError::Invalid(
                "ALARM_OFFLINE_CHECK_INTERVAL_SECONDS".to_string(),
                offline_check_interval_seconds.to_string(),
            ));
        }
        let offline_retention_seconds =
            read_positive_u64("ALARM_OFFLINE_RETENTION_SECONDS", 7 * 24 * 3600)?;
        let eviction_interval_seconds = read_positive_u64("ALARM_EVICTION_INTERVAL_SECONDS", 300)?;
        let conflict_grace_seconds = read_u64_with_default("ALARM_CONFLICT_GRACE_SECONDS", 300)?;
        let id_reuse_after_seconds = read_u64_with_default("ALARM_ID_REUSE_AFTER_SECONDS", 3600)?;
        let pending_timeout_seconds = read_positive_u64("ALARM_PENDING_TIMEOUT_SECONDS", 300)?;
        let pending_sweep_interval_seconds =
            read_positive_u64("ALARM_PENDING_SWEEP_INTERVAL_SECONDS", 60)?;
        let online_timeout_seconds = read_positive_u64("ALARM_ONLINE_TIMEOUT_SECONDS", 300)?;
        let discovery_settle_ms = read_u64_with_default("ALARM_DISCOVERY_SETTLE_MS", 2000)?;
        let discovery_response_wait_ms =
            read_u64_with_default("ALARM_DISCOVERY_RESPONSE_WAIT_MS", 5000)?;
        let discovery_interval_seconds =
            read_positive_u64("ALARM_DISCOVERY_INTERVAL_SECONDS", 300)?;
        let event_buffer = read_positive_u64("ALARM_EVENT_BUFFER", 256)? as usize;
        let sse_heartbeat_seconds = read_positive_u64("ALARM_SSE_HEARTBEAT_SECONDS", 10)?;
        let device_log_max_entries =
            read_positive_u64("ALARM_DEVICE_LOG_MAX_ENTRIES", 1000)? as usize;

        Ok(Self {
            http_addr,
            udp_listen_addr,
            udp_command_port,
            udp_broadcast_addr,
            udp_recv_timeout_ms,
            udp_send_timeout_ms,
            data_dir,
            max_devices,
            offline_timeout_seconds,
            offline_check_interval_seconds,
            offline_retention_seconds,
            eviction_interval_seconds,
            conflict_grace_seconds,
            id_reuse_after_seconds,
            pending_timeout_seconds,
            pending_sweep_interval_seconds,
            online_timeout_seconds,
            discovery_settle_ms,
            discovery_response_wait_ms,
            discovery_interval_seconds,
            event_buffer,
            sse_heartbeat_seconds,
            device_log_max_entries,
        })
    }

    /// 设备快照文件路径。
    pub fn snapshot_path(&self) -> PathBuf {
        self.data_dir.join("device_cache.json")
    }

    /// 设备日志目录。
    pub fn device_log_dir(&self) -> PathBuf {
        self.data_dir.join("device_logs")
    }
}

fn read_u16_with_default(key: &str, default: u16) -> Result<u16, ConfigError> {
    let value = match env::var(key) {
        Ok(value) => value,
        Err(_) => return Ok(default),
    };
    value
        .parse::<u16>()
        .map_err(|_| ConfigError::Invalid(key.to_string(), value))
}

fn read_u64_with_default(key: &str, default: u64) -> Result<u64, ConfigError> {
    let value = match env::var(key) {
        Ok(value) => value,
        Err(_) => return Ok(default),
    };
    value
        .parse::<u64>()
        .map_err(|_| ConfigError::Invalid(key.to_string(), value))
}

/// 读取必须大于 0 的 u64（用作定时周期、超时时长）。
fn read_positive_u64(key: &str, default: u64) -> Result<u64, ConfigError> {
    let value = read_u64_with_default(key, default)?;
    if value == 0 {
        return Err(ConfigError::Invalid(key.to_string(), value.to_string()));
    }
    Ok(value)
}

fn read_optional(key: &str) -> Option<String> {
    match env::var(key) {
        Ok(value) if !value.is_empty() => Some(value),
        _ => None,
    }
}
