use alarm_config::AppConfig;
use std::path::PathBuf;

// 环境变量是进程级状态，所有断言放在同一个测试里顺序执行。
#[test]
fn load_config_from_env() {
    let config = AppConfig::from_env().expect("defaults");
    assert_eq!(config.udp_command_port, 5439);
    assert_eq!(config.offline_timeout_seconds, 180);
    assert_eq!(config.pending_timeout_seconds, 300);
    assert_eq!(config.max_devices, 254);

    // Rust 2024 中 set_var 需要显式标注 unsafe（测试进程内可控）。
    unsafe {
        std::env::set_var("ALARM_HTTP_ADDR", "127.0.0.1:18081");
        std::env::set_var("ALARM_DATA_DIR", "/tmp/alarm-data");
        std::env::set_var("ALARM_OFFLINE_TIMEOUT_SECONDS", "60");
        std::env::set_var("ALARM_MAX_DEVICES", "100");
    }
    let config = AppConfig::from_env().expect("config");
    assert_eq!(config.http_addr, "127.0.0.1:18081");
    assert_eq!(config.offline_timeout_seconds, 60);
    assert_eq!(config.max_devices, 100);
    assert_eq!(
        config.snapshot_path(),
        PathBuf::from("/tmp/alarm-data/device_cache.json")
    );
    assert_eq!(
        config.device_log_dir(),
        PathBuf::from("/tmp/alarm-data/device_logs")
    );

    unsafe {
        std::env::set_var("ALARM_OFFLINE_TIMEOUT_SECONDS", "abc");
    }
    assert!(AppConfig::from_env().is_err());

    unsafe {
        std::env::set_var("ALARM_OFFLINE_TIMEOUT_SECONDS", "60");
        std::env::set_var("ALARM_MAX_DEVICES", "300");
    }
    assert!(AppConfig::from_env().is_err());

    unsafe {
        std::env::set_var("ALARM_MAX_DEVICES", "100");
        std::env::set_var("ALARM_DISCOVERY_INTERVAL_SECONDS", "0");
    }
    assert!(AppConfig::from_env().is_err());

    // 巡检周期不短于离线超时时拒绝启动
    unsafe {
        std::env::remove_var("ALARM_DISCOVERY_INTERVAL_SECONDS");
        std::env::set_var("ALARM_OFFLINE_CHECK_INTERVAL_SECONDS", "60");
    }
    assert!(AppConfig::from_env().is_err());
    unsafe {
        std::env::set_var("ALARM_OFFLINE_CHECK_INTERVAL_SECONDS", "59");
    }
    assert_eq!(
        AppConfig::from_env()
            .expect("interval below timeout")
            .offline_check_interval_seconds,
        59
    );

    unsafe {
        std::env::remove_var("ALARM_OFFLINE_CHECK_INTERVAL_SECONDS");
        std::env::remove_var("ALARM_HTTP_ADDR");
        std::env::remove_var("ALARM_DATA_DIR");
        std::env::remove_var("ALARM_OFFLINE_TIMEOUT_SECONDS");
        std::env::remove_var("ALARM_MAX_DEVICES");
    }
}
