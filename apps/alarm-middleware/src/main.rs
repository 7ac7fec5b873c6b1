//! 报警设备中间件
//!
//! 启动顺序：配置 → 日志 → 快照恢复 → 后台任务（UDP 接收、快照写入、日志写入、
//! 离线巡检、协商超时清理、设备发现）→ HTTP/SSE。
//! Ctrl-C 后先停止 HTTP，再广播停止信号并等待后台任务结束（快照会再写一次）。

mod handlers;
mod middleware;
mod routes;
mod utils;

use alarm_config::AppConfig;
use alarm_control::{
    ConflictResolver, DiscoveryBroadcaster, DiscoveryConfig, FrameProcessor, UdpDispatcher,
};
use alarm_protocol::{UdpClientConfig, UdpFrameListener, UdpServerConfig};
use alarm_registry::{
    BroadcastEventSink, DeviceRegistry, OfflineSupervisor, RegistryPolicy, SupervisorConfig,
};
use alarm_storage::{
    DeviceLogStore, DeviceLogWriter, DeviceSnapshotStore, JsonFileDeviceLogStore,
    JsonFileSnapshotStore, SnapshotWriter,
};
use alarm_telemetry::init_tracing;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn};

/// HTTP 层共享状态
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<DeviceRegistry>,
    pub resolver: Arc<ConflictResolver>,
    pub discovery: Arc<DiscoveryBroadcaster>,
    pub device_logs: Arc<dyn DeviceLogStore>,
    pub events: Arc<BroadcastEventSink>,
    pub shutdown: watch::Receiver<bool>,
    /// 修改 ID 时判定设备在线的窗口
    pub online_timeout_ms: i64,
    pub sse_heartbeat: Duration,
}

/// 日志写入队列容量
const DEVICE_LOG_QUEUE: usize = 1024;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 加载本地 .env（如存在），便于直接 cargo run 启动
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;
    init_tracing();

    let broadcast_addr: IpAddr = config.udp_broadcast_addr.parse().map_err(|_| {
        alarm_config::ConfigError::Invalid(
            "ALARM_UDP_BROADCAST_ADDR".to_string(),
            config.udp_broadcast_addr.clone(),
        )
    })?;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut tasks = Vec::new();

    // 持久化：设备日志写入在注册表之前创建，注册表只持有非阻塞的追加端
    let device_logs: Arc<dyn DeviceLogStore> = Arc::new(JsonFileDeviceLogStore::with_max_entries(
        config.device_log_dir(),
        config.device_log_max_entries,
    ));
    let (log_writer, log_task) =
        DeviceLogWriter::spawn(device_logs.clone(), DEVICE_LOG_QUEUE, shutdown_rx.clone());
    tasks.push(log_task);

    let events = Arc::new(BroadcastEventSink::new(config.event_buffer));
    let policy = RegistryPolicy {
        max_devices: config.max_devices,
        conflict_grace_ms: seconds_to_ms(config.conflict_grace_seconds),
        reuse_after_ms: seconds_to_ms(config.id_reuse_after_seconds),
    };
    let registry = Arc::new(
        DeviceRegistry::new(policy)
            .with_event_sink(events.clone())
            .with_log_appender(Arc::new(log_writer)),
    );

    // 快照恢复失败不阻止启动，以空注册表运行
    let snapshots: Arc<dyn DeviceSnapshotStore> =
        Arc::new(JsonFileSnapshotStore::new(config.snapshot_path()));
    match snapshots.load_all().await {
        Ok(devices) => {
            registry.restore(devices);
        }
        Err(err) => error!(
            target: "alarm.storage",
            path = %config.snapshot_path().display(),
            error = %err,
            "snapshot_load_failed"
        ),
    }
    tasks.push(SnapshotWriter::spawn(
        snapshots,
        registry.clone(),
        registry.subscribe_changes(),
        shutdown_rx.clone(),
    ));

    let dispatcher = Arc::new(
        UdpDispatcher::bind(UdpClientConfig {
            bind_addr: "0.0.0.0:0".to_string(),
            command_port: config.udp_command_port,
            send_timeout_ms: config.udp_send_timeout_ms,
        })
        .await?,
    );
    let resolver = Arc::new(ConflictResolver::new(registry.clone(), dispatcher.clone()));
    tasks.push(resolver.clone().spawn_expiry(
        Duration::from_secs(config.pending_sweep_interval_seconds),
        seconds_to_ms(config.pending_timeout_seconds),
        shutdown_rx.clone(),
    ));

    let supervisor = OfflineSupervisor::new(
        registry.clone(),
        SupervisorConfig {
            offline_timeout_ms: seconds_to_ms(config.offline_timeout_seconds),
            check_interval: Duration::from_secs(config.offline_check_interval_seconds),
            retention_ms: seconds_to_ms(config.offline_retention_seconds),
            eviction_interval: Duration::from_secs(config.eviction_interval_seconds),
        },
    );
    tasks.push(supervisor.spawn(shutdown_rx.clone()));

    let listener = UdpFrameListener::bind(UdpServerConfig {
        listen_addr: config.udp_listen_addr.clone(),
        recv_timeout_ms: config.udp_recv_timeout_ms,
        ..UdpServerConfig::default()
    })
    .await?;
    let processor = Arc::new(FrameProcessor::new(registry.clone(), resolver.clone()));
    let udp_shutdown = shutdown_rx.clone();
    tasks.push(tokio::spawn(async move {
        if let Err(err) = listener.run(processor, udp_shutdown).await {
            error!(target: "alarm.protocol", error = %err, "udp_listener_failed");
        }
    }));

    let discovery = Arc::new(DiscoveryBroadcaster::new(
        registry.clone(),
        dispatcher,
        DiscoveryConfig {
            broadcast_addr,
            settle_delay: Duration::from_millis(config.discovery_settle_ms),
            response_wait: Duration::from_millis(config.discovery_response_wait_ms),
            interval: Duration::from_secs(config.discovery_interval_seconds),
        },
    ));
    tasks.push(discovery.clone().spawn_startup(shutdown_rx.clone()));
    tasks.push(discovery.clone().spawn_periodic(shutdown_rx.clone()));

    let state = AppState {
        registry,
        resolver,
        discovery,
        device_logs,
        events,
        shutdown: shutdown_rx,
        online_timeout_ms: seconds_to_ms(config.online_timeout_seconds),
        sse_heartbeat: Duration::from_secs(config.sse_heartbeat_seconds.max(1)),
    };
    let app = routes::create_app(state);

    let http = tokio::net::TcpListener::bind(&config.http_addr).await?;
    info!(target: "alarm.api", http_addr = %config.http_addr, "http_server_started");
    let http_shutdown = shutdown_tx.clone();
    axum::serve(http, app)
        .with_graceful_shutdown(async move {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!(target: "alarm.api", error = %err, "ctrl_c_listen_failed");
            }
            info!(target: "alarm.api", "shutdown_requested");
            // SSE 连接同样监听该信号，否则优雅退出会一直等待长连接
            let _ = http_shutdown.send(true);
        })
        .await?;

    let _ = shutdown_tx.send(true);
    for task in tasks {
        if let Err(err) = task.await {
            warn!(target: "alarm.api", error = %err, "background_task_join_failed");
        }
    }
    info!(target: "alarm.api", "shutdown_complete");
    Ok(())
}

fn seconds_to_ms(seconds: u64) -> i64 {
    i64::try_from(seconds.saturating_mul(1000)).unwrap_or(i64::MAX)
}
