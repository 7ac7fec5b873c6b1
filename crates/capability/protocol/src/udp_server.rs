//! UDP 上行监听
//!
//! 绑定监听地址，逐个接收数据报并解析为上行帧，交给 [`FrameHandler`] 处理。
//! 数据报按到达顺序串行处理；非法帧记录告警后丢弃，不影响后续接收。
//!
//! ## 使用示例
//!
//! ```rust,ignore
//! let config = UdpServerConfig {
//!     listen_addr: "0.0.0.0:5439".to_string(),
//!     ..Default::default()
//! };
//! let listener = UdpFrameListener::bind(config).await?;
//! listener.run(handler, shutdown_rx).await?;
//! ```

use crate::error::ProtocolError;
use crate::frame::{Frame, to_hex};
use alarm_telemetry::{record_frame_received, record_frame_rejected};
use async_trait::async_trait;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// 接收出错后的退避时间
const RECV_ERROR_BACKOFF: Duration = Duration::from_secs(1);

/// 上行帧处理接口
#[async_trait]
pub trait FrameHandler: Send + Sync {
    async fn handle(&self, frame: Frame, source: SocketAddr) -> Result<(), ProtocolError>;
}

/// UDP 监听配置
#[derive(Debug, Clone)]
pub struct UdpServerConfig {
    /// 监听地址
    pub listen_addr: String,
    /// 单次接收超时（毫秒），超时后重新检查退出信号
    pub recv_timeout_ms: u64,
    /// 接收缓冲区大小（字节）
    pub buffer_size: usize,
}

fn default_listen_addr() -> String {
    "0.0.0.0:5439".to_string()
}

fn default_recv_timeout_ms() -> u64 {
    1000
}

fn default_buffer_size() -> usize {
    1024
}

impl Default for UdpServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            recv_timeout_ms: default_recv_timeout_ms(),
            buffer_size: default_buffer_size(),
        }
    }
}

/// UDP 上行帧监听器
pub struct UdpFrameListener {
    config: UdpServerConfig,
    socket: UdpSocket,
}

impl UdpFrameListener {
    /// 绑定监听地址
    pub async fn bind(config: UdpServerConfig) -> Result<Self, ProtocolError> {
        let socket = UdpSocket::bind(&config.listen_addr).await?;
        info!(
            target: "alarm.protocol",
            listen_addr = %config.listen_addr,
            "udp_listener_bound"
        );
        Ok(Self { config, socket })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ProtocolError> {
        Ok(self.socket.local_addr()?)
    }

    /// 运行接收循环，直到退出信号置为 true 或发送端被丢弃。
    pub async fn run(
        &self,
        handler: Arc<dyn FrameHandler>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<(), ProtocolError> {
        let recv_timeout = Duration::from_millis(self.config.recv_timeout_ms.max(1));
        let mut buf = vec![0u8; self.config.buffer_size.max(64)];

        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                result = tokio::time::timeout(recv_timeout, self.socket.recv_from(&mut buf)) => {
                    match result {
                        // 接收超时：回到循环顶部检查退出信号
                        Err(_) => continue,
                        Ok(Ok((len, peer))) => {
                            self.dispatch(&buf[..len], peer, handler.as_ref()).await;
                        }
                        Ok(Err(e)) => {
                            error!(
                                target: "alarm.protocol",
                                error = %e,
                                "udp_recv_failed"
                            );
                            tokio::time::sleep(RECV_ERROR_BACKOFF).await;
                        }
                    }
                }
            }
        }

        info!(target: "alarm.protocol", "udp_listener_stopped");
        Ok(())
    }

    async fn dispatch(&self, data: &[u8], peer: SocketAddr, handler: &dyn FrameHandler) {
        record_frame_received();
        debug!(
            target: "alarm.protocol",
            peer = %peer,
            data = %to_hex(data),
            "udp_datagram_received"
        );

        let frame = match Frame::decode(data) {
            Ok(frame) => frame,
            Err(err) => {
                record_frame_rejected();
                warn!(
                    target: "alarm.protocol",
                    peer = %peer,
                    data = %to_hex(data),
                    error = %err,
                    "frame_rejected"
                );
                return;
            }
        };

        if let Err(err) = handler.handle(frame, peer).await {
            warn!(
                target: "alarm.protocol",
                peer = %peer,
                device_id = frame.device_id,
                command = frame.command.name(),
                error = %err,
                "frame_handler_failed"
            );
        }
    }
}
