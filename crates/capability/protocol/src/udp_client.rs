//! UDP 下行发送
//!
//! 下行命令（修改 ID、立即上报）以单个数据报发往设备地址的命令端口。
//! 套接字开启广播，目标可以是单播地址，也可以是 255.255.255.255。
//!
//! ## 使用示例
//!
//! ```rust,ignore
//! let client = UdpCommandClient::bind(UdpClientConfig::default()).await?;
//! client.send_frame(&Frame::modify_id(7, 8), "192.168.0.11".parse()?).await?;
//! ```

use crate::error::ProtocolError;
use crate::frame::{Frame, to_hex};
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use tokio::net::UdpSocket;
use tracing::info;

/// UDP 下行配置
#[derive(Debug, Clone)]
pub struct UdpClientConfig {
    /// 本地绑定地址（端口 0 表示由系统分配）
    pub bind_addr: String,
    /// 设备命令端口
    pub command_port: u16,
    /// 发送超时（毫秒）
    pub send_timeout_ms: u64,
}

fn default_bind_addr() -> String {
    "0.0.0.0:0".to_string()
}

fn default_command_port() -> u16 {
    5439
}

fn default_send_timeout_ms() -> u64 {
    1000
}

impl Default for UdpClientConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            command_port: default_command_port(),
            send_timeout_ms: default_send_timeout_ms(),
        }
    }
}

/// UDP 下行命令客户端
pub struct UdpCommandClient {
    socket: UdpSocket,
    command_port: u16,
    send_timeout: Duration,
}

impl UdpCommandClient {
    pub async fn bind(config: UdpClientConfig) -> Result<Self, ProtocolError> {
        let socket = UdpSocket::bind(&config.bind_addr).await?;
        socket.set_broadcast(true)?;
        info!(
            target: "alarm.protocol",
            bind_addr = %config.bind_addr,
            command_port = config.command_port,
            "udp_command_client_bound"
        );
        Ok(Self {
            socket,
            command_port: config.command_port,
            send_timeout: Duration::from_millis(config.send_timeout_ms.max(1)),
        })
    }

    pub fn command_port(&self) -> u16 {
        self.command_port
    }

    /// 发送单个帧到 `target:command_port`。
    pub async fn send_frame(&self, frame: &Frame, target: IpAddr) -> Result<(), ProtocolError> {
        let bytes = frame.encode();
        let dest = SocketAddr::new(target, self.command_port);
        let sent = tokio::time::timeout(self.send_timeout, self.socket.send_to(&bytes, dest))
            .await
            .map_err(|_| ProtocolError::Timeout(format!("send to {}", dest)))??;
        info!(
            target: "alarm.protocol",
            dest = %dest,
            command = frame.command.name(),
            device_id = frame.device_id,
            data = %to_hex(&bytes),
            bytes = sent,
            "udp_frame_sent"
        );
        Ok(())
    }
}
