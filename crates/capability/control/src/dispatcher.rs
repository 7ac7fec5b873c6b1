//! 命令发送

use alarm_protocol::{Frame, ProtocolError, UdpClientConfig, UdpCommandClient};
use alarm_telemetry::{record_command_send_failure, record_command_sent};
use async_trait::async_trait;
use std::net::IpAddr;
use tracing::warn;

#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    #[error("dispatch error: {0}")]
    Dispatch(String),
    #[error("dispatch timeout: {0}")]
    Timeout(String),
}

impl From<ProtocolError> for ControlError {
    fn from(err: ProtocolError) -> Self {
        match err {
            ProtocolError::Timeout(detail) => Self::Timeout(detail),
            other => Self::Dispatch(other.to_string()),
        }
    }
}

/// 下行命令发送出口
#[async_trait]
pub trait CommandDispatcher: Send + Sync {
    async fn send(&self, frame: &Frame, target: IpAddr) -> Result<(), ControlError>;
}

/// 丢弃所有命令（未接入设备网络时使用）
pub struct NoopDispatcher;

#[async_trait]
impl CommandDispatcher for NoopDispatcher {
    async fn send(&self, _frame: &Frame, _target: IpAddr) -> Result<(), ControlError> {
        Ok(())
    }
}

/// 基于共享 UDP 套接字的命令发送
pub struct UdpDispatcher {
    client: UdpCommandClient,
}

impl UdpDispatcher {
    pub fn new(client: UdpCommandClient) -> Self {
        Self { client }
    }

    pub async fn bind(config: UdpClientConfig) -> Result<Self, ControlError> {
        let client = UdpCommandClient::bind(config).await?;
        Ok(Self::new(client))
    }
}

#[async_trait]
impl CommandDispatcher for UdpDispatcher {
    async fn send(&self, frame: &Frame, target: IpAddr) -> Result<(), ControlError> {
        match self.client.send_frame(frame, target).await {
            Ok(()) => {
                record_command_sent();
                Ok(())
            }
            Err(err) => {
                record_command_send_failure();
                warn!(
                    target: "alarm.control",
                    target_ip = %target,
                    command = frame.command.name(),
                    device_id = frame.device_id,
                    error = %err,
                    "command_send_failed"
                );
                Err(err.into())
            }
        }
    }
}
