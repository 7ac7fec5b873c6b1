//! 协议错误类型定义

/// 帧解析错误（单帧丢弃，不影响监听循环）
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    /// 长度不是 6 字节
    #[error("invalid frame length: {0} bytes")]
    InvalidLength(usize),

    /// 帧头不是 0xAA
    #[error("invalid frame head: 0x{0:02x}")]
    InvalidHead(u8),

    /// 帧尾不是 0x55
    #[error("invalid frame tail: 0x{0:02x}")]
    InvalidTail(u8),

    /// 下行命令出现在上行方向
    #[error("downlink command 0x{0:02x} received as uplink")]
    DownlinkCommand(u8),
}

/// 协议通信错误
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// IO 错误
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// 超时错误
    #[error("timeout: {0}")]
    Timeout(String),
}
