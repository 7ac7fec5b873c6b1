//! # 协议通信能力模块
//!
//! 报警设备使用 UDP 广播承载的 6 字节定长帧：
//!
//! ```text
//! +------+-----+----+--------+-----------+------+
//! | 0xAA | CMD | ID | STATUS | WIFI_RSSI | 0x55 |
//! +------+-----+----+--------+-----------+------+
//! ```
//!
//! - **上行**（设备 → 服务器）：上线 0x00、报警 0x01、恢复 0x02、心跳 0x03
//! - **下行**（服务器 → 设备）：修改 ID 0x04（STATUS 字段携带新 ID）、立即上报 0x05
//!
//! ## 架构设计
//!
//! ```text
//! UdpFrameListener ──decode──▶ FrameHandler（registry / control）
//!
//! resolver / discovery ──encode──▶ UdpCommandClient ──▶ 设备
//! ```

mod error;
mod frame;
mod udp_client;
mod udp_server;

pub use error::{FrameError, ProtocolError};
pub use frame::{Command, FRAME_HEAD, FRAME_LEN, FRAME_TAIL, Frame, to_hex};
pub use udp_client::{UdpClientConfig, UdpCommandClient};
pub use udp_server::{FrameHandler, UdpFrameListener, UdpServerConfig};
