//! 定长帧编解码

use crate::error::FrameError;

/// 帧头
pub const FRAME_HEAD: u8 = 0xAA;
/// 帧尾
pub const FRAME_TAIL: u8 = 0x55;
/// 帧长度（字节）
pub const FRAME_LEN: usize = 6;

/// 帧命令字
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    /// 上线 (0x00)
    Online,
    /// 报警 (0x01)
    Alarm,
    /// 恢复 (0x02)
    Recover,
    /// 心跳 (0x03)
    Heartbeat,
    /// 修改设备 ID (0x04，仅下行)
    ModifyId,
    /// 立即上报 (0x05，仅下行)
    ImmediateReport,
    /// 协议表外的命令字
    Other(u8),
}

impl Command {
    pub fn from_u8(code: u8) -> Self {
        match code {
            0x00 => Self::Online,
            0x01 => Self::Alarm,
            0x02 => Self::Recover,
            0x03 => Self::Heartbeat,
            0x04 => Self::ModifyId,
            0x05 => Self::ImmediateReport,
            other => Self::Other(other),
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            Self::Online => 0x00,
            Self::Alarm => 0x01,
            Self::Recover => 0x02,
            Self::Heartbeat => 0x03,
            Self::ModifyId => 0x04,
            Self::ImmediateReport => 0x05,
            Self::Other(code) => *code,
        }
    }

    /// 是否为仅下行命令
    pub fn is_downlink(&self) -> bool {
        matches!(self, Self::ModifyId | Self::ImmediateReport)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::Alarm => "alarm",
            Self::Recover => "recover",
            Self::Heartbeat => "heartbeat",
            Self::ModifyId => "modify_id",
            Self::ImmediateReport => "immediate_report",
            Self::Other(_) => "unknown",
        }
    }
}

impl From<u8> for Command {
    fn from(code: u8) -> Self {
        Self::from_u8(code)
    }
}

/// 协议帧（帧头帧尾固定，不在结构中保存）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    pub command: Command,
    pub device_id: u8,
    /// 命令相关载荷：设备状态，或修改 ID 命令中的新 ID
    pub status: u8,
    pub wifi_rssi: u8,
}

impl Frame {
    pub fn new(command: Command, device_id: u8, status: u8, wifi_rssi: u8) -> Self {
        Self {
            command,
            device_id,
            status,
            wifi_rssi,
        }
    }

    /// 修改 ID 命令：`AA 04 <当前ID> <新ID> 00 55`
    pub fn modify_id(current_id: u8, new_id: u8) -> Self {
        Self::new(Command::ModifyId, current_id, new_id, 0x00)
    }

    /// 立即上报命令：`AA 05 <ID> 00 00 55`
    pub fn immediate_report(device_id: u8) -> Self {
        Self::new(Command::ImmediateReport, device_id, 0x00, 0x00)
    }

    /// 只校验长度与帧头帧尾，不区分方向。
    pub fn parse(bytes: &[u8]) -> Result<Self, FrameError> {
        if bytes.len() != FRAME_LEN {
            return Err(FrameError::InvalidLength(bytes.len()));
        }
        if bytes[0] != FRAME_HEAD {
            return Err(FrameError::InvalidHead(bytes[0]));
        }
        if bytes[5] != FRAME_TAIL {
            return Err(FrameError::InvalidTail(bytes[5]));
        }
        Ok(Self {
            command: Command::from_u8(bytes[1]),
            device_id: bytes[2],
            status: bytes[3],
            wifi_rssi: bytes[4],
        })
    }

    /// 解析上行帧：在 [`Frame::parse`] 基础上拒绝下行命令。
    pub fn decode(bytes: &[u8]) -> Result<Self, FrameError> {
        let frame = Self::parse(bytes)?;
        if frame.command.is_downlink() {
            return Err(FrameError::DownlinkCommand(frame.command.as_u8()));
        }
        Ok(frame)
    }

    pub fn encode(&self) -> [u8; FRAME_LEN] {
        [
            FRAME_HEAD,
            self.command.as_u8(),
            self.device_id,
            self.status,
            self.wifi_rssi,
            FRAME_TAIL,
        ]
    }
}

/// 字节序列转十六进制字符串（日志用）
pub fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_online_frame() {
        let frame = Frame::decode(&[0xAA, 0x00, 0x07, 0x00, 0xC8, 0x55]).unwrap();
        assert_eq!(frame.command, Command::Online);
        assert_eq!(frame.device_id, 7);
        assert_eq!(frame.status, 0);
        assert_eq!(frame.wifi_rssi, 0xC8);
    }

    #[test]
    fn uplink_frames_survive_encode_decode() {
        for code in (0u8..=255).filter(|code| *code != 0x04 && *code != 0x05) {
            let frame = Frame::new(Command::from_u8(code), 0x2A, 0x01, 0xB0);
            assert_eq!(Frame::decode(&frame.encode()), Ok(frame));
        }
    }

    #[test]
    fn rejects_wrong_length() {
        assert_eq!(Frame::decode(&[]), Err(FrameError::InvalidLength(0)));
        assert_eq!(
            Frame::decode(&[0xAA, 0x00, 0x07, 0x00, 0x55]),
            Err(FrameError::InvalidLength(5))
        );
        assert_eq!(
            Frame::decode(&[0xAA, 0x00, 0x07, 0x00, 0xC8, 0x55, 0x00]),
            Err(FrameError::InvalidLength(7))
        );
    }

    #[test]
    fn rejects_bad_head_and_tail() {
        assert_eq!(
            Frame::decode(&[0xAB, 0x00, 0x07, 0x00, 0xC8, 0x55]),
            Err(FrameError::InvalidHead(0xAB))
        );
        assert_eq!(
            Frame::decode(&[0xAA, 0x00, 0x07, 0x00, 0xC8, 0x56]),
            Err(FrameError::InvalidTail(0x56))
        );
    }

    #[test]
    fn rejects_downlink_commands_inbound() {
        assert_eq!(
            Frame::decode(&[0xAA, 0x04, 0x07, 0x08, 0x00, 0x55]),
            Err(FrameError::DownlinkCommand(0x04))
        );
        assert_eq!(
            Frame::decode(&[0xAA, 0x05, 0xFF, 0x00, 0x00, 0x55]),
            Err(FrameError::DownlinkCommand(0x05))
        );
        // parse 不区分方向
        assert_eq!(
            Frame::parse(&[0xAA, 0x04, 0x07, 0x08, 0x00, 0x55]).unwrap(),
            Frame::modify_id(7, 8)
        );
    }

    #[test]
    fn downlink_constructors_match_wire_layout() {
        assert_eq!(
            Frame::modify_id(7, 8).encode(),
            [0xAA, 0x04, 0x07, 0x08, 0x00, 0x55]
        );
        assert_eq!(
            Frame::immediate_report(0xFF).encode(),
            [0xAA, 0x05, 0xFF, 0x00, 0x00, 0x55]
        );
        assert_eq!(to_hex(&Frame::modify_id(7, 8).encode()), "aa0407080055");
    }
}
