//! # 下行控制能力模块
//!
//! 负责所有“服务器主动发往设备”的行为，以及把上行帧交给注册表。
//!
//! ## 模块说明
//!
//! - [`dispatcher`]：命令发送抽象（[`CommandDispatcher`]）与 UDP 实现
//! - [`resolver`]：ID 冲突协商与人工修改 ID
//! - [`discovery`]：启动/周期性设备发现、立即上报
//! - [`inbound`]：上行帧处理（[`FrameProcessor`]，接入 UDP 监听）
//!
//! ## 失败语义
//!
//! 下行命令只发送一次，不做同步重试；冲突设备会按自身节奏重新上报原 ID，
//! 再次触发协商。

pub mod discovery;
pub mod dispatcher;
pub mod inbound;
pub mod resolver;

pub use discovery::{DiscoveryBroadcaster, DiscoveryConfig, DiscoveryReport};
pub use dispatcher::{CommandDispatcher, ControlError, NoopDispatcher, UdpDispatcher};
pub use inbound::{FrameProcessor, Processed};
pub use resolver::{ConflictResolver, ResolveError};
