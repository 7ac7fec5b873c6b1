//! 内存存储实现模块
//!
//! 用于测试和无持久化运行。
//!
//! 包含以下实现：
//! - DeviceSnapshotStore: InMemorySnapshotStore
//! - DeviceLogStore: InMemoryDeviceLogStore

pub mod device_log;
pub mod snapshot;

pub use device_log::*;
pub use snapshot::*;
