//! # 设备注册表能力模块
//!
//! 设备状态的唯一权威来源，所有状态迁移都经由 [`DeviceRegistry`] 在同一把锁内完成。
//!
//! ## 模块说明
//!
//! - [`registry`]：注册表本体（上行更新、迁移消费、冲突检测、ID 分配、离线标记与移除）
//! - [`events`]：事件出口（[`EventSink`]）及其 broadcast 实现
//! - [`supervisor`]：离线巡检（离线判定 + 长期离线移除，两个独立周期）
//!
//! ## 并发约束
//!
//! - 锁内只做内存操作；事件与日志先缓存，释放锁后再投递
//! - 每次修改递增修订号（`watch` 通道），持久化任务据此写快照

pub mod events;
pub mod registry;
pub mod supervisor;

pub use events::{BroadcastEventSink, EventSink, NoopEventSink};
pub use registry::{
    AllocationError, DeviceRegistry, DeviceReport, IgnoreReason, ReassignError, RegistryPolicy,
    Reservation, UpdateOutcome,
};
pub use supervisor::{OfflineSupervisor, SupervisorConfig};
