//! # 持久化能力模块
//!
//! 注册表之外的两类持久化数据：
//!
//! 1. **设备快照** (`snapshot.rs`)：重启恢复用的设备记录全集，带版本号
//! 2. **设备日志** (`device_log.rs`)：每设备状态迁移日志，按条数上限滚动
//!
//! ## 实现
//!
//! - `in_memory/`：内存实现（测试、无持久化运行）
//! - `file/`：JSON 文件实现（生产环境）
//!
//! ## 后台任务
//!
//! - [`SnapshotWriter`]：单一快照写入任务，合并突发写入，永不持有注册表锁做 IO
//! - [`DeviceLogWriter`]：有界队列上的日志写入任务，队列满时丢弃并计数
//!
//! ## 使用示例
//!
//! ```rust,ignore
//! let store: Arc<dyn DeviceSnapshotStore> =
//!     Arc::new(JsonFileSnapshotStore::new("./data/device_cache.json"));
//! let devices = store.load_all().await?;
//! registry.restore(devices);
//! let writer = SnapshotWriter::spawn(store, registry.clone(), registry.subscribe_changes(), shutdown_rx);
//! ```
//!
//! 持久化失败只记录日志，从不影响注册表中的内存状态。

pub mod device_log;
pub mod error;
pub mod file;
pub mod in_memory;
pub mod snapshot;
pub mod writer;

pub use device_log::{
    DEFAULT_MAX_ENTRIES, DeviceLogAppender, DeviceLogStore, LogQuery, LogSummary, NoopLogAppender,
};
pub use error::StorageError;
pub use file::{JsonFileDeviceLogStore, JsonFileSnapshotStore};
pub use in_memory::{InMemoryDeviceLogStore, InMemorySnapshotStore};
pub use snapshot::{DeviceSnapshotStore, SNAPSHOT_VERSION, SnapshotDocument};
pub use writer::{DeviceLogWriter, SnapshotSource, SnapshotWriter};
