//! JSON 文件存储实现模块
//!
//! 包含以下实现：
//! - DeviceSnapshotStore: JsonFileSnapshotStore（单个快照文件）
//! - DeviceLogStore: JsonFileDeviceLogStore（每设备一个日志文件）
//!
//! 所有写入先落临时文件再 rename，进程中途退出不会留下半截文件。

pub mod device_log;
pub mod snapshot;

pub use device_log::*;
pub use snapshot::*;

use crate::error::StorageError;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;

/// 读取文件，不存在时返回 None。
pub(crate) async fn read_optional(path: &Path) -> Result<Option<Vec<u8>>, StorageError> {
    match fs::read(path).await {
        Ok(bytes) => Ok(Some(bytes)),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err.into()),
    }
}

/// 临时文件 + rename 方式整体写入。
pub(crate) async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StorageError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).await?;
    }
    let tmp = temp_path(path);
    fs::write(&tmp, bytes).await?;
    fs::rename(&tmp, path).await?;
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
