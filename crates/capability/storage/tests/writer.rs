use alarm_storage::{
    DeviceLogAppender, DeviceLogStore, DeviceLogWriter, InMemoryDeviceLogStore,
    InMemorySnapshotStore, SnapshotSource, SnapshotWriter,
};
use domain::{DeviceLogEntry, DeviceLogKind, DeviceRecord};
use std::net::{IpAddr, Ipv4Addr};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;

struct SharedSource {
    devices: Mutex<Vec<DeviceRecord>>,
}

impl SharedSource {
    fn set(&self, devices: Vec<DeviceRecord>) {
        *self.devices.lock().expect("lock") = devices;
    }
}

impl SnapshotSource for SharedSource {
    fn snapshot(&self) -> Vec<DeviceRecord> {
        self.devices.lock().expect("lock").clone()
    }
}

fn record(id: u8) -> DeviceRecord {
    DeviceRecord::new(id, IpAddr::V4(Ipv4Addr::new(10, 0, 0, id)), 0)
}

#[tokio::test]
async fn snapshot_writer_writes_on_change_and_on_shutdown() {
    let store = Arc::new(InMemorySnapshotStore::new());
    let source = Arc::new(SharedSource {
        devices: Mutex::new(vec![record(7)]),
    });
    let (revision_tx, revision_rx) = watch::channel(0u64);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = SnapshotWriter::spawn(store.clone(), source.clone(), revision_rx, shutdown_rx);

    revision_tx.send(1).expect("revision");
    let mut waited = 0;
    while store.save_count().expect("count") == 0 && waited < 200 {
        tokio::time::sleep(Duration::from_millis(10)).await;
        waited += 1;
    }
    let first = store.document().expect("document").expect("written");
    assert_eq!(first.devices, vec![record(7)]);

    source.set(vec![record(7), record(8)]);
    shutdown_tx.send(true).expect("shutdown");
    tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .expect("writer stops")
        .expect("join");

    let last = store.document().expect("document").expect("written");
    assert_eq!(last.devices.len(), 2);
}

#[tokio::test]
async fn device_log_writer_drains_queue_on_shutdown() {
    let store = Arc::new(InMemoryDeviceLogStore::new());
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (writer, handle) = DeviceLogWriter::spawn(store.clone(), 16, shutdown_rx);

    let source_ip = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 7));
    for ts in 0..3 {
        writer.append(DeviceLogEntry::new(7, ts, DeviceLogKind::Heartbeat, "beat", 0, source_ip));
    }
    shutdown_tx.send(true).expect("shutdown");
    tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .expect("writer stops")
        .expect("join");

    assert_eq!(store.list(7, 10).await.expect("list").len(), 3);

    // 任务结束后追加只会被丢弃
    writer.append(DeviceLogEntry::new(7, 9, DeviceLogKind::Alarm, "late", 0, source_ip));
    assert_eq!(store.list(7, 10).await.expect("list").len(), 3);
}
