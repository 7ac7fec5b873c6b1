use alarm_protocol::Command;
use alarm_registry::{
    BroadcastEventSink, DeviceRegistry, DeviceReport, IgnoreReason, ReassignError, RegistryPolicy,
    UpdateOutcome,
};
use alarm_storage::DeviceLogAppender;
use domain::{DeviceEvent, DeviceLogEntry, DeviceLogKind, DeviceRecord, DeviceStatus};
use std::net::{IpAddr, Ipv4Addr};
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;

const GRACE_MS: i64 = 300_000;

#[derive(Default)]
struct RecordingAppender {
    entries: Mutex<Vec<DeviceLogEntry>>,
}

impl RecordingAppender {
    fn kinds(&self, device_id: u8) -> Vec<DeviceLogKind> {
        self.entries
            .lock()
            .expect("lock")
            .iter()
            .filter(|entry| entry.device_id == device_id)
            .map(|entry| entry.kind)
            .collect()
    }
}

impl DeviceLogAppender for RecordingAppender {
    fn append(&self, entry: DeviceLogEntry) {
        self.entries.lock().expect("lock").push(entry);
    }
}

struct Harness {
    registry: DeviceRegistry,
    events: broadcast::Receiver<DeviceEvent>,
    logs: Arc<RecordingAppender>,
}

fn harness(policy: RegistryPolicy) -> Harness {
    let sink = Arc::new(BroadcastEventSink::new(64));
    let events = sink.subscribe();
    let logs = Arc::new(RecordingAppender::default());
    let registry = DeviceRegistry::new(policy)
        .with_event_sink(sink)
        .with_log_appender(logs.clone());
    Harness {
        registry,
        events,
        logs,
    }
}

fn drain(events: &mut broadcast::Receiver<DeviceEvent>) -> Vec<DeviceEvent> {
    let mut out = Vec::new();
    while let Ok(event) = events.try_recv() {
        out.push(event);
    }
    out
}

fn ip(last: u8) -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(192, 168, 0, last))
}

fn report(id: u8, command: Command, source: IpAddr) -> DeviceReport {
    DeviceReport {
        device_id: id,
        command,
        status: 1,
        wifi_rssi: 0xB0,
        source_ip: source,
    }
}

/// 占用 1-6，使下一个空闲 ID 为 8（7 由测试自己注册）。
fn occupy_low_ids(registry: &DeviceRegistry) {
    for id in 1..=6 {
        updated(registry.update(report(id, Command::Online, ip(100 + id)), 0));
    }
}

fn updated(outcome: UpdateOutcome) -> DeviceRecord {
    match outcome {
        UpdateOutcome::Updated(record) => record,
        other => panic!("expected update, got {:?}", other),
    }
}

#[test]
fn reserved_ids_are_ignored() {
    let h = harness(RegistryPolicy::default());
    for id in [0u8, 255] {
        assert_eq!(
            h.registry.update(report(id, Command::Online, ip(1)), 0),
            UpdateOutcome::Ignored(IgnoreReason::ReservedId)
        );
    }
    assert!(h.registry.is_empty());
    assert_eq!(h.registry.revision(), 0);
}

#[test]
fn capacity_refuses_unknown_ids_only() {
    let h = harness(RegistryPolicy {
        max_devices: 2,
        ..RegistryPolicy::default()
    });
    updated(h.registry.update(report(1, Command::Online, ip(1)), 0));
    updated(h.registry.update(report(2, Command::Online, ip(2)), 0));
    assert_eq!(
        h.registry.update(report(3, Command::Online, ip(3)), 0),
        UpdateOutcome::Ignored(IgnoreReason::Capacity)
    );
    let record = updated(h.registry.update(report(2, Command::Alarm, ip(2)), 10));
    assert_eq!(record.alarm_count, 1);
    assert_eq!(h.registry.len(), 2);
}

#[test]
fn counters_status_and_last_seen() {
    let h = harness(RegistryPolicy::default());
    updated(h.registry.update(report(7, Command::Online, ip(1)), 1_000));
    updated(h.registry.update(report(7, Command::Alarm, ip(1)), 2_000));
    updated(h.registry.update(report(7, Command::Alarm, ip(1)), 3_000));
    updated(h.registry.update(report(7, Command::Recover, ip(1)), 4_000));
    // 乱序时间戳不回退 last_seen
    let record = updated(h.registry.update(report(7, Command::Heartbeat, ip(1)), 3_500));

    assert_eq!(record.first_seen_ms, 1_000);
    assert_eq!(record.last_seen_ms, 4_000);
    assert_eq!(record.status, DeviceStatus::Heartbeat);
    assert_eq!(
        (record.alarm_count, record.recover_count, record.heartbeat_count),
        (2, 1, 1)
    );
    assert_eq!(record.wifi_rssi, 0xB0);

    // 表外命令记日志但不改变状态
    let record = updated(h.registry.update(report(7, Command::Other(0x09), ip(1)), 5_000));
    assert_eq!(record.status, DeviceStatus::Heartbeat);
    assert_eq!(record.last_seen_ms, 5_000);
    let fresh = updated(h.registry.update(report(9, Command::Other(0x09), ip(9)), 5_000));
    assert_eq!(fresh.status, DeviceStatus::Online);
    assert_eq!(
        h.logs.kinds(7),
        vec![
            DeviceLogKind::Online,
            DeviceLogKind::Alarm,
            DeviceLogKind::Alarm,
            DeviceLogKind::Recover,
            DeviceLogKind::Heartbeat,
            DeviceLogKind::Unknown,
        ]
    );
    assert!(h.registry.revision() >= 6);
}

#[test]
fn conflicting_source_never_mutates_owner() {
    let h = harness(RegistryPolicy::default());
    let owner = updated(h.registry.update(report(7, Command::Online, ip(1)), 0));

    for command in [Command::Online, Command::Alarm, Command::Heartbeat] {
        assert_eq!(
            h.registry.update(report(7, command, ip(2)), 1_000),
            UpdateOutcome::ConflictDetected {
                device_id: 7,
                source_ip: ip(2)
            }
        );
    }
    assert_eq!(h.registry.get(7), Some(owner));
    assert!(h.registry.check_conflict(7, ip(2), 1_000));
    assert!(!h.registry.check_conflict(7, ip(1), 1_000));
}

#[test]
fn long_offline_owner_is_replaced_after_grace() {
    let mut h = harness(RegistryPolicy::default());
    updated(h.registry.update(report(7, Command::Online, ip(1)), 0));
    h.registry.mark_offline(180_000, 200_000);

    // 离线刚好 5 分钟仍算冲突
    assert!(matches!(
        h.registry.update(report(7, Command::Online, ip(2)), 200_000 + GRACE_MS),
        UpdateOutcome::ConflictDetected { .. }
    ));
    drain(&mut h.events);
    let record = updated(h.registry.update(report(7, Command::Online, ip(2)), 200_001 + GRACE_MS));
    assert_eq!(record.source_ip, ip(2));
    assert_eq!(record.first_seen_ms, 200_001 + GRACE_MS);
    assert!(!record.is_offline());

    // 旧持有者的记录被移除，观察者与设备日志都能看到
    let events = drain(&mut h.events);
    assert!(events.iter().any(|event| matches!(
        event,
        DeviceEvent::DeviceEvicted {
            device_id: 7,
            offline_since_ms: Some(200_000),
            ..
        }
    )));
    let evicted: Vec<_> = h
        .logs
        .entries
        .lock()
        .expect("lock")
        .iter()
        .filter(|entry| entry.kind == DeviceLogKind::Evicted)
        .map(|entry| (entry.device_id, entry.source_ip))
        .collect();
    assert_eq!(evicted, vec![(7, ip(1))]);
}

#[test]
fn offline_sweep_transitions_once_and_back_online() {
    let mut h = harness(RegistryPolicy::default());
    updated(h.registry.update(report(7, Command::Online, ip(1)), 0));
    updated(h.registry.update(report(8, Command::Online, ip(2)), 100_000));
    drain(&mut h.events);

    assert!(h.registry.mark_offline(180_000, 180_000).is_empty());
    let first = h.registry.mark_offline(180_000, 180_001);
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].offline_since_ms, Some(180_001));
    assert!(h.registry.mark_offline(180_000, 190_000).is_empty());

    let events = drain(&mut h.events);
    assert_eq!(events.len(), 1);
    assert!(matches!(
        events[0],
        DeviceEvent::DeviceOffline {
            device_id: 7,
            offline_timeout_secs: 180,
            ..
        }
    ));
    assert!(!h.registry.is_online(7, 180_000, 190_000));
    assert!(h.registry.is_online(8, 180_000, 190_000));

    let record = updated(h.registry.update(report(7, Command::Heartbeat, ip(1)), 200_000));
    assert!(!record.is_offline());
    assert_eq!(record.offline_since_ms, None);
    let events = drain(&mut h.events);
    assert!(matches!(events[0], DeviceEvent::DeviceOnline { device_id: 7, .. }));
}

#[test]
fn eviction_removes_long_offline_records() {
    let mut h = harness(RegistryPolicy::default());
    updated(h.registry.update(report(7, Command::Online, ip(1)), 0));
    updated(h.registry.update(report(8, Command::Online, ip(2)), 0));
    h.registry.mark_offline(1_000, 2_000);
    updated(h.registry.update(report(8, Command::Heartbeat, ip(2)), 3_000));
    drain(&mut h.events);

    let evicted = h.registry.evict_offline(10_000, 12_001);
    assert_eq!(evicted.len(), 1);
    assert_eq!(evicted[0].id, 7);
    assert!(h.registry.get(7).is_none());
    assert!(h.registry.get(8).is_some());
    let events = drain(&mut h.events);
    assert!(matches!(
        events.as_slice(),
        [DeviceEvent::DeviceEvicted {
            device_id: 7,
            offline_since_ms: Some(2_000),
            ..
        }]
    ));
}

#[test]
fn conflict_negotiation_keeps_owner_and_creates_new_id() {
    let mut h = harness(RegistryPolicy::default());
    occupy_low_ids(&h.registry);
    updated(h.registry.update(report(7, Command::Online, ip(1)), 0));
    assert!(matches!(
        h.registry.update(report(7, Command::Online, ip(2)), 1_000),
        UpdateOutcome::ConflictDetected { .. }
    ));

    let reservation = h.registry.begin_reassignment(7, ip(2), 1_000).expect("allocate");
    assert_eq!(reservation.pending.new_id, 8);
    assert_eq!(h.registry.pending().len(), 1);
    drain(&mut h.events);

    let record = updated(h.registry.update(report(8, Command::Online, ip(2)), 2_000));
    assert_eq!(record.id, 8);
    assert_eq!(record.source_ip, ip(2));
    assert_eq!(h.registry.get(7).map(|r| r.source_ip), Some(ip(1)));
    assert!(h.registry.pending().is_empty());
    // 旧 ID 仍属于另一台设备，不发 device_id_change
    assert!(
        drain(&mut h.events)
            .iter()
            .all(|event| !matches!(event, DeviceEvent::DeviceIdChange { .. }))
    );
}

#[test]
fn frames_before_announcement_keep_counters_on_new_id() {
    let h = harness(RegistryPolicy::default());
    occupy_low_ids(&h.registry);
    updated(h.registry.update(report(7, Command::Online, ip(1)), 0));
    assert!(matches!(
        h.registry.update(report(7, Command::Online, ip(2)), 1_000),
        UpdateOutcome::ConflictDetected { .. }
    ));
    let reservation = h.registry.begin_reassignment(7, ip(2), 1_000).expect("allocate");
    assert_eq!(reservation.pending.new_id, 8);

    // 设备先以新 ID 发心跳和报警，随后才发上线帧
    updated(h.registry.update(report(8, Command::Heartbeat, ip(2)), 2_000));
    updated(h.registry.update(report(8, Command::Alarm, ip(2)), 3_000));
    let record = updated(h.registry.update(report(8, Command::Online, ip(2)), 4_000));

    assert_eq!(record.first_seen_ms, 2_000);
    assert_eq!(record.last_seen_ms, 4_000);
    assert_eq!((record.heartbeat_count, record.alarm_count), (1, 1));
    assert_eq!(record.status, DeviceStatus::Online);
    assert!(h.registry.pending().is_empty());
    assert!(!h.logs.kinds(8).contains(&DeviceLogKind::Evicted));
    assert_eq!(h.registry.get(7).map(|r| r.source_ip), Some(ip(1)));
}

#[test]
fn manual_reassignment_migrates_history() {
    let mut h = harness(RegistryPolicy::default());
    updated(h.registry.update(report(7, Command::Online, ip(1)), 1_000));
    updated(h.registry.update(report(7, Command::Alarm, ip(1)), 2_000));
    updated(h.registry.update(report(7, Command::Heartbeat, ip(1)), 3_000));

    let pending = h
        .registry
        .request_reassignment(7, 20, 300_000, 4_000)
        .expect("accepted");
    assert_eq!((pending.old_id, pending.new_id, pending.source_ip), (7, 20, ip(1)));
    drain(&mut h.events);

    let record = updated(h.registry.update(report(20, Command::Online, ip(1)), 5_000));
    assert!(h.registry.get(7).is_none());
    assert_eq!(record.id, 20);
    assert_eq!(record.first_seen_ms, 1_000);
    assert_eq!(record.last_seen_ms, 5_000);
    assert_eq!((record.alarm_count, record.heartbeat_count), (1, 1));
    assert_eq!(record.status, DeviceStatus::Online);
    assert!(h.registry.pending().is_empty());

    let events = drain(&mut h.events);
    assert!(events.iter().any(|event| matches!(
        event,
        DeviceEvent::DeviceIdChange {
            old_device_id: 7,
            new_device_id: 20,
            ..
        }
    )));
    assert!(h.logs.kinds(20).contains(&DeviceLogKind::IdChange));
}

#[test]
fn manual_reassignment_validation() {
    let h = harness(RegistryPolicy::default());
    updated(h.registry.update(report(7, Command::Online, ip(1)), 0));
    updated(h.registry.update(report(9, Command::Online, ip(2)), 0));

    let reg = &h.registry;
    assert_eq!(reg.request_reassignment(7, 0, 300_000, 1), Err(ReassignError::InvalidId(0)));
    assert_eq!(reg.request_reassignment(7, 255, 300_000, 1), Err(ReassignError::InvalidId(255)));
    assert_eq!(reg.request_reassignment(3, 4, 300_000, 1), Err(ReassignError::NotFound(3)));
    assert_eq!(reg.request_reassignment(7, 7, 300_000, 1), Err(ReassignError::Unchanged(7)));
    assert_eq!(reg.request_reassignment(7, 9, 300_000, 1), Err(ReassignError::Conflict(9)));
    assert_eq!(
        reg.request_reassignment(7, 10, 300_000, 300_000),
        Err(ReassignError::Offline(7))
    );
    assert!(reg.request_reassignment(7, 10, 300_000, 299_999).is_ok());
    // 其他设备不能再申请同一个目标 ID
    assert_eq!(reg.request_reassignment(9, 10, 300_000, 1), Err(ReassignError::Conflict(10)));
}

#[test]
fn expired_pending_does_not_block_future_conflicts() {
    let h = harness(RegistryPolicy::default());
    occupy_low_ids(&h.registry);
    updated(h.registry.update(report(7, Command::Online, ip(1)), 0));
    let first = h.registry.begin_reassignment(7, ip(2), 0).expect("allocate");
    assert_eq!(first.pending.new_id, 8);

    assert!(h.registry.expire_pending(GRACE_MS, GRACE_MS).is_empty());
    let expired = h.registry.expire_pending(GRACE_MS, GRACE_MS + 1);
    assert_eq!(expired, vec![first.pending]);
    assert!(h.registry.pending().is_empty());

    // 之后该来源迟到的上线帧按普通设备处理
    let late = updated(h.registry.update(report(8, Command::Online, ip(2)), GRACE_MS + 2));
    assert_eq!(late.first_seen_ms, GRACE_MS + 2);

    updated(h.registry.update(report(9, Command::Online, ip(1)), GRACE_MS + 3));
    let second = h
        .registry
        .begin_reassignment(9, ip(2), GRACE_MS + 4)
        .expect("allocate");
    assert!(!second.reused);
    assert_eq!(second.pending.old_id, 9);
    assert_eq!(second.pending.new_id, 10);
}

#[test]
fn stale_pending_is_discarded_when_target_taken() {
    let h = harness(RegistryPolicy::default());
    occupy_low_ids(&h.registry);
    updated(h.registry.update(report(7, Command::Online, ip(1)), 0));
    let reservation = h.registry.begin_reassignment(7, ip(2), 0).expect("allocate");
    assert_eq!(reservation.pending.new_id, 8);

    // 另一台设备抢先以 8 上线
    updated(h.registry.update(report(8, Command::Online, ip(3)), 1_000));
    assert!(matches!(
        h.registry.update(report(8, Command::Online, ip(2)), 2_000),
        UpdateOutcome::ConflictDetected { device_id: 8, .. }
    ));
    assert!(h.registry.pending().is_empty());
    assert!(!h.registry.cancel_reassignment(ip(2), 8));
}

#[test]
fn restore_and_snapshot_helpers() {
    let h = harness(RegistryPolicy::default());
    let mut records = vec![
        DeviceRecord::new(3, ip(3), 0),
        DeviceRecord::new(1, ip(1), 0),
        DeviceRecord::new(0, ip(9), 0),
        DeviceRecord::new(3, ip(4), 0),
    ];
    records[1].alarm_count = 4;
    assert_eq!(h.registry.restore(records), 2);
    let ids: Vec<u8> = h.registry.get_all().iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![1, 3]);
    assert_eq!(h.registry.get(1).map(|r| r.alarm_count), Some(4));
    assert_eq!(h.registry.known_source_ips(), vec![ip(1), ip(3)]);

    let mut changes = h.registry.subscribe_changes();
    h.registry.request_persist();
    assert!(changes.has_changed().expect("open"));
    changes.borrow_and_update();
    assert!(!changes.has_changed().expect("open"));
}
