use domain::{DeviceEvent, DeviceLogEntry, DeviceLogKind, DeviceRecord, DeviceStatus};
use std::net::{IpAddr, Ipv4Addr};

fn ip() -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(192, 168, 0, 228))
}

#[test]
fn event_serializes_with_type_tag() {
    let event = DeviceEvent::DeviceIdChange {
        timestamp_ms: 1_000,
        old_device_id: 7,
        new_device_id: 8,
        source_ip: ip(),
    };
    let json = serde_json::to_value(&event).expect("serialize");
    assert_eq!(json["type"], "device_id_change");
    assert_eq!(json["old_device_id"], 7);
    assert_eq!(json["new_device_id"], 8);
    assert_eq!(json["source_ip"], "192.168.0.228");
    assert_eq!(event.kind(), "device_id_change");
    assert_eq!(event.timestamp_ms(), 1_000);
}

#[test]
fn record_tolerates_missing_optional_fields() {
    // 旧版本快照只保存了基本字段
    let json = r#"{"id":3,"first_seen_ms":1,"last_seen_ms":2,"source_ip":"10.0.0.3"}"#;
    let record: DeviceRecord = serde_json::from_str(json).expect("deserialize");
    assert_eq!(record.id, 3);
    assert_eq!(record.status, DeviceStatus::Unknown);
    assert!(!record.is_offline());
    assert_eq!(record.alarm_count, 0);
}

#[test]
fn log_entry_uses_type_field() {
    let entry = DeviceLogEntry::new(5, 10, DeviceLogKind::IdChange, "moved", 180, ip());
    let json = serde_json::to_value(&entry).expect("serialize");
    assert_eq!(json["type"], "id_change");
    assert_eq!("id_change".parse::<DeviceLogKind>(), Ok(DeviceLogKind::IdChange));
    assert!("bogus".parse::<DeviceLogKind>().is_err());
}
